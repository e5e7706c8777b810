//! Joint lifecycle of the manager and fetcher connections.

use crate::{
    Connection, ConnectionError, ConnectionId, ConnectionResult, ConnectionState, Connector,
    Message, MessageKind, MessageStream, TransportOptions,
};
use client_storage::Credential;
use futures_util::StreamExt;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// A message tagged with the session epoch it belongs to.
#[derive(Debug, Clone, PartialEq)]
pub struct Inbound {
    pub epoch: u64,
    pub message: Message,
}

/// Owns the two connections of one session.
///
/// `open` connects both concurrently and succeeds only if both do. Once
/// open, every message is forwarded to the shared inbound channel, tagged
/// with this supervisor's epoch. A connection that ends or fails after
/// opening produces a single `connection_failed` message.
pub struct ConnectionSupervisor {
    manager: Arc<dyn Connection>,
    fetcher: Arc<dyn Connection>,
    inbound: mpsc::UnboundedSender<Inbound>,
    epoch: u64,
    closed: watch::Sender<bool>,
    forwarders: Mutex<Vec<JoinHandle<()>>>,
}

impl ConnectionSupervisor {
    pub fn new(
        connector: &dyn Connector,
        options: TransportOptions,
        inbound: mpsc::UnboundedSender<Inbound>,
        epoch: u64,
    ) -> Self {
        let (closed, _) = watch::channel(false);
        Self {
            manager: connector.connection(ConnectionId::Manager, options),
            fetcher: connector.connection(ConnectionId::Fetcher, options),
            inbound,
            epoch,
            closed,
            forwarders: Mutex::new(Vec::new()),
        }
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Current states of the manager and fetcher connections.
    pub fn states(&self) -> (ConnectionState, ConnectionState) {
        (self.manager.state(), self.fetcher.state())
    }

    pub fn is_closed(&self) -> bool {
        *self.closed.borrow()
    }

    /// Open both connections. A failure of either one, or a concurrent
    /// [`close`](Self::close), closes both and fails the open.
    pub async fn open(&self, credential: &Credential) -> ConnectionResult<()> {
        let mut closed = self.closed.subscribe();
        if *closed.borrow() {
            return Err(ConnectionError::Cancelled);
        }

        info!(epoch = self.epoch, "Opening service connections");

        let opens = async {
            tokio::try_join!(self.manager.open(credential), self.fetcher.open(credential))
        };

        let result = tokio::select! {
            result = opens => result,
            _ = wait_closed(&mut closed) => Err(ConnectionError::Cancelled),
        };

        let (manager_stream, fetcher_stream) = match result {
            Ok(streams) => streams,
            Err(e) => {
                warn!(epoch = self.epoch, error = %e, "Opening service connections failed");
                self.close_connections().await;
                return Err(e);
            }
        };

        {
            let mut forwarders = self.forwarders.lock();
            forwarders.push(self.spawn_forwarder(ConnectionId::Manager, manager_stream));
            forwarders.push(self.spawn_forwarder(ConnectionId::Fetcher, fetcher_stream));
        }

        // close() may have run while the forwarders were being spawned.
        if self.is_closed() {
            self.abort_forwarders();
            self.close_connections().await;
            return Err(ConnectionError::Cancelled);
        }

        info!(epoch = self.epoch, "Service connections open");
        Ok(())
    }

    fn spawn_forwarder(&self, id: ConnectionId, mut stream: MessageStream) -> JoinHandle<()> {
        let inbound = self.inbound.clone();
        let epoch = self.epoch;
        let closed = self.closed.subscribe();

        tokio::spawn(async move {
            let reason = loop {
                match stream.next().await {
                    Some(Ok(message)) => {
                        // Only the supervisor may report a connection failure.
                        if message.known_kind() == Some(MessageKind::ConnectionFailed) {
                            warn!(connection = %id, "Dropping connection_failed frame from server");
                            continue;
                        }
                        if inbound.send(Inbound { epoch, message }).is_err() {
                            debug!(connection = %id, "Inbound channel gone, stopping forwarder");
                            return;
                        }
                    }
                    Some(Err(e)) => break e.to_string(),
                    None => break "connection closed by remote".to_string(),
                }
            };

            if *closed.borrow() {
                return;
            }

            warn!(connection = %id, epoch, reason = %reason, "Connection failed after open");
            let _ = inbound.send(Inbound {
                epoch,
                message: Message::connection_failed(id, reason),
            });
        })
    }

    fn abort_forwarders(&self) {
        for task in std::mem::take(&mut *self.forwarders.lock()) {
            task.abort();
        }
    }

    async fn close_connections(&self) {
        tokio::join!(self.manager.close(), self.fetcher.close());
    }

    /// Close both connections from any state. Idempotent.
    pub async fn close(&self) {
        let already_closed = self.closed.send_replace(true);
        self.abort_forwarders();
        self.close_connections().await;
        if !already_closed {
            info!(epoch = self.epoch, "Service connections closed");
        }
    }
}

async fn wait_closed(closed: &mut watch::Receiver<bool>) {
    let _ = closed.wait_for(|closed| *closed).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parking_lot::RwLock;
    use std::time::Duration;

    /// Scripted connection: either fails to open, opens and yields a fixed
    /// message list, or hangs until closed.
    #[derive(Clone)]
    enum Script {
        Fail,
        Messages(Vec<Message>, bool),
        Hang,
    }

    struct FakeConnection {
        id: ConnectionId,
        script: Script,
        state: RwLock<ConnectionState>,
        closes: Mutex<u32>,
    }

    #[async_trait]
    impl Connection for FakeConnection {
        fn id(&self) -> ConnectionId {
            self.id
        }

        fn state(&self) -> ConnectionState {
            *self.state.read()
        }

        async fn open(&self, _credential: &Credential) -> ConnectionResult<MessageStream> {
            *self.state.write() = ConnectionState::Connecting;
            match self.script.clone() {
                Script::Fail => {
                    *self.state.write() = ConnectionState::Failed;
                    Err(ConnectionError::connect_failed(self.id, "refused"))
                }
                Script::Hang => {
                    futures_util::future::pending::<()>().await;
                    unreachable!()
                }
                Script::Messages(messages, then_hang) => {
                    *self.state.write() = ConnectionState::Open;
                    let items = futures_util::stream::iter(messages.into_iter().map(Ok));
                    if then_hang {
                        Ok(items.chain(futures_util::stream::pending()).boxed())
                    } else {
                        Ok(items.boxed())
                    }
                }
            }
        }

        async fn close(&self) {
            *self.closes.lock() += 1;
            *self.state.write() = ConnectionState::Closed;
        }
    }

    struct FakeConnector {
        manager: Arc<FakeConnection>,
        fetcher: Arc<FakeConnection>,
    }

    impl FakeConnector {
        fn new(manager: Script, fetcher: Script) -> Self {
            let make = |id, script| {
                Arc::new(FakeConnection {
                    id,
                    script,
                    state: RwLock::new(ConnectionState::Closed),
                    closes: Mutex::new(0),
                })
            };
            Self {
                manager: make(ConnectionId::Manager, manager),
                fetcher: make(ConnectionId::Fetcher, fetcher),
            }
        }
    }

    impl Connector for FakeConnector {
        fn connection(&self, id: ConnectionId, _options: TransportOptions) -> Arc<dyn Connection> {
            match id {
                ConnectionId::Manager => self.manager.clone(),
                ConnectionId::Fetcher => self.fetcher.clone(),
            }
        }
    }

    fn msg(kind: &str, n: i64) -> Message {
        let mut fields = crate::Fields::new();
        fields.insert("n".into(), n.into());
        Message::new(kind, fields)
    }

    fn cred() -> Credential {
        Credential::new("a@b.c", "pw")
    }

    #[tokio::test]
    async fn test_open_forwards_both_streams_in_order() {
        let connector = FakeConnector::new(
            Script::Messages(vec![msg("m", 1), msg("m", 2), msg("m", 3)], true),
            Script::Messages(vec![msg("f", 1), msg("f", 2)], true),
        );
        let (tx, mut rx) = mpsc::unbounded_channel();
        let supervisor = ConnectionSupervisor::new(&connector, TransportOptions::default(), tx, 7);

        supervisor.open(&cred()).await.unwrap();
        assert_eq!(
            supervisor.states(),
            (ConnectionState::Open, ConnectionState::Open)
        );

        let mut manager_seq = Vec::new();
        let mut fetcher_seq = Vec::new();
        for _ in 0..5 {
            let inbound = rx.recv().await.unwrap();
            assert_eq!(inbound.epoch, 7);
            let n = inbound.message.fields["n"].as_i64().unwrap();
            match inbound.message.kind.as_str() {
                "m" => manager_seq.push(n),
                "f" => fetcher_seq.push(n),
                other => panic!("unexpected kind {}", other),
            }
        }
        assert_eq!(manager_seq, vec![1, 2, 3]);
        assert_eq!(fetcher_seq, vec![1, 2]);

        supervisor.close().await;
    }

    #[tokio::test]
    async fn test_open_is_all_or_nothing() {
        let connector = FakeConnector::new(Script::Hang, Script::Fail);
        let (tx, _rx) = mpsc::unbounded_channel();
        let supervisor = ConnectionSupervisor::new(&connector, TransportOptions::default(), tx, 1);

        let result = supervisor.open(&cred()).await;
        assert!(matches!(
            result,
            Err(ConnectionError::ConnectFailed {
                connection: ConnectionId::Fetcher,
                ..
            })
        ));
        assert_eq!(*connector.manager.closes.lock(), 1);
        assert_eq!(*connector.fetcher.closes.lock(), 1);
        assert_eq!(connector.manager.state(), ConnectionState::Closed);
    }

    #[tokio::test]
    async fn test_close_cancels_pending_open() {
        let connector = FakeConnector::new(Script::Hang, Script::Hang);
        let (tx, _rx) = mpsc::unbounded_channel();
        let supervisor = Arc::new(ConnectionSupervisor::new(
            &connector,
            TransportOptions::default(),
            tx,
            1,
        ));

        let opening = {
            let supervisor = supervisor.clone();
            tokio::spawn(async move { supervisor.open(&cred()).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        supervisor.close().await;

        let result = tokio::time::timeout(Duration::from_secs(1), opening)
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(result, Err(ConnectionError::Cancelled)));
        assert!(supervisor.is_closed());
    }

    #[tokio::test]
    async fn test_stream_end_after_open_reports_connection_failed() {
        let connector = FakeConnector::new(
            Script::Messages(vec![msg("m", 1)], false),
            Script::Messages(vec![], true),
        );
        let (tx, mut rx) = mpsc::unbounded_channel();
        let supervisor = ConnectionSupervisor::new(&connector, TransportOptions::default(), tx, 3);
        supervisor.open(&cred()).await.unwrap();

        let first = rx.recv().await.unwrap();
        assert_eq!(first.message.kind, "m");

        let failure = rx.recv().await.unwrap();
        assert_eq!(failure.epoch, 3);
        assert_eq!(failure.message.kind, "connection_failed");
        assert_eq!(failure.message.fields["connection"], "manager");

        supervisor.close().await;
    }

    #[tokio::test]
    async fn test_server_cannot_report_connection_failed() {
        let spoofed = Message::connection_failed(ConnectionId::Fetcher, "spoofed");
        let connector = FakeConnector::new(
            Script::Messages(vec![spoofed, msg("m", 1)], true),
            Script::Messages(vec![], true),
        );
        let (tx, mut rx) = mpsc::unbounded_channel();
        let supervisor = ConnectionSupervisor::new(&connector, TransportOptions::default(), tx, 1);
        supervisor.open(&cred()).await.unwrap();

        let first = rx.recv().await.unwrap();
        assert_eq!(first.message.kind, "m");

        supervisor.close().await;
        drop(supervisor);
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_close_is_idempotent_and_silent() {
        let connector = FakeConnector::new(
            Script::Messages(vec![], true),
            Script::Messages(vec![], true),
        );
        let (tx, mut rx) = mpsc::unbounded_channel();
        let supervisor = ConnectionSupervisor::new(&connector, TransportOptions::default(), tx, 1);
        supervisor.open(&cred()).await.unwrap();

        supervisor.close().await;
        supervisor.close().await;

        assert_eq!(
            supervisor.states(),
            (ConnectionState::Closed, ConnectionState::Closed)
        );
        drop(supervisor);
        // No connection_failed is reported for a deliberate close.
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_open_after_close_is_cancelled() {
        let connector = FakeConnector::new(
            Script::Messages(vec![], true),
            Script::Messages(vec![], true),
        );
        let (tx, _rx) = mpsc::unbounded_channel();
        let supervisor = ConnectionSupervisor::new(&connector, TransportOptions::default(), tx, 1);

        supervisor.close().await;
        assert!(matches!(
            supervisor.open(&cred()).await,
            Err(ConnectionError::Cancelled)
        ));
    }
}
