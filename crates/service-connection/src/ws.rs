//! WebSocket transport for service connections.

use crate::{
    Connection, ConnectionError, ConnectionId, ConnectionResult, ConnectionState, Connector,
    Message, MessageStream, TransportOptions,
};
use async_trait::async_trait;
use client_storage::Credential;
use futures_util::{SinkExt, StreamExt};
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval, sleep, timeout, Duration, MissedTickBehavior};
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};
use url::Url;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Timing knobs for a WebSocket connection.
#[derive(Debug, Clone)]
pub struct WsSettings {
    /// Heartbeat interval in seconds.
    pub heartbeat_interval_secs: u64,
    /// Timeout for one connect attempt in seconds.
    pub connect_timeout_secs: u64,
    /// Base retry delay in seconds.
    pub reconnect_base_delay_secs: u64,
    /// Maximum retry delay in seconds.
    pub reconnect_max_delay_secs: u64,
    /// Connect attempts before giving up.
    pub max_connect_attempts: u32,
}

impl Default for WsSettings {
    fn default() -> Self {
        Self {
            heartbeat_interval_secs: 30,
            connect_timeout_secs: 10,
            reconnect_base_delay_secs: 2,
            reconnect_max_delay_secs: 30,
            max_connect_attempts: 5,
        }
    }
}

impl WsSettings {
    /// Delay after failed attempt number `attempt` (1-based).
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let factor = 2u64.saturating_pow(attempt.saturating_sub(1));
        let secs = self
            .reconnect_base_delay_secs
            .saturating_mul(factor)
            .min(self.reconnect_max_delay_secs);
        Duration::from_secs(secs)
    }
}

/// Apply the TLS option to a `ws://`/`wss://` service URL.
fn resolve_url(raw: &str, options: TransportOptions) -> ConnectionResult<Url> {
    let mut url =
        Url::parse(raw).map_err(|e| ConnectionError::InvalidUrl(format!("{}: {}", raw, e)))?;

    let scheme = match (url.scheme(), options.tls_enabled) {
        ("ws" | "wss", true) => "wss",
        ("ws" | "wss", false) => "ws",
        (other, _) => {
            return Err(ConnectionError::InvalidUrl(format!(
                "unsupported scheme {}",
                other
            )))
        }
    };

    if url.scheme() != scheme {
        url.set_scheme(scheme)
            .map_err(|_| ConnectionError::InvalidUrl(raw.to_string()))?;
    }
    Ok(url)
}

/// A service connection over a WebSocket.
///
/// `open` retries the connect with exponential backoff, authenticates, then
/// runs three tasks: a writer draining the outbound queue, a heartbeat
/// sending `ping` frames, and a reader decoding inbound frames.
pub struct WsConnection {
    id: ConnectionId,
    url: String,
    options: TransportOptions,
    settings: WsSettings,
    state: Arc<RwLock<ConnectionState>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl WsConnection {
    pub fn new(
        id: ConnectionId,
        url: impl Into<String>,
        options: TransportOptions,
        settings: WsSettings,
    ) -> Self {
        Self {
            id,
            url: url.into(),
            options,
            settings,
            state: Arc::new(RwLock::new(ConnectionState::Closed)),
            tasks: Mutex::new(Vec::new()),
        }
    }

    fn set_state(&self, state: ConnectionState) {
        *self.state.write() = state;
    }

    fn abort_tasks(&self) -> bool {
        let tasks = std::mem::take(&mut *self.tasks.lock());
        let had_tasks = !tasks.is_empty();
        for task in tasks {
            task.abort();
        }
        had_tasks
    }

    async fn connect_with_retry(&self, url: &Url) -> ConnectionResult<WsStream> {
        let max_attempts = self.settings.max_connect_attempts.max(1);
        let connect_timeout = Duration::from_secs(self.settings.connect_timeout_secs.max(1));
        let mut attempt = 0;

        loop {
            attempt += 1;
            debug!(connection = %self.id, attempt, "Connect attempt");

            let reason = match timeout(connect_timeout, connect_async(url.as_str())).await {
                Ok(Ok((stream, _))) => return Ok(stream),
                Ok(Err(e)) => e.to_string(),
                Err(_) => "connect timed out".to_string(),
            };

            if attempt >= max_attempts {
                return Err(ConnectionError::connect_failed(self.id, reason));
            }

            let delay = self.settings.backoff_delay(attempt);
            warn!(
                connection = %self.id,
                attempt,
                delay_secs = delay.as_secs(),
                error = %reason,
                "Connect failed, retrying"
            );
            sleep(delay).await;
        }
    }

    async fn establish(&self, credential: &Credential) -> ConnectionResult<MessageStream> {
        let url = resolve_url(&self.url, self.options)?;
        let auth = Message::auth(credential).to_json()?;

        info!(connection = %self.id, url = %url, "Connecting");
        let ws = self.connect_with_retry(&url).await?;
        let (mut write, mut read) = ws.split();

        write.send(WsMessage::Text(auth.into())).await?;
        debug!(connection = %self.id, "Sent auth frame");

        let (out_tx, mut out_rx) = mpsc::channel::<WsMessage>(64);
        let writer = tokio::spawn(async move {
            while let Some(frame) = out_rx.recv().await {
                if write.send(frame).await.is_err() {
                    break;
                }
            }
        });

        let id = self.id;
        let heartbeat_tx = out_tx.clone();
        let period = Duration::from_secs(self.settings.heartbeat_interval_secs.max(1));
        let heartbeat = tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Ok(json) = Message::ping().to_json() else {
                    break;
                };
                if heartbeat_tx.send(WsMessage::Text(json.into())).await.is_err() {
                    break;
                }
                debug!(connection = %id, "Heartbeat sent");
            }
        });

        let (msg_tx, msg_rx) = mpsc::unbounded_channel::<ConnectionResult<Message>>();
        let state = self.state.clone();
        let reader = tokio::spawn(async move {
            while let Some(frame) = read.next().await {
                match frame {
                    Ok(WsMessage::Text(text)) => match Message::from_json(&text) {
                        Ok(message) => {
                            if msg_tx.send(Ok(message)).is_err() {
                                return;
                            }
                        }
                        Err(e) => {
                            warn!(connection = %id, error = %e, "Dropping malformed frame");
                        }
                    },
                    Ok(WsMessage::Ping(data)) => {
                        let _ = out_tx.send(WsMessage::Pong(data)).await;
                    }
                    Ok(WsMessage::Close(frame)) => {
                        info!(connection = %id, frame = ?frame, "Closed by remote");
                        break;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        warn!(connection = %id, error = %e, "WebSocket error");
                        *state.write() = ConnectionState::Failed;
                        let _ = msg_tx.send(Err(e.into()));
                        return;
                    }
                }
            }
            // The remote side ended the link; only close() ends it cleanly.
            *state.write() = ConnectionState::Failed;
        });

        *self.tasks.lock() = vec![writer, heartbeat, reader];

        let stream = futures_util::stream::unfold(msg_rx, |mut rx| async move {
            rx.recv().await.map(|item| (item, rx))
        });
        Ok(stream.boxed())
    }
}

#[async_trait]
impl Connection for WsConnection {
    fn id(&self) -> ConnectionId {
        self.id
    }

    fn state(&self) -> ConnectionState {
        *self.state.read()
    }

    async fn open(&self, credential: &Credential) -> ConnectionResult<MessageStream> {
        self.abort_tasks();
        self.set_state(ConnectionState::Connecting);

        match self.establish(credential).await {
            Ok(stream) => {
                self.set_state(ConnectionState::Open);
                info!(connection = %self.id, "Connection open");
                Ok(stream)
            }
            Err(e) => {
                self.abort_tasks();
                self.set_state(ConnectionState::Failed);
                warn!(connection = %self.id, error = %e, "Connection open failed");
                Err(e)
            }
        }
    }

    async fn close(&self) {
        let was_running = self.abort_tasks();
        self.set_state(ConnectionState::Closed);
        if was_running {
            info!(connection = %self.id, "Connection closed");
        }
    }
}

/// Builds WebSocket connections for the manager and fetcher services.
#[derive(Debug, Clone)]
pub struct WsConnector {
    manager_url: String,
    fetcher_url: String,
    settings: WsSettings,
}

impl WsConnector {
    pub fn new(
        manager_url: impl Into<String>,
        fetcher_url: impl Into<String>,
        settings: WsSettings,
    ) -> Self {
        Self {
            manager_url: manager_url.into(),
            fetcher_url: fetcher_url.into(),
            settings,
        }
    }
}

impl Connector for WsConnector {
    fn connection(&self, id: ConnectionId, options: TransportOptions) -> Arc<dyn Connection> {
        let url = match id {
            ConnectionId::Manager => &self.manager_url,
            ConnectionId::Fetcher => &self.fetcher_url,
        };
        Arc::new(WsConnection::new(id, url.clone(), options, self.settings.clone()))
    }
}
