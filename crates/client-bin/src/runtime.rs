//! Client runtime wiring.
//!
//! [`ClientRuntime`] owns the shared components and the single event loop
//! that drains the inbound channel and dispatches messages in order.

use crate::consumers::build_dispatcher;
use crate::events::{ClientEvent, Notifier};
use crate::{SessionManager, SessionResult};
use client_config_and_utils::{HostPlatform, InstallLayout};
use client_storage::{Credential, CredentialStore};
use message_dispatcher::MessageDispatcher;
use parking_lot::Mutex;
use self_updater::{Downloader, Installer, UpdateError, UpdateManager};
use service_connection::{Connector, Inbound, TransportOptions};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Everything the runtime is assembled from.
pub struct RuntimeParts {
    pub store: Arc<dyn CredentialStore>,
    pub connector: Arc<dyn Connector>,
    pub downloader: Arc<dyn Downloader>,
    pub installer: Arc<dyn Installer>,
    pub layout: InstallLayout,
    pub downloads_dir: PathBuf,
    pub transport: TransportOptions,
    pub host: HostPlatform,
    pub auto_upgrade: bool,
}

pub struct ClientRuntime {
    store: Arc<dyn CredentialStore>,
    session: Arc<SessionManager>,
    updates: Arc<UpdateManager>,
    notifier: Notifier,
    dispatcher: Arc<MessageDispatcher>,
    inbound: Mutex<Option<mpsc::UnboundedReceiver<Inbound>>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    auto_upgrade: bool,
}

impl ClientRuntime {
    /// Assemble the runtime. Leftovers of an interrupted install are
    /// cleaned up here, before any update can start.
    pub fn new(parts: RuntimeParts) -> SessionResult<Self> {
        let notifier = Notifier::default();
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();

        let session = Arc::new(SessionManager::new(
            parts.store.clone(),
            parts.connector,
            parts.transport,
            inbound_tx,
            notifier.clone(),
        ));

        let updates = Arc::new(UpdateManager::new(
            parts.store.clone(),
            parts.downloader,
            parts.installer,
            parts.layout,
            parts.downloads_dir,
        ));
        match updates.recover_interrupted_install() {
            Ok(true) => info!("Cleaned up after interrupted install"),
            Ok(false) => {}
            Err(e) => warn!(error = %e, "Could not clean up after previous install"),
        }

        let dispatcher = build_dispatcher(
            session.clone(),
            parts.store.clone(),
            updates.clone(),
            notifier.clone(),
            parts.host,
        )?;

        Ok(Self {
            store: parts.store,
            session,
            updates,
            notifier,
            dispatcher: Arc::new(dispatcher),
            inbound: Mutex::new(Some(inbound_rx)),
            tasks: Mutex::new(Vec::new()),
            auto_upgrade: parts.auto_upgrade,
        })
    }

    pub fn session(&self) -> &Arc<SessionManager> {
        &self.session
    }

    pub fn updates(&self) -> &Arc<UpdateManager> {
        &self.updates
    }

    pub fn store(&self) -> &Arc<dyn CredentialStore> {
        &self.store
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ClientEvent> {
        self.notifier.subscribe()
    }

    /// Spawn the event loop and the update progress forwarder. Later calls
    /// do nothing.
    pub fn spawn(&self) {
        let Some(inbound) = self.inbound.lock().take() else {
            debug!("Runtime already running");
            return;
        };

        let mut tasks = self.tasks.lock();
        tasks.push(tokio::spawn(run_event_loop(
            inbound,
            self.dispatcher.clone(),
            self.session.clone(),
        )));
        tasks.push(tokio::spawn(forward_update_phases(
            self.updates.subscribe(),
            self.notifier.clone(),
        )));
        if self.auto_upgrade {
            tasks.push(tokio::spawn(upgrade_when_available(
                self.notifier.subscribe(),
                self.updates.clone(),
            )));
        }
    }

    /// Start a session with the last persisted login, if there is one.
    pub async fn resume_last_user(&self) -> SessionResult<Option<Credential>> {
        let Some(credential) = self.store.last_user()? else {
            return Ok(None);
        };
        info!(email = %credential.email, "Resuming last user");
        self.session
            .start(&credential.email, &credential.password)
            .await?;
        Ok(Some(credential))
    }

    /// Stop the session and every background task.
    pub async fn shutdown(&self) {
        self.session.stop().await;
        for task in std::mem::take(&mut *self.tasks.lock()) {
            task.abort();
        }
        info!("Client runtime stopped");
    }
}

/// Dispatch inbound messages in arrival order, dropping those that belong
/// to a session that has since ended.
async fn run_event_loop(
    mut inbound: mpsc::UnboundedReceiver<Inbound>,
    dispatcher: Arc<MessageDispatcher>,
    session: Arc<SessionManager>,
) {
    while let Some(Inbound { epoch, message }) = inbound.recv().await {
        if !session.accepts(epoch) {
            debug!(epoch, kind = %message.kind, "Dropping message from closed session");
            continue;
        }
        dispatcher.dispatch(&message).await;
    }
    debug!("Inbound channel closed, event loop done");
}

async fn forward_update_phases(
    mut phases: broadcast::Receiver<self_updater::UpdatePhase>,
    notifier: Notifier,
) {
    loop {
        match phases.recv().await {
            Ok(phase) => notifier.notify(ClientEvent::UpgradeProgress { phase }),
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(skipped, "Update progress lagged");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

async fn upgrade_when_available(
    mut events: broadcast::Receiver<ClientEvent>,
    updates: Arc<UpdateManager>,
) {
    loop {
        match events.recv().await {
            Ok(ClientEvent::UpgradeAvailable { version }) => {
                info!(version = %version, "Starting automatic upgrade");
                let updates = updates.clone();
                tokio::spawn(async move {
                    match updates.start_upgrade().await {
                        Ok(record) => info!(version = %record.version, "Automatic upgrade done"),
                        Err(UpdateError::UpgradeInProgress) => {
                            debug!("Upgrade already running")
                        }
                        Err(e) => warn!(error = %e, "Automatic upgrade failed"),
                    }
                });
            }
            Ok(_) => {}
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(skipped, "Client events lagged");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}
