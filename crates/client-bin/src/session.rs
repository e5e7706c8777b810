//! Session lifecycle.
//!
//! [`SessionManager`] owns the credential of the running session and its
//! [`ConnectionSupervisor`]. Each session gets a fresh epoch; messages from
//! older sessions are ignored by the event loop via [`SessionManager::accepts`].

use crate::events::{ClientEvent, Notifier};
use crate::{SessionError, SessionResult};
use client_storage::{Credential, CredentialStore};
use parking_lot::Mutex;
use service_connection::{ConnectionSupervisor, Connector, Inbound, TransportOptions};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

struct ActiveSession {
    credential: Credential,
    supervisor: Arc<ConnectionSupervisor>,
    authenticated: bool,
}

pub struct SessionManager {
    store: Arc<dyn CredentialStore>,
    connector: Arc<dyn Connector>,
    options: TransportOptions,
    inbound: mpsc::UnboundedSender<Inbound>,
    notifier: Notifier,
    active: Mutex<Option<ActiveSession>>,
    next_epoch: AtomicU64,
}

impl SessionManager {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        connector: Arc<dyn Connector>,
        options: TransportOptions,
        inbound: mpsc::UnboundedSender<Inbound>,
        notifier: Notifier,
    ) -> Self {
        Self {
            store,
            connector,
            options,
            inbound,
            notifier,
            active: Mutex::new(None),
            next_epoch: AtomicU64::new(1),
        }
    }

    /// Start a session and open both service connections.
    ///
    /// Calling this again for the running credential is a no-op; any other
    /// credential fails with [`SessionError::AlreadyActive`] until
    /// [`stop`](Self::stop).
    pub async fn start(&self, email: &str, password: &str) -> SessionResult<()> {
        let credential = Credential::new(email, password);

        let (supervisor, epoch) = {
            let mut active = self.active.lock();
            if let Some(session) = active.as_ref() {
                if session.credential == credential {
                    debug!(email, "Session already running");
                    return Ok(());
                }
                return Err(SessionError::AlreadyActive(session.credential.email.clone()));
            }

            let epoch = self.next_epoch.fetch_add(1, Ordering::SeqCst);
            let supervisor = Arc::new(ConnectionSupervisor::new(
                self.connector.as_ref(),
                self.options,
                self.inbound.clone(),
                epoch,
            ));
            *active = Some(ActiveSession {
                credential: credential.clone(),
                supervisor: supervisor.clone(),
                authenticated: false,
            });
            (supervisor, epoch)
        };

        info!(email, epoch, "Starting session");

        if let Err(e) = supervisor.open(&credential).await {
            let mut active = self.active.lock();
            if active
                .as_ref()
                .is_some_and(|session| session.supervisor.epoch() == epoch)
            {
                *active = None;
            }
            return Err(e.into());
        }

        Ok(())
    }

    /// Close the running session, if any. Persisted credentials are kept.
    pub async fn stop(&self) {
        let session = self.active.lock().take();
        if let Some(session) = session {
            info!(epoch = session.supervisor.epoch(), "Stopping session");
            session.supervisor.close().await;
        }
    }

    /// Stop the session and forget the persisted credential.
    pub async fn logout(&self) -> SessionResult<()> {
        self.stop().await;
        self.store.delete_user()?;
        info!("Logged out");
        Ok(())
    }

    pub fn is_active(&self) -> bool {
        self.active.lock().is_some()
    }

    /// Whether a message tagged with `epoch` belongs to the running session.
    pub fn accepts(&self, epoch: u64) -> bool {
        self.active
            .lock()
            .as_ref()
            .is_some_and(|session| session.supervisor.epoch() == epoch)
    }

    pub fn current_credential(&self) -> Option<Credential> {
        self.active
            .lock()
            .as_ref()
            .map(|session| session.credential.clone())
    }

    /// The server accepted the credentials: persist them and tell the
    /// presentation layer. Only the first confirmation per session counts.
    pub fn confirm_authenticated(&self) -> SessionResult<()> {
        let credential = {
            let mut active = self.active.lock();
            let session = active.as_mut().ok_or(SessionError::NotActive)?;
            if session.authenticated {
                return Ok(());
            }
            session.authenticated = true;
            session.credential.clone()
        };

        self.store.add_user(&credential.email, &credential.password)?;
        info!(email = %credential.email, "Authenticated");

        self.notifier.notify(ClientEvent::Authenticated {
            email: credential.email,
        });
        self.notifier.notify(ClientEvent::MinimizeToBackground);
        Ok(())
    }

    /// The server rejected the credentials: show its message, end the
    /// session, and drop any persisted copy.
    pub async fn reject_authentication(&self, message: &str) -> SessionResult<()> {
        warn!(message, "Authentication rejected");
        self.notifier.notify(ClientEvent::AuthFailed {
            message: message.to_string(),
        });
        self.stop().await;
        self.store.delete_user()?;
        Ok(())
    }

    /// A connection failed after opening; the whole session goes down.
    pub async fn handle_connection_failure(&self, connection: &str, reason: &str) {
        if !self.is_active() {
            debug!(connection, "Connection failure after session end ignored");
            return;
        }

        warn!(connection, reason, "Closing session after connection failure");
        self.stop().await;

        self.notifier.notify(ClientEvent::SessionClosed {
            reason: format!("{} connection failed: {}", connection, reason),
        });
    }
}
