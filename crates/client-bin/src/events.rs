//! Notifications for the presentation layer.

use self_updater::UpdatePhase;
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::debug;

/// Something the user interface should react to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ClientEvent {
    Authenticated { email: String },
    /// Server's rejection message, shown as is.
    AuthFailed { message: String },
    MinimizeToBackground,
    BalanceUpdated { text: String },
    UpgradeAvailable { version: String },
    UpgradeProgress { phase: UpdatePhase },
    SessionClosed { reason: String },
}

/// Fan-out of [`ClientEvent`]s to any number of listeners.
#[derive(Debug, Clone)]
pub struct Notifier {
    tx: broadcast::Sender<ClientEvent>,
}

impl Notifier {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ClientEvent> {
        self.tx.subscribe()
    }

    pub fn notify(&self, event: ClientEvent) {
        debug!(event = ?event, "Client event");
        // Nobody listening is fine.
        let _ = self.tx.send(event);
    }
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new(64)
    }
}
