//! The consumer registration table and dispatch loop body.

use crate::{DispatchError, DispatchResult};
use async_trait::async_trait;
use futures_util::FutureExt;
use service_connection::{Fields, Message, MessageKind};
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Handler for one message kind.
#[async_trait]
pub trait Consumer: Send + Sync {
    async fn consume(&self, fields: &Fields) -> anyhow::Result<()>;
}

/// What happened to a dispatched message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    Handled(MessageKind),
    /// The message was logged and dropped.
    Discarded(DispatchError),
}

impl DispatchOutcome {
    pub fn is_handled(&self) -> bool {
        matches!(self, DispatchOutcome::Handled(_))
    }
}

/// Maps message kinds to consumers.
///
/// Built once at startup with [`register`](Self::register), then shared
/// read-only. Dispatch never fails: unknown kinds, missing consumers, and
/// consumer errors or panics are logged and reported as
/// [`DispatchOutcome::Discarded`].
#[derive(Default)]
pub struct MessageDispatcher {
    consumers: HashMap<MessageKind, Arc<dyn Consumer>>,
}

impl MessageDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the consumer for `kind`. The first registration wins.
    pub fn register(&mut self, kind: MessageKind, consumer: Arc<dyn Consumer>) -> DispatchResult<()> {
        if self.consumers.contains_key(&kind) {
            return Err(DispatchError::DuplicateKind(kind));
        }
        self.consumers.insert(kind, consumer);
        debug!(kind = %kind, "Consumer registered");
        Ok(())
    }

    pub fn is_registered(&self, kind: MessageKind) -> bool {
        self.consumers.contains_key(&kind)
    }

    pub async fn dispatch(&self, message: &Message) -> DispatchOutcome {
        let Some(kind) = message.known_kind() else {
            warn!(kind = %message.kind, "Kind not recognized, message discarded");
            return DispatchOutcome::Discarded(DispatchError::UnknownMessageKind(
                message.kind.clone(),
            ));
        };

        let Some(consumer) = self.consumers.get(&kind) else {
            warn!(kind = %kind, "No consumer registered, message discarded");
            return DispatchOutcome::Discarded(DispatchError::NoConsumer(kind));
        };

        match AssertUnwindSafe(consumer.consume(&message.fields))
            .catch_unwind()
            .await
        {
            Ok(Ok(())) => {
                debug!(kind = %kind, "Message consumed");
                DispatchOutcome::Handled(kind)
            }
            Ok(Err(e)) => {
                error!(kind = %kind, error = %format!("{:#}", e), "Consumer failed");
                DispatchOutcome::Discarded(DispatchError::ConsumerFailed {
                    kind,
                    reason: e.to_string(),
                })
            }
            Err(_) => {
                error!(kind = %kind, "Consumer panicked");
                DispatchOutcome::Discarded(DispatchError::ConsumerPanicked(kind))
            }
        }
    }
}
