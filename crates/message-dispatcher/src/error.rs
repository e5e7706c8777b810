//! Dispatcher error types.

use service_connection::MessageKind;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    /// A consumer is already registered for this kind.
    #[error("consumer already registered for {0}")]
    DuplicateKind(MessageKind),

    #[error("unknown message kind: {0}")]
    UnknownMessageKind(String),

    #[error("no consumer registered for {0}")]
    NoConsumer(MessageKind),

    #[error("{kind} consumer failed: {reason}")]
    ConsumerFailed { kind: MessageKind, reason: String },

    #[error("{0} consumer panicked")]
    ConsumerPanicked(MessageKind),
}

/// Result type alias using DispatchError.
pub type DispatchResult<T> = Result<T, DispatchError>;
