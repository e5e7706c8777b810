//! Session error types.

use client_config_and_utils::CoreError;
use client_storage::StorageError;
use message_dispatcher::DispatchError;
use self_updater::UpdateError;
use service_connection::ConnectionError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SessionError {
    /// A session for another user is already running.
    #[error("a session is already active for {0}")]
    AlreadyActive(String),

    #[error("no active session")]
    NotActive,

    #[error("connection error: {0}")]
    Connection(#[from] ConnectionError),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("dispatch error: {0}")]
    Dispatch(#[from] DispatchError),

    #[error("update error: {0}")]
    Update(#[from] UpdateError),

    #[error("configuration error: {0}")]
    Core(#[from] CoreError),
}

/// Result type alias using SessionError.
pub type SessionResult<T> = Result<T, SessionError>;
