//! Connection error types.

use crate::ConnectionId;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConnectionError {
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// Every connect attempt for one connection failed.
    #[error("{connection} connection failed: {reason}")]
    ConnectFailed {
        connection: ConnectionId,
        reason: String,
    },

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Malformed frame: {0}")]
    MalformedFrame(String),

    /// The open was abandoned because the supervisor was closed.
    #[error("Open cancelled")]
    Cancelled,

    #[error("Connection closed")]
    Closed,
}

impl ConnectionError {
    pub fn connect_failed(connection: ConnectionId, reason: impl Into<String>) -> Self {
        Self::ConnectFailed {
            connection,
            reason: reason.into(),
        }
    }
}

/// Result type alias using ConnectionError.
pub type ConnectionResult<T> = Result<T, ConnectionError>;
