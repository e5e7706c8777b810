//! Core error types for the client.

use thiserror::Error;

/// Core error type for configuration and filesystem operations.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Home directory or executable location could not be resolved.
    #[error("Path error: {0}")]
    Path(String),

    #[error("Unsupported platform: {0}")]
    UnsupportedPlatform(String),
}

/// Result type alias using CoreError.
pub type CoreResult<T> = Result<T, CoreError>;
