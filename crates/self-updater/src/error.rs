//! Update error types.

use client_storage::StorageError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum UpdateError {
    /// An archive member resolves outside the extraction root.
    #[error("path traversal detected: {0}")]
    PathTraversalDetected(String),

    #[error("download failed: {0}")]
    DownloadFailed(String),

    #[error("install failed: {0}")]
    InstallFailed(String),

    #[error("an upgrade is already in progress")]
    UpgradeInProgress,

    #[error("no update available")]
    NoUpdateAvailable,

    #[error("version {0} is already installed")]
    AlreadyInstalled(String),

    #[error("invalid download URL: {0}")]
    InvalidUrl(String),

    #[error("invalid state transition: {0}")]
    InvalidStateTransition(String),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),
}

impl UpdateError {
    /// Whether the downloaded payload itself is unusable and should be
    /// fetched again on the next attempt.
    pub fn discards_download(&self) -> bool {
        matches!(
            self,
            UpdateError::PathTraversalDetected(_) | UpdateError::Zip(_)
        )
    }
}

/// Result type alias using UpdateError.
pub type UpdateResult<T> = Result<T, UpdateError>;
