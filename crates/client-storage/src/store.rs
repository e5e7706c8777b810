//! The narrow persistence interface used by the session and update logic.

use crate::{Credential, StorageResult, UpdateRecord};
use client_config_and_utils::Platform;

/// Persistence of the last login and the update catalog.
///
/// Implementations must be safe to share across tasks; calls are short and
/// synchronous.
pub trait CredentialStore: Send + Sync {
    /// Persist `email`/`password` as the most recent login.
    fn add_user(&self, email: &str, password: &str) -> StorageResult<()>;

    /// Forget every persisted login.
    fn delete_user(&self) -> StorageResult<()>;

    /// The most recently persisted login, if any.
    fn last_user(&self) -> StorageResult<Option<Credential>>;

    fn get_update(&self, version: &str) -> StorageResult<Option<UpdateRecord>>;

    /// Record an announced update. Returns the existing record unchanged if
    /// the version is already known.
    fn add_update(
        &self,
        version: &str,
        url: &str,
        platform: Platform,
        arch: &str,
    ) -> StorageResult<UpdateRecord>;

    fn mark_downloaded(&self, version: &str) -> StorageResult<()>;

    fn mark_installed(&self, version: &str) -> StorageResult<()>;

    /// Clear the downloaded flag, e.g. after the staged file was consumed.
    fn remove_downloaded(&self, version: &str) -> StorageResult<()>;

    /// The most recently announced update.
    fn last_update(&self) -> StorageResult<Option<UpdateRecord>>;
}
