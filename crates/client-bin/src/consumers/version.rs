use super::{field, str_field};
use crate::events::{ClientEvent, Notifier};
use anyhow::Context;
use async_trait::async_trait;
use client_config_and_utils::{HostPlatform, CLIENT_VERSION};
use client_storage::{CredentialStore, UpdateRecord};
use message_dispatcher::Consumer;
use self_updater::{select_binary, BinaryEntry, UpdateManager};
use service_connection::Fields;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// `version_info {version, binaries[]}`: the newest client release.
pub struct VersionInfoConsumer {
    store: Arc<dyn CredentialStore>,
    updates: Arc<UpdateManager>,
    notifier: Notifier,
    host: HostPlatform,
    running_version: String,
}

impl VersionInfoConsumer {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        updates: Arc<UpdateManager>,
        notifier: Notifier,
        host: HostPlatform,
    ) -> Self {
        Self {
            store,
            updates,
            notifier,
            host,
            running_version: CLIENT_VERSION.to_string(),
        }
    }

    /// Compare announcements against `version` instead of this build's.
    pub fn with_running_version(mut self, version: impl Into<String>) -> Self {
        self.running_version = version.into();
        self
    }

    /// Record the first binary that runs on this host.
    fn save_new_version(&self, version: &str, binaries: &[BinaryEntry]) -> anyhow::Result<Option<UpdateRecord>> {
        let Some(binary) = select_binary(binaries, &self.host) else {
            debug!(version, host = ?self.host, "No binary for this platform");
            return Ok(None);
        };

        let record = self.store.add_update(
            binary.version.as_deref().unwrap_or(version),
            &binary.file,
            self.host.platform,
            &binary.arch,
        )?;
        Ok(Some(record))
    }
}

#[async_trait]
impl Consumer for VersionInfoConsumer {
    async fn consume(&self, fields: &Fields) -> anyhow::Result<()> {
        let version = str_field(fields, "version")?;
        if version == self.running_version {
            return Ok(());
        }

        let record = match self.store.get_update(version)? {
            Some(record) => record,
            None => {
                let binaries: Vec<BinaryEntry> =
                    serde_json::from_value(field(fields, "binaries")?.clone())
                        .context("invalid `binaries` list")?;
                match self.save_new_version(version, &binaries)? {
                    Some(record) => record,
                    None => return Ok(()),
                }
            }
        };

        if record.is_installed {
            return Ok(());
        }

        info!(version = %record.version, "Upgrade available");
        self.notifier.notify(ClientEvent::UpgradeAvailable {
            version: record.version.clone(),
        });
        if let Err(e) = self.updates.announce(record) {
            warn!(error = %e, "Update announcement ignored");
        }
        Ok(())
    }
}
