//! Binary selection from a version announcement.

use client_config_and_utils::HostPlatform;
use serde::{Deserialize, Serialize};

/// One downloadable build listed in a `version_info` message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BinaryEntry {
    /// Version of this build. Falls back to the announced version when absent.
    #[serde(default)]
    pub version: Option<String>,
    /// Download URL.
    pub file: String,
    pub platform: String,
    #[serde(default)]
    pub arch: String,
}

/// First entry built for `host`, if any.
pub fn select_binary<'a>(binaries: &'a [BinaryEntry], host: &HostPlatform) -> Option<&'a BinaryEntry> {
    binaries
        .iter()
        .find(|binary| host.matches(&binary.platform, &binary.arch))
}
