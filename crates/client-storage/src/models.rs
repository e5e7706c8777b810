//! Stored record types.

use chrono::{DateTime, Utc};
use client_config_and_utils::Platform;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Login credential of a user.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    pub email: String,
    pub password: String,
}

impl Credential {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }
}

// Keep the password out of logs.
impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// An announced client release and its local progress.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateRecord {
    pub version: String,
    pub url: String,
    pub platform: Platform,
    pub arch: String,
    pub is_downloaded: bool,
    pub is_installed: bool,
    pub created_at: DateTime<Utc>,
}

impl UpdateRecord {
    /// File name of the download, taken from the URL's final path segment.
    pub fn file_name(&self) -> Option<&str> {
        let path = self.url.split(&['?', '#'][..]).next().unwrap_or_default();
        path.rsplit('/').next().filter(|name| !name.is_empty())
    }
}
