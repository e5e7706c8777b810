//! Client configuration.

use crate::{CoreError, CoreResult, Paths};
use serde::{Deserialize, Serialize};
use std::path::Path;
use url::Url;

/// Default manager service endpoint (can be overridden at compile time via CHAINPROX_MANAGER_URL).
pub const DEFAULT_MANAGER_URL: &str = match option_env!("CHAINPROX_MANAGER_URL") {
    Some(url) => url,
    None => "wss://chainprox.com/ws/manager",
};

/// Default fetcher service endpoint (can be overridden at compile time via CHAINPROX_FETCHER_URL).
pub const DEFAULT_FETCHER_URL: &str = match option_env!("CHAINPROX_FETCHER_URL") {
    Some(url) => url,
    None => "wss://chainprox.com/ws/fetcher",
};

/// Default log level.
pub const DEFAULT_LOG_LEVEL: &str = "info";

const LOG_LEVEL_ENV: &str = "CHAINPROX_LOG_LEVEL";

/// Main client configuration, stored as `config.json` in the data directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
    /// Manager service URL (`ws://` or `wss://`).
    pub manager_url: String,
    /// Fetcher service URL (`ws://` or `wss://`).
    pub fetcher_url: String,
    /// Use TLS for both service connections.
    pub tls_enabled: bool,
    /// Seconds between heartbeat pings on each connection.
    pub heartbeat_interval_secs: u64,
    /// Timeout for a single connect attempt.
    pub connect_timeout_secs: u64,
    /// Initial reconnect delay; doubles on every failed attempt.
    pub reconnect_base_delay_secs: u64,
    /// Upper bound for the reconnect delay.
    pub reconnect_max_delay_secs: u64,
    /// Connect attempts before the open is reported as failed.
    pub max_connect_attempts: u32,
    /// Install announced updates without waiting for the user.
    pub auto_upgrade: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            manager_url: DEFAULT_MANAGER_URL.to_string(),
            fetcher_url: DEFAULT_FETCHER_URL.to_string(),
            tls_enabled: true,
            heartbeat_interval_secs: 30,
            connect_timeout_secs: 10,
            reconnect_base_delay_secs: 2,
            reconnect_max_delay_secs: 30,
            max_connect_attempts: 5,
            auto_upgrade: false,
        }
    }
}

impl Config {
    /// Load configuration from the data directory, falling back to defaults
    /// when no file exists.
    pub fn load(paths: &Paths) -> CoreResult<Self> {
        let config_path = paths.config_file();

        let mut config = if config_path.exists() {
            Self::load_from_file(&config_path)?
        } else {
            Self::default()
        };

        config.load_from_env();
        config.validate()?;
        Ok(config)
    }

    pub fn load_from_file(path: &Path) -> CoreResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    pub fn save(&self, paths: &Paths) -> CoreResult<()> {
        paths.ensure_dirs()?;
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(paths.config_file(), content)?;
        Ok(())
    }

    /// Only the log level can be overridden from the environment.
    fn load_from_env(&mut self) {
        if let Ok(log_level) = std::env::var(LOG_LEVEL_ENV) {
            if !log_level.trim().is_empty() {
                self.log_level = log_level.trim().to_string();
            }
        }
    }

    fn validate(&self) -> CoreResult<()> {
        self.manager_url()?;
        self.fetcher_url()?;
        if self.reconnect_base_delay_secs > self.reconnect_max_delay_secs {
            return Err(CoreError::Config(format!(
                "reconnect_base_delay_secs ({}) exceeds reconnect_max_delay_secs ({})",
                self.reconnect_base_delay_secs, self.reconnect_max_delay_secs
            )));
        }
        Ok(())
    }

    pub fn manager_url(&self) -> CoreResult<Url> {
        Url::parse(&self.manager_url).map_err(CoreError::from)
    }

    pub fn fetcher_url(&self) -> CoreResult<Url> {
        Url::parse(&self.fetcher_url).map_err(CoreError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.log_level, DEFAULT_LOG_LEVEL);
        assert_eq!(config.manager_url, DEFAULT_MANAGER_URL);
        assert_eq!(config.fetcher_url, DEFAULT_FETCHER_URL);
        assert!(config.tls_enabled);
        assert!(!config.auto_upgrade);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("config.json");
        std::fs::write(&config_path, r#"{ "log_level": "debug", "auto_upgrade": true }"#).unwrap();

        let config = Config::load_from_file(&config_path).unwrap();
        assert_eq!(config.log_level, "debug");
        assert!(config.auto_upgrade);
        assert_eq!(config.heartbeat_interval_secs, 30);
        assert_eq!(config.manager_url, DEFAULT_MANAGER_URL);
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempdir().unwrap();
        let paths = Paths::with_base_dir(dir.path().to_path_buf());

        let config = Config {
            manager_url: "ws://127.0.0.1:9001/manager".to_string(),
            tls_enabled: false,
            ..Config::default()
        };
        config.save(&paths).unwrap();

        let loaded = Config::load_from_file(&paths.config_file()).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let dir = tempdir().unwrap();
        let paths = Paths::with_base_dir(dir.path().to_path_buf());

        let config = Config::load(&paths).unwrap();
        assert_eq!(config.fetcher_url, DEFAULT_FETCHER_URL);
    }

    #[test]
    fn test_invalid_url_rejected() {
        let dir = tempdir().unwrap();
        let paths = Paths::with_base_dir(dir.path().to_path_buf());
        std::fs::write(paths.config_file(), r#"{ "manager_url": "not a url" }"#).unwrap();

        assert!(matches!(Config::load(&paths), Err(CoreError::InvalidUrl(_))));
    }

    #[test]
    fn test_backoff_bounds_validated() {
        let config = Config {
            reconnect_base_delay_secs: 60,
            reconnect_max_delay_secs: 5,
            ..Config::default()
        };
        assert!(matches!(config.validate(), Err(CoreError::Config(_))));
    }

    #[test]
    fn test_malformed_json_is_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ nope").unwrap();

        assert!(matches!(Config::load_from_file(&path), Err(CoreError::Json(_))));
    }
}
