//! Configuration, filesystem layout, and small shared utilities for the
//! Chainprox client.

mod config;
mod error;
mod format;
mod logging;
mod paths;
mod platform;

pub use config::{Config, DEFAULT_FETCHER_URL, DEFAULT_LOG_LEVEL, DEFAULT_MANAGER_URL};
pub use error::{CoreError, CoreResult};
pub use format::format_size;
pub use logging::{init_logging, parse_level};
pub use paths::{InstallLayout, Paths};
pub use platform::{HostPlatform, Platform};

/// Version of the running client build.
pub const CLIENT_VERSION: &str = env!("CARGO_PKG_VERSION");
