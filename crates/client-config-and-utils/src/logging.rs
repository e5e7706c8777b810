//! Logging initialization for the client.
//!
//! Wraps the observability crate so every entry point sets up the same
//! JSONL file sink under the data directory.

use crate::Paths;

/// Initialize logging for the client.
///
/// Writes structured JSONL to `<data dir>/logs/client.jsonl` and mirrors a
/// compact stream to stderr. `RUST_LOG` takes precedence over `level`.
///
/// ```ignore
/// init_logging("info", &paths);
/// tracing::info!("client started");
/// ```
pub fn init_logging(level: &str, paths: &Paths) {
    observability::init_with_config(observability::LogConfig {
        service_name: "client".into(),
        default_level: parse_level(level).to_string().to_ascii_lowercase(),
        log_path: Some(paths.log_file()),
        also_stderr: true,
    });
}

/// Parse a log level string into a tracing Level.
pub fn parse_level(level: &str) -> tracing::Level {
    match level.to_lowercase().as_str() {
        "trace" => tracing::Level::TRACE,
        "debug" => tracing::Level::DEBUG,
        "info" => tracing::Level::INFO,
        "warn" | "warning" => tracing::Level::WARN,
        "error" => tracing::Level::ERROR,
        _ => tracing::Level::INFO,
    }
}
