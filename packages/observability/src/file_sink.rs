//! Log file sink.
//!
//! Appends JSON lines to the client log file and optionally mirrors a compact
//! human-readable stream to stderr.

use crate::json_layer::JsonLayer;
use crate::LogConfig;
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Default log file location (`~/.chainprox/logs/client.jsonl`).
fn default_log_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".chainprox").join("logs").join("client.jsonl"))
}

/// Append-mode file writer, flushed after every line.
#[derive(Clone)]
pub struct LogFileWriter {
    inner: Arc<Mutex<BufWriter<File>>>,
}

impl LogFileWriter {
    pub fn new(path: &Path) -> io::Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new().create(true).append(true).open(path)?;

        Ok(Self {
            inner: Arc::new(Mutex::new(BufWriter::with_capacity(8192, file))),
        })
    }
}

impl io::Write for LogFileWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut guard = self.inner.lock();
        let written = guard.write(buf)?;
        guard.flush()?;
        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.lock().flush()
    }
}

#[derive(Clone)]
pub struct WriterFactory {
    writer: LogFileWriter,
}

impl<'a> MakeWriter<'a> for WriterFactory {
    type Writer = LogFileWriter;

    fn make_writer(&'a self) -> Self::Writer {
        self.writer.clone()
    }
}

fn env_filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
}

/// Install the global subscriber. Safe to call more than once; later calls
/// are ignored.
pub fn init_file_subscriber(config: &LogConfig) {
    let log_path = config.log_path.clone().or_else(default_log_path);

    let (json_layer, open_error) = match log_path.as_deref().map(LogFileWriter::new) {
        Some(Ok(writer)) => (
            Some(
                JsonLayer::new(config.service_name.clone(), WriterFactory { writer })
                    .with_filter(env_filter(&config.default_level)),
            ),
            None,
        ),
        Some(Err(e)) => (None, Some(e.to_string())),
        None => (None, Some("home directory not found".to_string())),
    };

    // Without a log file, stderr is the only place left to write to.
    let stderr_layer = if config.also_stderr || json_layer.is_none() {
        Some(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .compact()
                .with_writer(io::stderr)
                .with_filter(env_filter(&config.default_level)),
        )
    } else {
        None
    };

    let installed = tracing_subscriber::registry()
        .with(json_layer)
        .with(stderr_layer)
        .try_init()
        .is_ok();

    if !installed {
        return;
    }

    match open_error {
        None => tracing::info!(
            log_path = ?log_path,
            service = %config.service_name,
            "logging initialized"
        ),
        Some(error) => tracing::warn!(
            log_path = ?log_path,
            error = %error,
            "log file unavailable, logging to stderr only"
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use tempfile::tempdir;

    #[test]
    fn test_log_file_writer_appends() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("logs").join("client.jsonl");

        let mut writer = LogFileWriter::new(&path).unwrap();
        writer.write_all(b"first\n").unwrap();
        let mut second = LogFileWriter::new(&path).unwrap();
        second.write_all(b"second\n").unwrap();

        let mut content = String::new();
        File::open(&path)
            .unwrap()
            .read_to_string(&mut content)
            .unwrap();
        assert_eq!(content, "first\nsecond\n");
    }

    #[test]
    fn test_writer_creates_parent_dirs() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("deeply").join("nested").join("client.jsonl");

        assert!(LogFileWriter::new(&path).is_ok());
        assert!(path.parent().unwrap().exists());
    }
}
