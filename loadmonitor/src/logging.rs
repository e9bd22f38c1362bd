//! Logging setup.
//!
//! Installs a `tracing` subscriber that writes to stderr and, optionally,
//! to a log file through a non-blocking writer. `RUST_LOG` takes precedence
//! over the configured level.

use std::path::{Path, PathBuf};

use thiserror::Error;
use time::format_description::well_known::Rfc3339;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::time::LocalTime;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

/// Level names accepted in config and on the command line.
pub const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Errors from installing the subscriber.
#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("Failed to create log directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid log filter '{0}'")]
    Filter(String),

    #[error("Logging already initialized: {0}")]
    AlreadyInitialized(String),
}

/// `[logging]` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    /// Default level when `RUST_LOG` is unset.
    pub level: String,
    /// Optional log file; stderr only when `None`.
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}

impl LoggingConfig {
    pub fn is_valid_level(level: &str) -> bool {
        LOG_LEVELS.contains(&level)
    }

    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.level = level.into();
        self
    }

    pub fn with_file(mut self, file: impl Into<PathBuf>) -> Self {
        self.file = Some(file.into());
        self
    }

    /// Filter from `RUST_LOG`, falling back to the configured level.
    pub fn filter(&self) -> Result<EnvFilter, LoggingError> {
        EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(&self.level))
            .map_err(|_| LoggingError::Filter(self.level.clone()))
    }
}

/// Keeps the file writer flushing. Hold it until the process exits.
#[must_use = "dropping the guard stops file logging"]
#[derive(Debug)]
pub struct LoggingGuard {
    _file: Option<WorkerGuard>,
}

/// Install the global subscriber.
pub fn init_logging(config: &LoggingConfig) -> Result<LoggingGuard, LoggingError> {
    let filter = config.filter()?;

    let stderr_layer = fmt::layer()
        .with_timer(LocalTime::new(Rfc3339))
        .with_target(false)
        .with_writer(std::io::stderr);

    let (file_layer, file_guard) = match &config.file {
        Some(path) => {
            let (writer, guard) = file_writer(path)?;
            let layer = fmt::layer()
                .with_timer(LocalTime::new(Rfc3339))
                .with_ansi(false)
                .with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| LoggingError::AlreadyInitialized(e.to_string()))?;

    if let Some(path) = &config.file {
        tracing::info!(path = %path.display(), "File logging enabled");
    }

    Ok(LoggingGuard { _file: file_guard })
}

fn file_writer(
    path: &Path,
) -> Result<(tracing_appender::non_blocking::NonBlocking, WorkerGuard), LoggingError> {
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&dir).map_err(|source| LoggingError::CreateDir {
        path: dir.clone(),
        source,
    })?;

    let file_name = path
        .file_name()
        .map(|name| name.to_os_string())
        .unwrap_or_else(|| "loadmonitor.log".into());
    let appender = tracing_appender::rolling::never(dir, file_name);
    Ok(tracing_appender::non_blocking(appender))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_levels() {
        for level in LOG_LEVELS {
            assert!(LoggingConfig::is_valid_level(level));
        }
        assert!(!LoggingConfig::is_valid_level("loud"));
        assert!(!LoggingConfig::is_valid_level("INFO"));
    }

    #[test]
    fn test_builders() {
        let config = LoggingConfig::default()
            .with_level("debug")
            .with_file("/var/log/loadmonitor.log");
        assert_eq!(config.level, "debug");
        assert_eq!(
            config.file.as_deref(),
            Some(Path::new("/var/log/loadmonitor.log"))
        );
    }

    #[test]
    fn test_file_writer_creates_parent_dir() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("monitor.log");

        let (_writer, _guard) = file_writer(&path).unwrap();
        assert!(dir.path().join("nested").is_dir());
    }
}
