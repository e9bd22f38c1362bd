//! Shared command setup: config, logging, runtime, Ctrl+C.

use std::path::Path;

use loadmonitor::config::ConfigFile;
use loadmonitor::logging::{init_logging, LoggingGuard};
use tokio::runtime::Runtime;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::error::CliError;

/// Loaded config plus the logging guard for one command run.
pub struct CliRunner {
    config: ConfigFile,
    _logging: LoggingGuard,
}

impl CliRunner {
    /// Load config (CLI path, then default location, then defaults) and
    /// install logging. `log_level` overrides the configured level.
    pub fn new(config_path: Option<&Path>, log_level: Option<&str>) -> Result<Self, CliError> {
        let mut config = ConfigFile::load_or_default(config_path)?;
        if let Some(level) = log_level {
            config.logging.level = level.to_string();
        }
        let logging = init_logging(&config.logging)?;

        Ok(Self {
            config,
            _logging: logging,
        })
    }

    pub fn config(&self) -> &ConfigFile {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut ConfigFile {
        &mut self.config
    }

    pub fn log_startup(&self, command: &str) {
        info!(
            version = loadmonitor::VERSION,
            command,
            "LoadMonitor starting"
        );
    }

    pub fn runtime(&self) -> Result<Runtime, CliError> {
        tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .map_err(CliError::Runtime)
    }

    /// Token cancelled on the first Ctrl+C.
    pub fn shutdown_on_ctrlc(&self) -> Result<CancellationToken, CliError> {
        let token = CancellationToken::new();
        let handler_token = token.clone();
        ctrlc::set_handler(move || {
            if !handler_token.is_cancelled() {
                eprintln!();
                eprintln!("Received shutdown signal, stopping...");
                handler_token.cancel();
            }
        })?;
        Ok(token)
    }
}
