//! CLI error type.

use std::path::PathBuf;

use loadmonitor::broadcast::CoordinatorError;
use loadmonitor::catalog::CatalogError;
use loadmonitor::config::ConfigError;
use loadmonitor::feed::FeedError;
use loadmonitor::logging::LoggingError;
use loadmonitor::server::ServerError;
use thiserror::Error;
use tokio_tungstenite::tungstenite;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Logging setup failed: {0}")]
    Logging(#[from] LoggingError),

    #[error("Failed to load airports: {0}")]
    Catalog(#[from] CatalogError),

    #[error("No usable airports in {}", .0.display())]
    EmptyCatalog(PathBuf),

    #[error("Scan failed: {0}")]
    Feed(#[from] FeedError),

    #[error(transparent)]
    Coordinator(#[from] CoordinatorError),

    #[error("Server error: {0}")]
    Server(#[from] ServerError),

    #[error("Connection error: {0}")]
    Connection(#[from] tungstenite::Error),

    #[error("Failed to start async runtime: {0}")]
    Runtime(#[source] std::io::Error),

    #[error("Failed to encode request: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("Failed to read input: {0}")]
    Input(#[source] std::io::Error),

    #[error("Failed to set signal handler: {0}")]
    Signal(#[from] ctrlc::Error),
}
