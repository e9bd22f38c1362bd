//! Common helpers shared across CLI commands.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use loadmonitor::catalog::LocationCatalog;
use loadmonitor::feed::FileFeed;
use loadmonitor::protocol::AirportLoad;
use loadmonitor::tracker::{FlightTracker, RangeConfig};

use crate::error::CliError;

/// Load the airport catalog, refusing a file with no usable lines.
pub fn load_catalog(path: &Path) -> Result<Arc<LocationCatalog>, CliError> {
    let catalog = LocationCatalog::load_from_file(path)?;
    if catalog.is_empty() {
        return Err(CliError::EmptyCatalog(path.to_path_buf()));
    }
    Ok(Arc::new(catalog))
}

/// Tracker reading `flights` on every scan.
pub fn file_tracker(
    airports: &Path,
    flights: &Path,
    range: RangeConfig,
) -> Result<FlightTracker, CliError> {
    let catalog = load_catalog(airports)?;
    Ok(FlightTracker::new(
        catalog,
        Box::new(FileFeed::new(flights)),
        range,
    ))
}

/// CLI seconds override, else the configured duration.
pub fn resolve_interval(cli_secs: Option<u64>, configured: Duration) -> Duration {
    cli_secs.map(Duration::from_secs).unwrap_or(configured)
}

/// One console line for an update.
pub fn format_update(update: &AirportLoad) -> String {
    format!("[{}] {}", chrono::Local::now().format("%H:%M:%S"), update)
}
