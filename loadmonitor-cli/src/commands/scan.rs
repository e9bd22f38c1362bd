//! Scan command - run scans in-process and print airports with activity.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use loadmonitor::protocol::AirportLoad;
use loadmonitor::tracker::ScanReport;
use tracing::warn;

use super::common::{file_tracker, format_update, resolve_interval};
use crate::error::CliError;
use crate::runner::CliRunner;

const POLL_STEP: Duration = Duration::from_millis(100);

/// Arguments for the scan command.
pub struct ScanArgs {
    pub airports: PathBuf,
    pub flights: PathBuf,
    pub count: u32,
    pub interval: Option<u64>,
}

/// Run the scan command.
pub fn run(
    args: ScanArgs,
    config_path: Option<&Path>,
    log_level: Option<&str>,
) -> Result<(), CliError> {
    let runner = CliRunner::new(config_path, log_level)?;
    runner.log_startup("scan");
    let config = runner.config();

    let interval = resolve_interval(args.interval, config.monitor.interval);
    let mut tracker = file_tracker(&args.airports, &args.flights, config.range)?;
    let shutdown = runner.shutdown_on_ctrlc()?;

    for scan in 1..=args.count {
        match tracker.scan() {
            Ok(report) => {
                let lines = active_lines(&report);
                if lines.is_empty() {
                    println!("Scan {}/{}: no activity", scan, args.count);
                } else {
                    println!("Scan {}/{}:", scan, args.count);
                    for update in lines {
                        println!("  {}", format_update(&update));
                    }
                }
            }
            // One bad read should not end a multi-scan run
            Err(e) if args.count > 1 => warn!(scan, error = %e, "Scan failed"),
            Err(e) => return Err(e.into()),
        }

        if scan == args.count {
            break;
        }

        // Wait for the next scan, polling for Ctrl+C
        let next = Instant::now() + interval;
        while Instant::now() < next && !shutdown.is_cancelled() {
            std::thread::sleep(POLL_STEP.min(next.saturating_duration_since(Instant::now())));
        }
        if shutdown.is_cancelled() {
            break;
        }
    }

    Ok(())
}

/// Airports with at least one event, in catalog order.
fn active_lines(report: &ScanReport) -> Vec<AirportLoad> {
    report
        .active()
        .map(|(code, events)| AirportLoad::from_events(code, events))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use loadmonitor::catalog::{Location, LocationCatalog};
    use loadmonitor::feed::{Observation, StaticFeed};
    use loadmonitor::tracker::{FlightTracker, RangeConfig};
    use std::sync::Arc;

    #[test]
    fn test_active_lines_only_lists_airports_with_events() {
        let catalog = Arc::new(LocationCatalog::new(vec![
            Location::new("Los Angeles", "LAX", 33.94, -118.41),
            Location::new("New York", "JFK", 40.64, -73.78),
        ]));
        let feed = StaticFeed::new();
        feed.push_batch(vec![Observation::new("UAL1", 40.65, -73.77, 60.0, -3.0)]);
        let mut tracker = FlightTracker::new(catalog, Box::new(feed), RangeConfig::default());

        let lines = active_lines(&tracker.scan().unwrap());
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].airport_code, "JFK");
        assert_eq!(lines[0].arriving_flights, vec!["UAL1"]);
    }
}
