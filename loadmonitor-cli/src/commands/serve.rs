//! Serve command - scan on a timer and push updates over WebSocket.

use std::path::{Path, PathBuf};

use loadmonitor::broadcast::BroadcastCoordinator;
use loadmonitor::server;
use tracing::info;

use super::common::{file_tracker, resolve_interval};
use crate::error::CliError;
use crate::runner::CliRunner;

/// Arguments for the serve command.
pub struct ServeArgs {
    pub airports: PathBuf,
    pub flights: PathBuf,
    pub bind: Option<String>,
    pub interval: Option<u64>,
}

/// Run the serve command.
pub fn run(
    args: ServeArgs,
    config_path: Option<&Path>,
    log_level: Option<&str>,
) -> Result<(), CliError> {
    let mut runner = CliRunner::new(config_path, log_level)?;
    runner.log_startup("serve");

    // CLI > config > defaults
    let config = runner.config_mut();
    config.monitor.interval = resolve_interval(args.interval, config.monitor.interval);
    if let Some(bind) = args.bind {
        config.server.bind = bind;
    }
    let config = runner.config();

    let tracker = file_tracker(&args.airports, &args.flights, config.range)?;
    let airports = tracker.catalog().len();
    let coordinator = BroadcastCoordinator::new(tracker, config.coordinator_config());

    println!("LoadMonitor Server v{}", loadmonitor::VERSION);
    println!("========================");
    println!();
    println!("Airports:  {} ({})", args.airports.display(), airports);
    println!("Flights:   {}", args.flights.display());
    println!("Listen:    ws://{}", config.server.bind);
    println!("Interval:  {}s", config.monitor.interval.as_secs());
    println!("Policy:    {} / {}", config.monitor.mode, config.monitor.push_policy);
    println!();
    println!("Press Ctrl+C to stop");
    println!();

    let shutdown = runner.shutdown_on_ctrlc()?;
    let runtime = runner.runtime()?;
    let bind = config.server.bind.clone();

    runtime.block_on(async move {
        let listener = server::bind(&bind).await?;
        let tick_loop = coordinator.start(shutdown.clone())?;

        let served = server::serve(listener, coordinator.clone(), shutdown.clone()).await;

        // Stop the tick loop even if the server failed
        shutdown.cancel();
        let _ = tick_loop.await;
        served?;

        info!("Server stopped");
        Ok::<(), CliError>(())
    })?;

    println!("Server stopped.");
    Ok(())
}
