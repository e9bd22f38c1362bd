//! LoadMonitor CLI - Command-line interface
//!
//! Runs the load server, one-off scans, and an interactive watch client on
//! top of the `loadmonitor` library.

mod commands;
mod error;
mod runner;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::builder::PossibleValuesParser;
use clap::{Parser, Subcommand};
use loadmonitor::logging::LOG_LEVELS;

use commands::{scan, serve, watch};
use error::CliError;

#[derive(Debug, Parser)]
#[command(name = "loadmonitor")]
#[command(version = loadmonitor::VERSION)]
#[command(about = "Live airport arrival/departure monitor", long_about = None)]
struct Cli {
    /// Config file (default: platform config dir, loadmonitor/config.ini)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Log level; RUST_LOG takes precedence
    #[arg(long, global = true, value_name = "LEVEL", value_parser = PossibleValuesParser::new(LOG_LEVELS))]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run the scanner and serve updates over WebSocket until Ctrl+C
    Serve {
        /// Airport list (City,IATA,Latitude,Longitude per line)
        airports: PathBuf,

        /// Position report file (OpenSky states JSON), re-read every tick
        flights: PathBuf,

        /// Listen address
        #[arg(long, value_name = "ADDR")]
        bind: Option<String>,

        /// Seconds between scans
        #[arg(long, value_name = "SECS", value_parser = clap::value_parser!(u64).range(1..))]
        interval: Option<u64>,
    },

    /// Run scans in-process and print airports with activity
    Scan {
        /// Airport list (City,IATA,Latitude,Longitude per line)
        airports: PathBuf,

        /// Position report file (OpenSky states JSON)
        flights: PathBuf,

        /// Number of scans to run
        #[arg(long, short = 'n', default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
        count: u32,

        /// Seconds between scans
        #[arg(long, value_name = "SECS", value_parser = clap::value_parser!(u64).range(1..))]
        interval: Option<u64>,
    },

    /// Subscribe to a running server and print pushed updates
    Watch {
        /// Server URL
        #[arg(long, default_value = watch::DEFAULT_SERVER_URL)]
        server: String,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    let config = cli.config.as_deref();
    let log_level = cli.log_level.as_deref();

    match cli.command {
        Commands::Serve {
            airports,
            flights,
            bind,
            interval,
        } => serve::run(
            serve::ServeArgs {
                airports,
                flights,
                bind,
                interval,
            },
            config,
            log_level,
        ),
        Commands::Scan {
            airports,
            flights,
            count,
            interval,
        } => scan::run(
            scan::ScanArgs {
                airports,
                flights,
                count,
                interval,
            },
            config,
            log_level,
        ),
        Commands::Watch { server } => watch::run(watch::WatchArgs { server }, config, log_level),
    }
}
