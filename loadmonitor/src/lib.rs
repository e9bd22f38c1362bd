//! LoadMonitor - live airport arrival/departure load
//!
//! Periodically scans aircraft position reports, classifies each flight
//! against a catalog of airports, diffs the result against the previous
//! scan to detect arrivals and departures, and pushes per-airport summaries
//! to subscribers.
//!
//! # Layout
//!
//! - [`catalog`] - airport catalog and its CSV loader
//! - [`feed`] - position report sources
//! - [`tracker`] - range classification and scan diffing
//! - [`subscription`] - who watches which airports
//! - [`delivery`] - per-subscriber queues, workers and transports
//! - [`broadcast`] - the periodic tick and fan-out
//! - [`server`] - WebSocket transport
//! - [`protocol`] - wire messages
//! - [`config`] / [`logging`] - ambient setup

pub mod broadcast;
pub mod catalog;
pub mod config;
pub mod delivery;
pub mod feed;
pub mod logging;
pub mod protocol;
pub mod server;
pub mod subscription;
pub mod tracker;

/// Crate version, for `--version` output and logs.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
