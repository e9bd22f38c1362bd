//! Flight position feeds.
//!
//! A [`PositionFeed`] hands the tracker the full set of flight observations
//! for "now". The tracker owns its feed and calls it once per tick, so
//! implementations only need `&mut self` access and must return after a
//! single bounded read.
//!
//! # Implementations
//!
//! - [`FileFeed`] - re-reads an OpenSky-style `states` JSON snapshot
//! - [`StaticFeed`] - replays scripted batches (tests, demos)

mod opensky;
mod scripted;

pub use opensky::{parse_states, FileFeed};
pub use scripted::StaticFeed;

use std::path::PathBuf;

use thiserror::Error;

/// One flight's instantaneous state for a single scan.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    /// Call sign, unique within a scan (e.g. "UAL123").
    pub identifier: String,
    /// Latitude in degrees.
    pub latitude: f64,
    /// Longitude in degrees.
    pub longitude: f64,
    /// Ground speed in m/s.
    pub speed: f64,
    /// Vertical rate in m/s (positive = climbing).
    pub vertical_rate: f64,
}

impl Observation {
    /// Create a new observation.
    pub fn new(
        identifier: impl Into<String>,
        latitude: f64,
        longitude: f64,
        speed: f64,
        vertical_rate: f64,
    ) -> Self {
        Self {
            identifier: identifier.into(),
            latitude,
            longitude,
            speed,
            vertical_rate,
        }
    }
}

/// Errors that can occur while fetching a batch of observations.
#[derive(Debug, Error)]
pub enum FeedError {
    /// The feed source could not be read.
    #[error("Failed to read feed '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The feed document is not valid JSON.
    #[error("Invalid feed JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// The feed document has no usable `states` array.
    #[error("Feed document has no 'states' array")]
    MissingStates,

    /// The feed source reported an outage.
    #[error("Feed unavailable: {0}")]
    Unavailable(String),

    /// The feed has nothing more to offer.
    #[error("Feed exhausted")]
    Exhausted,
}

/// Source of flight observations.
pub trait PositionFeed: Send {
    /// Fetch the freshest available batch of observations.
    fn fetch(&mut self) -> Result<Vec<Observation>, FeedError>;

    /// Human-readable source description for logging.
    fn describe(&self) -> String;
}

impl<F: PositionFeed + ?Sized> PositionFeed for Box<F> {
    fn fetch(&mut self) -> Result<Vec<Observation>, FeedError> {
        (**self).fetch()
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}
