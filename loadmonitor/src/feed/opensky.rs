//! OpenSky `states` snapshot feed.
//!
//! The document is `{"time": ..., "states": [[...], ...]}` where each state
//! vector is positional:
//!
//! | index | field |
//! |---|---|
//! | 1 | call sign |
//! | 5 | longitude |
//! | 6 | latitude |
//! | 9 | velocity (m/s) |
//! | 11 | vertical rate (m/s) |
//!
//! States without a call sign or position are skipped. Missing velocity or
//! vertical rate default to zero.

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::debug;

use super::{FeedError, Observation, PositionFeed};

const CALL_SIGN_INDEX: usize = 1;
const LONGITUDE_INDEX: usize = 5;
const LATITUDE_INDEX: usize = 6;
const VELOCITY_INDEX: usize = 9;
const VERTICAL_RATE_INDEX: usize = 11;

/// Feed that re-reads a states JSON file on every fetch.
///
/// The file is expected to be refreshed externally (for example by a cron
/// job polling the OpenSky REST API).
#[derive(Debug, Clone)]
pub struct FileFeed {
    path: PathBuf,
}

impl FileFeed {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl PositionFeed for FileFeed {
    fn fetch(&mut self) -> Result<Vec<Observation>, FeedError> {
        let contents = std::fs::read_to_string(&self.path).map_err(|source| FeedError::Io {
            path: self.path.clone(),
            source,
        })?;
        parse_states(&contents)
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// Parse a states document into observations.
///
/// A `null` states array (OpenSky's "no aircraft" answer) is an empty batch.
pub fn parse_states(json: &str) -> Result<Vec<Observation>, FeedError> {
    let root: Value = serde_json::from_str(json)?;

    let states = match root.get("states") {
        Some(Value::Array(states)) => states,
        Some(Value::Null) => return Ok(Vec::new()),
        _ => return Err(FeedError::MissingStates),
    };

    let observations: Vec<Observation> = states.iter().filter_map(parse_state).collect();

    debug!(
        total = states.len(),
        accepted = observations.len(),
        "Parsed feed states"
    );
    Ok(observations)
}

fn parse_state(state: &Value) -> Option<Observation> {
    let fields = state.as_array()?;

    let call_sign = fields.get(CALL_SIGN_INDEX)?.as_str()?.trim();
    if call_sign.is_empty() {
        return None;
    }

    let longitude = fields.get(LONGITUDE_INDEX)?.as_f64()?;
    let latitude = fields.get(LATITUDE_INDEX)?.as_f64()?;
    let speed = optional_f64(fields, VELOCITY_INDEX);
    let vertical_rate = optional_f64(fields, VERTICAL_RATE_INDEX);

    Some(Observation::new(
        call_sign,
        latitude,
        longitude,
        speed,
        vertical_rate,
    ))
}

fn optional_f64(fields: &[Value], index: usize) -> f64 {
    fields.get(index).and_then(Value::as_f64).unwrap_or(0.0)
}
