//! Messages exchanged with remote subscribers.
//!
//! Both directions are JSON text frames:
//!
//! - client → server: [`LoadRequest`] (`{"airport_codes": ["LAX", "JFK"]}`)
//! - server → client: [`AirportLoad`] (one per watched airport per tick)

use serde::{Deserialize, Serialize};

use crate::tracker::EventSet;

/// Arrival/departure summary for one airport and one tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AirportLoad {
    pub airport_code: String,
    pub arrivals: usize,
    pub arriving_flights: Vec<String>,
    pub departures: usize,
    pub departing_flights: Vec<String>,
}

impl AirportLoad {
    /// Summarize an airport's event set.
    pub fn from_events(code: &str, events: &EventSet) -> Self {
        Self {
            airport_code: code.to_string(),
            arrivals: events.arrivals.len(),
            arriving_flights: events.arrivals.iter().cloned().collect(),
            departures: events.departures.len(),
            departing_flights: events.departures.iter().cloned().collect(),
        }
    }

    /// Whether the update carries no arrivals or departures.
    pub fn is_quiet(&self) -> bool {
        self.arrivals == 0 && self.departures == 0
    }
}

impl std::fmt::Display for AirportLoad {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} | Arrivals: {} {:?} | Departures: {} {:?}",
            self.airport_code,
            self.arrivals,
            self.arriving_flights,
            self.departures,
            self.departing_flights
        )
    }
}

/// Subscription request from a remote client.
///
/// Replaces the client's whole watch list. An empty list unsubscribes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadRequest {
    #[serde(default)]
    pub airport_codes: Vec<String>,
}

impl LoadRequest {
    pub fn new<I, S>(codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            airport_codes: codes.into_iter().map(Into::into).collect(),
        }
    }

    /// Parse a whitespace-separated list of codes, as typed by a user.
    pub fn from_line(line: &str) -> Self {
        Self::new(line.split_whitespace().map(str::to_uppercase))
    }
}
