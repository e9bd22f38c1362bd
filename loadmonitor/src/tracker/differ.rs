//! Scan-to-scan transition detection.
//!
//! # Transition Table
//!
//! ```text
//! previous   current    events
//! ────────   ───────    ──────────────────────────────
//! none       B          arrival at B
//! A          none       departure from A
//! A          B (A≠B)    departure from A, arrival at B
//! A          A          -
//! none       none       -
//! ```
//!
//! A flight missing from the current scan counts as `none`. The differ only
//! remembers flights that were in range last scan, so its memory is bounded
//! by the number of flights currently near a monitored airport.
//!
//! `diff` is a one-shot state transition: feeding the same map twice yields
//! the events once, then nothing.

use std::collections::{BTreeSet, HashMap};

use tracing::error;

use crate::catalog::LocationCatalog;

/// Flight identifier → airport code (or `None`) for one scan.
pub type ClassificationMap = HashMap<String, Option<String>>;

/// Arrivals and departures at one airport during one tick.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventSet {
    pub arrivals: BTreeSet<String>,
    pub departures: BTreeSet<String>,
}

impl EventSet {
    /// Whether anything happened at this airport this tick.
    pub fn is_empty(&self) -> bool {
        self.arrivals.is_empty() && self.departures.is_empty()
    }
}

/// Per-airport events for one tick, in catalog order.
///
/// Every catalog airport is present, including those with no activity.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScanReport {
    order: Vec<String>,
    events: HashMap<String, EventSet>,
}

impl ScanReport {
    /// Create a report with an empty event set for every catalog airport.
    pub fn empty(catalog: &LocationCatalog) -> Self {
        let order: Vec<String> = catalog.codes().map(str::to_string).collect();
        let events = order
            .iter()
            .map(|code| (code.clone(), EventSet::default()))
            .collect();
        Self { order, events }
    }

    /// Events for one airport.
    pub fn get(&self, code: &str) -> Option<&EventSet> {
        self.events.get(code)
    }

    pub fn contains(&self, code: &str) -> bool {
        self.events.contains_key(code)
    }

    /// `(code, events)` pairs in catalog order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &EventSet)> {
        self.order
            .iter()
            .filter_map(|code| self.events.get(code).map(|set| (code.as_str(), set)))
    }

    /// Airports with at least one event, in catalog order.
    pub fn active(&self) -> impl Iterator<Item = (&str, &EventSet)> {
        self.iter().filter(|(_, set)| !set.is_empty())
    }

    /// Number of airports in the report.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn total_arrivals(&self) -> usize {
        self.events.values().map(|s| s.arrivals.len()).sum()
    }

    pub fn total_departures(&self) -> usize {
        self.events.values().map(|s| s.departures.len()).sum()
    }

    fn record_arrival(&mut self, code: &str, flight: &str) {
        if let Some(set) = self.event_set_mut(code) {
            set.arrivals.insert(flight.to_string());
        }
    }

    fn record_departure(&mut self, code: &str, flight: &str) {
        if let Some(set) = self.event_set_mut(code) {
            set.departures.insert(flight.to_string());
        }
    }

    fn event_set_mut(&mut self, code: &str) -> Option<&mut EventSet> {
        let set = self.events.get_mut(code);
        debug_assert!(set.is_some(), "classified code {code} is not in the catalog");
        if set.is_none() {
            error!(code, "Classified airport code is not in the catalog");
        }
        set
    }
}

/// Holds the previous scan's in-range flights and turns each new
/// classification into arrival/departure events.
#[derive(Debug, Default)]
pub struct ScanDiffer {
    previous_in_range: HashMap<String, String>,
}

impl ScanDiffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compare `current` against the previous scan and advance state.
    pub fn diff(&mut self, current: &ClassificationMap, catalog: &LocationCatalog) -> ScanReport {
        let mut report = ScanReport::empty(catalog);

        // Flights that were in range and vanished or moved
        for (flight, previous) in &self.previous_in_range {
            match current.get(flight).and_then(Option::as_deref) {
                Some(now) if now == previous.as_str() => {}
                Some(now) => {
                    report.record_departure(previous, flight);
                    report.record_arrival(now, flight);
                }
                None => report.record_departure(previous, flight),
            }
        }

        // Flights newly in range
        for (flight, now) in current {
            if let Some(now) = now {
                if !self.previous_in_range.contains_key(flight) {
                    report.record_arrival(now, flight);
                }
            }
        }

        self.previous_in_range = current
            .iter()
            .filter_map(|(flight, code)| code.as_ref().map(|c| (flight.clone(), c.clone())))
            .collect();

        report
    }

    /// Number of flights currently remembered as in range.
    pub fn tracked_count(&self) -> usize {
        self.previous_in_range.len()
    }

    /// Airport a flight was in range of at the last scan.
    pub fn previous_location(&self, flight: &str) -> Option<&str> {
        self.previous_in_range.get(flight).map(String::as_str)
    }

    /// Forget all remembered flights.
    pub fn reset(&mut self) {
        self.previous_in_range.clear();
    }
}
