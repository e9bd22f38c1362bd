//! Scan-and-diff flight tracking engine.
//!
//! [`FlightTracker`] strings the pieces of one scan together:
//!
//! ```text
//! PositionFeed ──► RangeClassifier ──► ClassificationMap ──► ScanDiffer ──► ScanReport
//!  (fetch)          (per flight)         (this scan)          (vs. last)     (per airport)
//! ```
//!
//! The tracker is owned by exactly one task (the broadcast tick), which is
//! the only caller of [`FlightTracker::scan`]. Nothing else can reach the
//! differ's state.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use loadmonitor::catalog::{Location, LocationCatalog};
//! use loadmonitor::feed::{Observation, StaticFeed};
//! use loadmonitor::tracker::{FlightTracker, RangeConfig};
//!
//! let catalog = Arc::new(LocationCatalog::new(vec![
//!     Location::new("Los Angeles", "LAX", 33.94, -118.41),
//! ]));
//! let feed = StaticFeed::new();
//! feed.push_batch(vec![Observation::new("UAL1", 33.95, -118.40, 50.0, 5.0)]);
//!
//! let mut tracker = FlightTracker::new(catalog, Box::new(feed), RangeConfig::default());
//! let report = tracker.scan().unwrap();
//! assert!(report.get("LAX").unwrap().arrivals.contains("UAL1"));
//! ```

mod classifier;
mod differ;

pub use classifier::{
    RangeClassifier, RangeConfig, DEFAULT_MAX_SPEED, DEFAULT_MIN_VERTICAL_RATE,
    DEFAULT_RADIUS_MILES, MILES_PER_DEG_LAT, MILES_PER_DEG_LON,
};
pub use differ::{ClassificationMap, EventSet, ScanDiffer, ScanReport};

use std::sync::Arc;
use std::time::Instant;

use tracing::debug;

use crate::catalog::LocationCatalog;
use crate::feed::{FeedError, Observation, PositionFeed};

/// Runs one feed → classify → diff cycle per call.
pub struct FlightTracker {
    catalog: Arc<LocationCatalog>,
    classifier: RangeClassifier,
    differ: ScanDiffer,
    feed: Box<dyn PositionFeed>,
}

impl std::fmt::Debug for FlightTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlightTracker")
            .field("airports", &self.catalog.len())
            .field("classifier", &self.classifier)
            .field("tracked", &self.differ.tracked_count())
            .field("feed", &self.feed.describe())
            .finish()
    }
}

impl FlightTracker {
    pub fn new(
        catalog: Arc<LocationCatalog>,
        feed: Box<dyn PositionFeed>,
        range: RangeConfig,
    ) -> Self {
        Self {
            catalog,
            classifier: RangeClassifier::new(range),
            differ: ScanDiffer::new(),
            feed,
        }
    }

    /// Fetch a fresh batch and diff it against the previous scan.
    ///
    /// On a feed error the differ state is left untouched, so the next
    /// successful scan compares against the last good one.
    pub fn scan(&mut self) -> Result<ScanReport, FeedError> {
        let started = Instant::now();
        let observations = self.feed.fetch()?;
        let report = self.apply(&observations);

        debug!(
            observations = observations.len(),
            tracked = self.differ.tracked_count(),
            arrivals = report.total_arrivals(),
            departures = report.total_departures(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Scan complete"
        );
        Ok(report)
    }

    /// Classify and diff an already-fetched batch.
    pub fn apply(&mut self, observations: &[Observation]) -> ScanReport {
        let current = self.classify_batch(observations);
        self.differ.diff(&current, &self.catalog)
    }

    /// Classify every observation with a usable identifier.
    pub fn classify_batch(&self, observations: &[Observation]) -> ClassificationMap {
        observations
            .iter()
            .filter(|o| !o.identifier.trim().is_empty())
            .map(|o| {
                let code = self
                    .classifier
                    .classify(o, &self.catalog)
                    .map(str::to_string);
                (o.identifier.clone(), code)
            })
            .collect()
    }

    pub fn catalog(&self) -> &Arc<LocationCatalog> {
        &self.catalog
    }

    /// Number of flights currently in range of some airport.
    pub fn tracked_count(&self) -> usize {
        self.differ.tracked_count()
    }
}
