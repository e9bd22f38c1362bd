//! Monitored airport catalog.
//!
//! The catalog is loaded once at startup and is read-only afterwards. Its
//! order is significant: the range classifier walks it front to back and the
//! first airport whose bounding box contains a flight wins.
//!
//! # Example
//!
//! ```
//! use loadmonitor::catalog::{Location, LocationCatalog};
//!
//! let catalog = LocationCatalog::new(vec![
//!     Location::new("Los Angeles", "LAX", 33.94, -118.41),
//!     Location::new("San Francisco", "SFO", 37.62, -122.38),
//! ]);
//!
//! assert_eq!(catalog.len(), 2);
//! assert!(catalog.contains("SFO"));
//! assert_eq!(catalog.codes().collect::<Vec<_>>(), vec!["LAX", "SFO"]);
//! ```

mod loader;

pub use loader::CatalogError;

use std::collections::HashSet;

/// A monitored airport.
#[derive(Debug, Clone, PartialEq)]
pub struct Location {
    /// City or airport name (e.g. "Los Angeles").
    pub name: String,
    /// IATA code, the unique key (e.g. "LAX").
    pub code: String,
    /// Latitude in degrees.
    pub latitude: f64,
    /// Longitude in degrees.
    pub longitude: f64,
}

impl Location {
    /// Create a new location.
    pub fn new(
        name: impl Into<String>,
        code: impl Into<String>,
        latitude: f64,
        longitude: f64,
    ) -> Self {
        Self {
            name: name.into(),
            code: code.into(),
            latitude,
            longitude,
        }
    }
}

/// Ordered, immutable list of monitored airports.
#[derive(Debug, Clone, Default)]
pub struct LocationCatalog {
    locations: Vec<Location>,
    codes: HashSet<String>,
}

impl LocationCatalog {
    /// Build a catalog from locations in priority order.
    ///
    /// Codes are trimmed and upper-cased, matching how subscriptions store
    /// them. Blank codes and later entries that repeat an earlier code are
    /// dropped so that codes stay unique.
    pub fn new(locations: Vec<Location>) -> Self {
        let mut codes = HashSet::with_capacity(locations.len());
        let locations = locations
            .into_iter()
            .map(|mut location| {
                location.code = location.code.trim().to_uppercase();
                location
            })
            .filter(|location| {
                if location.code.is_empty() {
                    tracing::warn!(name = %location.name, "Skipping airport without a code");
                    return false;
                }
                let fresh = codes.insert(location.code.clone());
                if !fresh {
                    tracing::warn!(code = %location.code, "Skipping duplicate airport code");
                }
                fresh
            })
            .collect();

        Self { locations, codes }
    }

    /// Locations in catalog order.
    pub fn locations(&self) -> &[Location] {
        &self.locations
    }

    /// Airport codes in catalog order.
    pub fn codes(&self) -> impl Iterator<Item = &str> {
        self.locations.iter().map(|l| l.code.as_str())
    }

    /// Whether an airport with this code is monitored.
    pub fn contains(&self, code: &str) -> bool {
        self.codes.contains(code)
    }

    /// Look up a location by code.
    pub fn get(&self, code: &str) -> Option<&Location> {
        self.locations.iter().find(|l| l.code == code)
    }

    pub fn len(&self) -> usize {
        self.locations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locations.is_empty()
    }
}
