//! Airport range classification.
//!
//! A flight is "in range" of an airport when it sits inside a rectangle of
//! `±lat_threshold` by `±lon_threshold` degrees around the airport. The
//! thresholds are derived once from a radius in miles using fixed
//! degrees-per-mile factors. This is a flat bounding box, not a great-circle
//! distance; longitude degrees shrink with latitude and the fixed factor
//! corresponds to mid-latitudes (~45 miles per degree).
//!
//! Before any geometry runs, a business pre-filter drops flights that look
//! level (`|vertical_rate|` below a floor) or too fast to be arriving or
//! departing (`speed` above a ceiling).

use crate::catalog::{Location, LocationCatalog};
use crate::feed::Observation;

/// Miles per degree of latitude.
pub const MILES_PER_DEG_LAT: f64 = 70.0;

/// Miles per degree of longitude at mid-latitudes.
pub const MILES_PER_DEG_LON: f64 = 45.0;

/// Default monitoring radius around each airport.
pub const DEFAULT_RADIUS_MILES: f64 = 10.0;

/// Flights climbing or descending slower than this (m/s) count as level.
pub const DEFAULT_MIN_VERTICAL_RATE: f64 = 0.1;

/// Flights faster than this (m/s) are treated as overflights.
pub const DEFAULT_MAX_SPEED: f64 = 300.0;

/// Range test parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RangeConfig {
    /// Monitoring radius in miles.
    pub radius_miles: f64,
    /// Minimum absolute vertical rate for a flight to be considered.
    pub min_vertical_rate: f64,
    /// Maximum speed for a flight to be considered.
    pub max_speed: f64,
}

impl Default for RangeConfig {
    fn default() -> Self {
        Self {
            radius_miles: DEFAULT_RADIUS_MILES,
            min_vertical_rate: DEFAULT_MIN_VERTICAL_RATE,
            max_speed: DEFAULT_MAX_SPEED,
        }
    }
}

impl RangeConfig {
    pub fn with_radius_miles(mut self, radius_miles: f64) -> Self {
        self.radius_miles = radius_miles;
        self
    }

    pub fn with_min_vertical_rate(mut self, rate: f64) -> Self {
        self.min_vertical_rate = rate;
        self
    }

    pub fn with_max_speed(mut self, speed: f64) -> Self {
        self.max_speed = speed;
        self
    }
}

/// Maps observations to at most one airport code.
#[derive(Debug, Clone, Copy)]
pub struct RangeClassifier {
    lat_threshold: f64,
    lon_threshold: f64,
    min_vertical_rate: f64,
    max_speed: f64,
}

impl Default for RangeClassifier {
    fn default() -> Self {
        Self::new(RangeConfig::default())
    }
}

impl RangeClassifier {
    /// Create a classifier, deriving the degree thresholds from the radius.
    pub fn new(config: RangeConfig) -> Self {
        Self {
            lat_threshold: config.radius_miles / MILES_PER_DEG_LAT,
            lon_threshold: config.radius_miles / MILES_PER_DEG_LON,
            min_vertical_rate: config.min_vertical_rate,
            max_speed: config.max_speed,
        }
    }

    /// Latitude half-height of the box, in degrees.
    pub fn lat_threshold(&self) -> f64 {
        self.lat_threshold
    }

    /// Longitude half-width of the box, in degrees.
    pub fn lon_threshold(&self) -> f64 {
        self.lon_threshold
    }

    /// Whether the pre-filter lets this observation through to the
    /// geometry test.
    pub fn is_candidate(&self, observation: &Observation) -> bool {
        observation.vertical_rate.abs() >= self.min_vertical_rate
            && observation.speed <= self.max_speed
    }

    /// Whether a position lies inside an airport's box.
    pub fn in_range(&self, location: &Location, latitude: f64, longitude: f64) -> bool {
        (location.latitude - latitude).abs() <= self.lat_threshold
            && (location.longitude - longitude).abs() <= self.lon_threshold
    }

    /// Classify one observation against the catalog.
    ///
    /// Returns the code of the first airport in catalog order whose box
    /// contains the flight, or `None`.
    pub fn classify<'a>(
        &self,
        observation: &Observation,
        catalog: &'a LocationCatalog,
    ) -> Option<&'a str> {
        if !self.is_candidate(observation) {
            return None;
        }

        catalog
            .locations()
            .iter()
            .find(|location| self.in_range(location, observation.latitude, observation.longitude))
            .map(|location| location.code.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lax_catalog() -> LocationCatalog {
        LocationCatalog::new(vec![Location::new("Los Angeles", "LAX", 33.94, -118.41)])
    }

    fn climbing(id: &str, lat: f64, lon: f64) -> Observation {
        Observation::new(id, lat, lon, 50.0, 5.0)
    }

    #[test]
    fn test_default_thresholds() {
        let classifier = RangeClassifier::default();
        assert!((classifier.lat_threshold() - 10.0 / 70.0).abs() < 1e-12);
        assert!((classifier.lon_threshold() - 10.0 / 45.0).abs() < 1e-12);
    }

    #[test]
    fn test_inside_box() {
        let catalog = lax_catalog();
        let classifier = RangeClassifier::default();
        let code = classifier.classify(&climbing("UAL1", 33.95, -118.40), &catalog);
        assert_eq!(code, Some("LAX"));
    }

    #[test]
    fn test_box_edges_are_inclusive() {
        let catalog = LocationCatalog::new(vec![Location::new("Origin", "ORG", 0.0, 0.0)]);
        let classifier = RangeClassifier::new(RangeConfig::default().with_radius_miles(7.0));

        // |0 - t| == t exactly, so the corner itself is inside
        let lat = classifier.lat_threshold();
        let lon = classifier.lon_threshold();
        assert_eq!(
            classifier.classify(&climbing("EDGE", lat, lon), &catalog),
            Some("ORG")
        );
        assert_eq!(
            classifier.classify(&climbing("OUT", lat * 1.01, 0.0), &catalog),
            None
        );
    }

    #[test]
    fn test_outside_box() {
        let catalog = lax_catalog();
        let classifier = RangeClassifier::default();
        // Latitude inside, longitude outside
        assert_eq!(
            classifier.classify(&climbing("FAR", 33.94, -118.0), &catalog),
            None
        );
        // Longitude inside, latitude outside
        assert_eq!(
            classifier.classify(&climbing("FAR", 34.2, -118.41), &catalog),
            None
        );
    }

    #[test]
    fn test_level_flight_is_filtered() {
        let catalog = lax_catalog();
        let classifier = RangeClassifier::default();
        let level = Observation::new("UAL1", 33.95, -118.40, 50.0, 0.0);
        assert_eq!(classifier.classify(&level, &catalog), None);

        let barely = Observation::new("UAL1", 33.95, -118.40, 50.0, -0.09);
        assert_eq!(classifier.classify(&barely, &catalog), None);

        let descending = Observation::new("UAL1", 33.95, -118.40, 50.0, -4.0);
        assert_eq!(classifier.classify(&descending, &catalog), Some("LAX"));
    }

    #[test]
    fn test_fast_flight_is_filtered() {
        let catalog = lax_catalog();
        let classifier = RangeClassifier::default();
        let overflight = Observation::new("UAL1", 33.95, -118.40, 300.5, 5.0);
        assert_eq!(classifier.classify(&overflight, &catalog), None);

        let at_limit = Observation::new("UAL1", 33.95, -118.40, 300.0, 5.0);
        assert_eq!(classifier.classify(&at_limit, &catalog), Some("LAX"));
    }

    #[test]
    fn test_overlapping_boxes_first_in_catalog_wins() {
        let catalog = LocationCatalog::new(vec![
            Location::new("Newark", "EWR", 40.69, -74.17),
            Location::new("New York", "JFK", 40.64, -73.78),
            Location::new("LaGuardia", "LGA", 40.78, -73.87),
        ]);
        let classifier = RangeClassifier::default();

        // Inside EWR, JFK and LGA boxes at once
        let between = climbing("JBU9", 40.70, -73.98);
        assert_eq!(classifier.classify(&between, &catalog), Some("EWR"));

        let reversed = LocationCatalog::new(catalog.locations().iter().rev().cloned().collect());
        assert_eq!(classifier.classify(&between, &reversed), Some("LGA"));
    }

    #[test]
    fn test_empty_catalog() {
        let classifier = RangeClassifier::default();
        assert_eq!(
            classifier.classify(&climbing("UAL1", 0.0, 0.0), &LocationCatalog::default()),
            None
        );
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn test_outside_every_box_is_none(
                lat in -80.0..80.0_f64,
                lon in -170.0..170.0_f64,
                dlat in 0.15..5.0_f64,
                sign in prop::bool::ANY,
            ) {
                let catalog = LocationCatalog::new(vec![Location::new("X", "XXX", lat, lon)]);
                let classifier = RangeClassifier::default();
                let offset = if sign { dlat } else { -dlat };
                let obs = climbing("P", lat + offset, lon);
                prop_assert_eq!(classifier.classify(&obs, &catalog), None);
            }

            #[test]
            fn test_inside_single_box_is_that_code(
                lat in -80.0..80.0_f64,
                lon in -170.0..170.0_f64,
                dlat in -0.14..0.14_f64,
                dlon in -0.22..0.22_f64,
            ) {
                let catalog = LocationCatalog::new(vec![
                    Location::new("Far", "FAR", -lat, lon + 180.0),
                    Location::new("Here", "HRE", lat, lon),
                ]);
                let classifier = RangeClassifier::default();
                let obs = climbing("P", lat + dlat, lon + dlon);
                prop_assert_eq!(classifier.classify(&obs, &catalog), Some("HRE"));
            }

            #[test]
            fn test_inside_multiple_boxes_is_earliest(
                lat in -80.0..80.0_f64,
                lon in -170.0..170.0_f64,
                shift in 0.0..0.1_f64,
            ) {
                let catalog = LocationCatalog::new(vec![
                    Location::new("First", "AAA", lat + shift, lon),
                    Location::new("Second", "BBB", lat, lon),
                ]);
                let classifier = RangeClassifier::default();
                let obs = climbing("P", lat, lon);
                prop_assert_eq!(classifier.classify(&obs, &catalog), Some("AAA"));
            }
        }
    }
}
