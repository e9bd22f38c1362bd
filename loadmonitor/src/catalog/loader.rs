//! Airport list loader.
//!
//! Reads `City,IATA,Latitude,Longitude` lines (no header). Malformed lines
//! are skipped one at a time; only failing to open the file is an error.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{info, warn};

use super::{Location, LocationCatalog};

/// Number of comma-separated fields in an airport line.
const FIELD_COUNT: usize = 4;

/// Errors that can occur while loading the airport catalog.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// The airport file could not be opened or read.
    #[error("Failed to read airport file '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl LocationCatalog {
    /// Load the catalog from an airport file.
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| CatalogError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let catalog = Self::from_reader(BufReader::new(file)).map_err(|source| {
            CatalogError::Io {
                path: path.to_path_buf(),
                source,
            }
        })?;

        info!(path = %path.display(), airports = catalog.len(), "Loaded airports");
        Ok(catalog)
    }

    /// Parse the catalog from any buffered reader.
    ///
    /// Fails only on an I/O error from the reader itself. Bytes that are not
    /// valid UTF-8 are replaced, so an odd city name never drops its line.
    pub fn from_reader<R: BufRead>(mut reader: R) -> std::io::Result<Self> {
        let mut locations = Vec::new();
        let mut buf = Vec::new();

        loop {
            buf.clear();
            if reader.read_until(b'\n', &mut buf)? == 0 {
                break;
            }
            let line = String::from_utf8_lossy(&buf);
            if let Some(location) = parse_line(&line) {
                locations.push(location);
            }
        }

        Ok(Self::new(locations))
    }
}

/// Parse one airport line, returning `None` for blank or malformed lines.
fn parse_line(line: &str) -> Option<Location> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    let parts: Vec<&str> = line.split(',').map(str::trim).collect();
    if parts.len() != FIELD_COUNT {
        return None;
    }

    let (Ok(latitude), Ok(longitude)) = (parts[2].parse::<f64>(), parts[3].parse::<f64>()) else {
        warn!(line, "Skipping invalid airport line");
        return None;
    };

    if parts[1].is_empty() {
        warn!(line, "Skipping airport line without a code");
        return None;
    }

    Some(Location::new(parts[0], parts[1], latitude, longitude))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write};

    #[test]
    fn test_parse_valid_line() {
        let location = parse_line("Los Angeles, LAX, 33.9416, -118.4085").unwrap();
        assert_eq!(location.name, "Los Angeles");
        assert_eq!(location.code, "LAX");
        assert!((location.latitude - 33.9416).abs() < 1e-9);
        assert!((location.longitude + 118.4085).abs() < 1e-9);
    }

    #[test]
    fn test_parse_skips_wrong_field_count() {
        assert!(parse_line("Los Angeles,LAX,33.94").is_none());
        assert!(parse_line("Los Angeles,LAX,33.94,-118.41,extra").is_none());
    }

    #[test]
    fn test_parse_skips_bad_numbers() {
        assert!(parse_line("Los Angeles,LAX,north,-118.41").is_none());
        assert!(parse_line("Los Angeles,LAX,33.94,").is_none());
    }

    #[test]
    fn test_parse_skips_blank_code() {
        assert!(parse_line("Nowhere, ,1.0,2.0").is_none());
    }

    #[test]
    fn test_from_reader_skips_bad_lines_and_keeps_order() {
        let input = "\
Los Angeles,LAX,33.94,-118.41

garbage line
New York,JFK,40.64,-73.78
Chicago,ORD,not-a-number,-87.90
Chicago,ORD,41.97,-87.90
";
        let catalog = LocationCatalog::from_reader(Cursor::new(input)).unwrap();
        let codes: Vec<_> = catalog.codes().collect();
        assert_eq!(codes, vec!["LAX", "JFK", "ORD"]);
    }

    #[test]
    fn test_from_reader_keeps_lines_with_invalid_utf8() {
        let input: &[u8] = b"Los Angeles,LAX,33.94,-118.41\n\
S\xE3o Paulo,GRU,-23.43,-46.47\r\n\
New York,JFK,40.64,-73.78";
        let catalog = LocationCatalog::from_reader(Cursor::new(input)).unwrap();
        let codes: Vec<_> = catalog.codes().collect();
        assert_eq!(codes, vec!["LAX", "GRU", "JFK"]);
        assert!(catalog.get("GRU").unwrap().name.starts_with('S'));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "Los Angeles,LAX,33.94,-118.41").unwrap();
        writeln!(file, "Denver,DEN,39.86,-104.67").unwrap();

        let catalog = LocationCatalog::load_from_file(file.path()).unwrap();
        assert_eq!(catalog.len(), 2);
        assert!(catalog.contains("DEN"));
    }

    #[test]
    fn test_load_missing_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = LocationCatalog::load_from_file(dir.path().join("missing.txt"));
        assert!(matches!(result, Err(CatalogError::Io { .. })));
    }
}
