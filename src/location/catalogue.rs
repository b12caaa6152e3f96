//! CSV catalogue loader for [`Location`] entries.
//!
//! Ported from `original_source/src/data/location/csv_loader.py`'s
//! `LocationCSVLoader`: a missing or unreadable catalogue file is never a
//! hard failure — it yields an empty catalogue, exactly like
//! [`crate::comments::repository`]'s "missing partition -> empty" rule.
//! Unlike the Python original (plain-name-per-line `Chiten.csv` plus a
//! separate hardcoded coordinate table), this loader expects the richer
//! `name,latitude,longitude` CSV shape the distilled spec's data model
//! implies, since coordinates are part of `Location` itself here.

use std::path::Path;

use super::model::Location;

/// Load the location catalogue from `path`. Required column: `name`.
/// Optional columns `latitude`/`longitude` (both required together for a
/// row to carry coordinates; a row with only one of the two is treated as
/// having neither, with a warning). Unparseable or empty rows are skipped,
/// not fatal. A missing file yields an empty catalogue.
pub fn load_from_csv(path: impl AsRef<Path>) -> Vec<Location> {
    let path = path.as_ref();
    if !path.exists() {
        tracing::warn!(path = %path.display(), "location catalogue file not found, starting with an empty catalogue");
        return Vec::new();
    }

    let mut reader = match csv::ReaderBuilder::new().has_headers(true).from_path(path) {
        Ok(r) => r,
        Err(e) => {
            tracing::error!(path = %path.display(), error = %e, "failed to open location catalogue file");
            return Vec::new();
        }
    };

    let headers = match reader.headers() {
        Ok(h) => h.clone(),
        Err(e) => {
            tracing::error!(path = %path.display(), error = %e, "failed to read location catalogue headers");
            return Vec::new();
        }
    };
    let name_idx = headers.iter().position(|h| h == "name");
    let lat_idx = headers.iter().position(|h| h == "latitude");
    let lon_idx = headers.iter().position(|h| h == "longitude");

    let Some(name_idx) = name_idx else {
        tracing::error!(path = %path.display(), "location catalogue is missing required 'name' column");
        return Vec::new();
    };

    let mut locations = Vec::new();
    let mut total_rows = 0usize;
    let mut skipped_rows = 0usize;

    for (row_number, record) in reader.records().enumerate() {
        total_rows += 1;
        let record = match record {
            Ok(r) => r,
            Err(e) => {
                tracing::debug!(path = %path.display(), row_number, error = %e, "skipping unparseable catalogue row");
                skipped_rows += 1;
                continue;
            }
        };

        let name = record.get(name_idx).unwrap_or("").trim();
        if name.is_empty() {
            skipped_rows += 1;
            continue;
        }

        let lat = lat_idx.and_then(|idx| record.get(idx)).and_then(|s| s.trim().parse::<f64>().ok());
        let lon = lon_idx.and_then(|idx| record.get(idx)).and_then(|s| s.trim().parse::<f64>().ok());
        let (lat, lon) = match (lat, lon) {
            (Some(lat), Some(lon)) => (Some(lat), Some(lon)),
            (None, None) => (None, None),
            _ => {
                tracing::warn!(path = %path.display(), row_number, name, "catalogue row has only one of latitude/longitude, dropping both");
                (None, None)
            }
        };

        locations.push(Location::new(name, lat, lon));
    }

    if total_rows > 0 && skipped_rows as f64 / total_rows as f64 > 0.05 {
        tracing::warn!(path = %path.display(), skipped_rows, total_rows, "location catalogue discarded more than 5% of rows");
    }

    locations
}
