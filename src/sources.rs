use std::path::{Path, PathBuf};

use csv::{ReaderBuilder, StringRecord};
use tracing::{debug, info};

use crate::domain::{IndexedRecord, ObservationRecord, REQUIRED_COLUMNS};
use crate::error::KiraError;
use crate::extract::FailedUrls;

/// Cell values read as missing: the common spellings of NA that CSV exports
/// from data-frame tooling write. Matching is exact; whitespace around a
/// marker makes it data.
pub const MISSING_MARKERS: &[&str] = &[
    "", "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

/// Reads one comma-separated source, keeping only the three needed columns.
/// Empty cells, cells holding one of [`MISSING_MARKERS`] and cells absent
/// from a short row are all missing.
pub fn load_source(path: &Path) -> Result<Vec<ObservationRecord>, KiraError> {
    let source_err = |message: String| KiraError::SourceRead {
        path: path.to_path_buf(),
        message,
    };

    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)
        .map_err(|err| source_err(err.to_string()))?;
    let headers = reader
        .headers()
        .map_err(|err| source_err(err.to_string()))?
        .clone();
    let [name_idx, image_idx, url_idx] = column_indices(&headers, path)?;

    let mut records = Vec::new();
    for row in reader.records() {
        let row = row.map_err(|err| source_err(err.to_string()))?;
        records.push(ObservationRecord {
            scientific_name: field(&row, name_idx),
            image_url: field(&row, image_idx),
            url: field(&row, url_idx),
        });
    }
    debug!(path = %path.display(), rows = records.len(), "loaded source table");
    Ok(records)
}

/// Loads every source and stacks them in the order given. A record's position
/// in the returned vector is its identity for file naming.
pub fn load_sources(paths: &[PathBuf]) -> Result<Vec<ObservationRecord>, KiraError> {
    if paths.is_empty() {
        return Err(KiraError::NoSources);
    }
    let mut records = Vec::new();
    for path in paths {
        debug!(path = %path.display(), "reading source table");
        records.extend(load_source(path)?);
    }
    info!(sources = paths.len(), rows = records.len(), "source tables loaded");
    Ok(records)
}

/// Every eligible record, with its position in the concatenated sequence.
pub fn eligible(records: &[ObservationRecord]) -> Vec<IndexedRecord> {
    records
        .iter()
        .enumerate()
        .filter(|(_, record)| record.is_eligible())
        .map(|(position, record)| IndexedRecord {
            position,
            record: record.clone(),
        })
        .collect()
}

/// Eligible records whose image URL was reported as failed.
pub fn correlate(records: &[ObservationRecord], failed: &FailedUrls) -> Vec<IndexedRecord> {
    eligible(records)
        .into_iter()
        .filter(|indexed| {
            indexed
                .record
                .image_url
                .as_deref()
                .is_some_and(|url| failed.contains(url))
        })
        .collect()
}

fn column_indices(headers: &StringRecord, path: &Path) -> Result<[usize; 3], KiraError> {
    let mut indices = [0usize; 3];
    for (slot, column) in indices.iter_mut().zip(REQUIRED_COLUMNS) {
        *slot = headers
            .iter()
            .position(|header| header == column)
            .ok_or_else(|| KiraError::MissingColumn {
                path: path.to_path_buf(),
                column: column.to_string(),
            })?;
    }
    Ok(indices)
}

fn field(row: &StringRecord, index: usize) -> Option<String> {
    row.get(index)
        .filter(|value| !is_missing(value))
        .map(str::to_string)
}

fn is_missing(value: &str) -> bool {
    MISSING_MARKERS.contains(&value)
}
