//! Long-format log on disk: one CSV with the metadata columns first.

use std::path::Path;
use std::sync::Arc;

use super::error::RowError;
use super::types::{Reading, ReadingLog, WellMetadata, METADATA_COLUMNS};

/// Write the log as CSV (header row included), creating parent directories.
pub fn write_log(log: &ReadingLog, path: &Path) -> Result<(), RowError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(log.header())?;
    for reading in log.readings() {
        let metadata = reading.well.fields();
        writer.write_record(
            metadata
                .into_iter()
                .chain(reading.values.iter().map(String::as_str)),
        )?;
    }
    writer.flush()?;

    tracing::debug!(path = %path.display(), rows = log.len(), "Long-format log written");
    Ok(())
}

/// Read a log written by `write_log`. Rows shorter than the header are
/// dropped, as they are when parsing downloaded files.
pub fn read_log(path: &Path) -> Result<ReadingLog, RowError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)?;

    let header: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
    if header.len() < METADATA_COLUMNS.len()
        || header.iter().zip(METADATA_COLUMNS).any(|(h, m)| h != m)
    {
        return Err(RowError::MissingMetadataColumns(header));
    }
    let source_header = header[METADATA_COLUMNS.len()..].to_vec();

    let mut readings = Vec::new();
    let mut current: Option<Arc<WellMetadata>> = None;
    let mut dropped = 0usize;

    for record in reader.records() {
        let record = record?;
        let fields: Vec<&str> = record.iter().collect();
        if fields.len() < header.len() {
            dropped += 1;
            continue;
        }
        let Some(meta) = WellMetadata::from_fields(&fields) else {
            dropped += 1;
            continue;
        };
        // Consecutive rows of the same well share one metadata allocation.
        let well = match &current {
            Some(w) if **w == meta => Arc::clone(w),
            _ => {
                let w = Arc::new(meta);
                current = Some(Arc::clone(&w));
                w
            }
        };
        readings.push(Reading {
            well,
            values: fields[METADATA_COLUMNS.len()..header.len()]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        });
    }

    if dropped > 0 {
        tracing::warn!(path = %path.display(), dropped, "Short rows dropped while reading log");
    }

    Ok(ReadingLog::with_header(source_header, readings))
}
