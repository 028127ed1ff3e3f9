//! CSV artifacts for the filtered log and the wide table.

use std::path::Path;

use super::error::AggregateError;
use super::filter::FilterOutcome;
use super::types::{month_from_abbr, Position, WideRecord, WideTable};
use crate::pipeline::readings::{WellMetadata, METADATA_COLUMNS};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Trailing wide-table column holding the combined position.
const COORDINATES_COLUMN: &str = "coordinates";

/// `[11.02, 76.95]`, or `None` for an unresolved half.
fn format_coordinates(position: &Position) -> String {
    let half = |v: Option<f64>| v.map_or_else(|| "None".to_string(), |v| format!("{v:?}"));
    let [lat, lon] = position.as_pair();
    format!("[{}, {}]", half(lat), half(lon))
}

fn writer_for(path: &Path) -> Result<csv::Writer<std::fs::File>, AggregateError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    Ok(csv::Writer::from_path(path)?)
}

/// Write the filtered log: metadata, then the timestamp column (normalized),
/// then the remaining source columns.
pub fn write_filtered(outcome: &FilterOutcome<'_>, path: &Path) -> Result<(), AggregateError> {
    let ts = outcome.timestamp_column;
    let others: Vec<usize> = (0..outcome.source_header.len()).filter(|&i| i != ts).collect();

    let mut writer = writer_for(path)?;
    let header = METADATA_COLUMNS
        .iter()
        .copied()
        .chain(outcome.source_header.get(ts).map(String::as_str))
        .chain(others.iter().map(|&i| outcome.source_header[i].as_str()));
    writer.write_record(header)?;

    for fr in &outcome.readings {
        let stamp = fr.observed_at.format(TIMESTAMP_FORMAT).to_string();
        let mut record: Vec<&str> = fr.reading.well.fields().to_vec();
        record.push(&stamp);
        record.extend(others.iter().map(|&i| fr.reading.value(i).unwrap_or_default()));
        writer.write_record(&record)?;
    }
    writer.flush()?;

    tracing::info!(path = %path.display(), rows = outcome.len(), "Filtered log written");
    Ok(())
}

/// Write the wide table, one column per present month followed by the
/// combined position. Absent values are empty cells.
pub fn write_wide(table: &WideTable, path: &Path) -> Result<(), AggregateError> {
    let mut writer = writer_for(path)?;
    let mut header = table.columns();
    header.push(COORDINATES_COLUMN.to_string());
    writer.write_record(&header)?;
    for record in &table.records {
        let coordinates = format_coordinates(&record.position);
        let levels = record.levels.iter().map(|(_, v)| v.as_deref().unwrap_or(""));
        writer.write_record(
            record
                .well
                .fields()
                .into_iter()
                .chain(levels)
                .chain(std::iter::once(coordinates.as_str())),
        )?;
    }
    writer.flush()?;

    tracing::info!(path = %path.display(), wells = table.len(), "Wide table written");
    Ok(())
}

/// Read a wide table written by `write_wide`. Columns after the metadata
/// that are not month labels are ignored; the position is derived from the
/// latitude and longitude cells.
pub fn read_wide(path: &Path) -> Result<WideTable, AggregateError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)?;

    let header: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| h.trim_start_matches('\u{feff}').trim().to_string())
        .collect();
    if header.len() < METADATA_COLUMNS.len()
        || header.iter().zip(METADATA_COLUMNS).any(|(h, m)| h != m)
    {
        return Err(AggregateError::MissingMetadataColumns(header));
    }

    let month_columns: Vec<(usize, u32)> = header
        .iter()
        .enumerate()
        .skip(METADATA_COLUMNS.len())
        .filter_map(|(i, h)| month_from_abbr(h).map(|m| (i, m)))
        .collect();

    let mut records = Vec::new();
    let mut dropped = 0usize;
    for row in reader.records() {
        let row = row?;
        let fields: Vec<&str> = row.iter().collect();
        let Some(well) = WellMetadata::from_fields(&fields) else {
            dropped += 1;
            continue;
        };
        let levels = month_columns
            .iter()
            .map(|&(i, m)| {
                let value = fields
                    .get(i)
                    .map(|v| v.trim())
                    .filter(|v| !v.is_empty())
                    .map(str::to_string);
                (m, value)
            })
            .collect();
        records.push(WideRecord {
            position: Position::from_metadata(&well),
            well,
            levels,
        });
    }
    if dropped > 0 {
        tracing::warn!(path = %path.display(), dropped, "Short wide-table rows dropped");
    }

    let months: Vec<u32> = month_columns.iter().map(|&(_, m)| m).collect();
    tracing::debug!(
        path = %path.display(),
        wells = records.len(),
        months = months.len(),
        "Wide table read"
    );
    Ok(WideTable { months, records })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::config::LogColumns;
    use crate::pipeline::readings::{Reading, ReadingLog};
    use crate::pipeline::aggregate::filter::tests::log_of;
    use crate::pipeline::aggregate::{ObservationWindow, Pivoter, TemporalFilter};

    fn window() -> ObservationWindow {
        ObservationWindow::new(2025, vec![1, 4, 8, 11]).unwrap()
    }

    #[test]
    fn filtered_log_puts_date_after_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("filtered.csv");

        // Value column precedes the timestamp in the source.
        let log = ReadingLog::with_header(
            vec!["Water Level".into(), "Date".into()],
            vec![Reading {
                well: Arc::new(WellMetadata::unresolved("W1")),
                values: vec!["5.0".into(), "15/01/2025".into()],
            }],
        );
        let out = TemporalFilter::new(window(), LogColumns::default())
            .filter(&log)
            .unwrap();
        write_filtered(&out, &path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next(),
            Some("Well_ID,Village,Latitude,Longitude,Block,Date,Water Level")
        );
        assert_eq!(
            lines.next(),
            Some("W1,Unknown,Unknown,Unknown,Unknown,2025-01-15 00:00:00,5.0")
        );
    }

    #[test]
    fn wide_table_survives_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("merged.csv");

        let log = log_of(&[
            ("W1", "2025-01-15", "5.2"),
            ("W1", "2025-08-15", "6.1"),
            ("W2", "2025-08-15", "7.0"),
        ]);
        let out = TemporalFilter::new(window(), LogColumns::default())
            .filter(&log)
            .unwrap();
        let table = Pivoter::new(window()).pivot(&out).unwrap();
        write_wide(&table, &path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("Well_ID,Village,Latitude,Longitude,Block,Jan,Aug,coordinates\n"));
        assert!(text.contains("W2,W2-village,11.0,77.0,Annur,,7.0,\"[11.0, 77.0]\""));

        let back = read_wide(&path).unwrap();
        assert_eq!(back, table);
    }

    #[test]
    fn unresolved_position_is_written_as_none_pair() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("merged.csv");
        let mut well = WellMetadata::unresolved("W1");
        well.longitude = "76.95".into();
        let table = WideTable {
            months: vec![1],
            records: vec![WideRecord {
                position: Position::from_metadata(&well),
                well,
                levels: vec![(1, Some("5.2".into()))],
            }],
        };
        write_wide(&table, &path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("W1,Unknown,Unknown,76.95,Unknown,5.2,\"[None, None]\""));
        assert_eq!(format_coordinates(&Position::from_fields("11", "76.5")), "[11.0, 76.5]");
    }

    #[test]
    fn read_wide_ignores_extra_columns() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("merged.csv");
        std::fs::write(
            &path,
            "Well_ID,Village,Latitude,Longitude,Block,Jan,coordinates,Nov\n\
             W1,Annur,Unknown,77.0,Annur,1.5,\"[None, None]\",\n",
        )
        .unwrap();
        let table = read_wide(&path).unwrap();
        assert_eq!(table.months, vec![1, 11]);
        let r = &table.records[0];
        assert_eq!(r.level(1), Some("1.5"));
        assert_eq!(r.level(11), None);
        assert!(!r.position.is_resolved());
    }

    #[test]
    fn read_wide_requires_metadata_prefix() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("merged.csv");
        std::fs::write(&path, "Jan,Apr\n1,2\n").unwrap();
        assert!(matches!(
            read_wide(&path).unwrap_err(),
            AggregateError::MissingMetadataColumns(_)
        ));
    }
}
