//! Core types for the long-format reading log.
//!
//! Well → Reading (metadata ++ raw source values) → ReadingLog (one fixed
//! header for the whole run).

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::extractor::ParsedFile;

/// Marker for a metadata field that could not be resolved from the portal.
/// Downstream stages treat it as a value of its own, distinct from absence.
pub const UNKNOWN: &str = "Unknown";

/// Metadata columns that prefix every row of the long-format log.
pub const METADATA_COLUMNS: [&str; 5] = ["Well_ID", "Village", "Latitude", "Longitude", "Block"];

/// True for the "Unknown" marker and for blank values.
pub fn is_unknown(value: &str) -> bool {
    let v = value.trim();
    v.is_empty() || v == UNKNOWN
}

// ═══════════════════════════════════════════
// Well metadata
// ═══════════════════════════════════════════

/// Identity metadata of one well, scraped from its row in the well table.
/// Immutable for the run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WellMetadata {
    pub well_id: String,
    pub village: String,
    pub latitude: String,
    pub longitude: String,
    pub block: String,
}

impl WellMetadata {
    /// Metadata with every field except the identity left unresolved.
    pub fn unresolved(well_id: impl Into<String>) -> Self {
        Self {
            well_id: well_id.into(),
            village: UNKNOWN.into(),
            latitude: UNKNOWN.into(),
            longitude: UNKNOWN.into(),
            block: UNKNOWN.into(),
        }
    }

    /// Fields in `METADATA_COLUMNS` order.
    pub fn fields(&self) -> [&str; 5] {
        [
            self.well_id.as_str(),
            self.village.as_str(),
            self.latitude.as_str(),
            self.longitude.as_str(),
            self.block.as_str(),
        ]
    }

    /// Build from the first five fields of a log row.
    pub fn from_fields<S: AsRef<str>>(fields: &[S]) -> Option<Self> {
        match fields {
            [id, village, lat, lon, block, ..] => Some(Self {
                well_id: id.as_ref().to_string(),
                village: village.as_ref().to_string(),
                latitude: lat.as_ref().to_string(),
                longitude: lon.as_ref().to_string(),
                block: block.as_ref().to_string(),
            }),
            _ => None,
        }
    }
}

// ═══════════════════════════════════════════
// Reading
// ═══════════════════════════════════════════

/// One source row of one well. `values` is aligned with the log's source
/// header; timestamp and measured value are looked up by column name.
#[derive(Debug, Clone, PartialEq)]
pub struct Reading {
    pub well: Arc<WellMetadata>,
    pub values: Vec<String>,
}

impl Reading {
    pub fn well_id(&self) -> &str {
        &self.well.well_id
    }

    pub fn value(&self, column: usize) -> Option<&str> {
        self.values.get(column).map(String::as_str)
    }
}

// ═══════════════════════════════════════════
// ReadingLog
// ═══════════════════════════════════════════

/// The run's combined long-format log.
///
/// The source header is fixed by the first file appended; every later file
/// has already been interpreted against it by the extractor.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReadingLog {
    source_header: Option<Vec<String>>,
    readings: Vec<Reading>,
}

impl ReadingLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a log with a known header (used when reading a log back from disk).
    pub fn with_header(source_header: Vec<String>, readings: Vec<Reading>) -> Self {
        Self {
            source_header: Some(source_header),
            readings,
        }
    }

    pub fn source_header(&self) -> Option<&[String]> {
        self.source_header.as_deref()
    }

    /// Full output header: metadata columns followed by the source header.
    pub fn header(&self) -> Vec<String> {
        METADATA_COLUMNS
            .iter()
            .map(|c| c.to_string())
            .chain(self.source_header.iter().flatten().cloned())
            .collect()
    }

    /// Index of a source column within `Reading::values`.
    pub fn column(&self, name: &str) -> Option<usize> {
        self.source_header
            .as_ref()?
            .iter()
            .position(|h| h == name)
    }

    pub fn readings(&self) -> &[Reading] {
        &self.readings
    }

    pub fn len(&self) -> usize {
        self.readings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }

    /// Number of distinct wells with at least one reading.
    pub fn well_count(&self) -> usize {
        let mut ids: Vec<&str> = self.readings.iter().map(Reading::well_id).collect();
        ids.sort_unstable();
        ids.dedup();
        ids.len()
    }

    /// Append one parsed file. The first file fixes the source header.
    pub fn append(&mut self, parsed: ParsedFile) {
        if self.source_header.is_none() {
            self.source_header = Some(parsed.header);
        }
        self.readings.extend(parsed.readings);
    }
}
