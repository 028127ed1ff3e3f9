//! Persisted document shape and upsert accounting.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::error::UpsertError;
use crate::pipeline::aggregate::{month_key, WideRecord};
use crate::pipeline::readings::is_unknown;

/// Field the store is keyed and uniquely indexed on.
pub const KEY_FIELD: &str = "wellId";

// ═══════════════════════════════════════════
// WellDocument
// ═══════════════════════════════════════════

/// One well as stored. Month levels are flattened into top-level keys
/// (`january`, `april`, ...); months without a reading are omitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WellDocument {
    pub well_id: String,
    pub village: String,
    pub latitude: f64,
    pub longitude: f64,
    pub coordinates: [Option<f64>; 2],
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block: Option<String>,
    #[serde(flatten)]
    pub levels: BTreeMap<String, f64>,
}

impl WellDocument {
    /// Build from a wide record that passed `is_eligible`.
    pub fn from_record(record: &WideRecord) -> Result<Self, UpsertError> {
        let (Some(latitude), Some(longitude)) =
            (record.position.latitude, record.position.longitude)
        else {
            return Err(UpsertError::Coercion {
                well_id: record.well_id().to_string(),
                field: "coordinates".into(),
                value: format!("{}, {}", record.well.latitude, record.well.longitude),
            });
        };

        let mut levels = BTreeMap::new();
        for (month, value) in &record.levels {
            let Some(raw) = value else { continue };
            let Some(key) = month_key(*month) else { continue };
            let level = raw
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .ok_or_else(|| UpsertError::Coercion {
                    well_id: record.well_id().to_string(),
                    field: key.to_string(),
                    value: raw.clone(),
                })?;
            levels.insert(key.to_string(), level);
        }

        Ok(Self {
            well_id: record.well_id().to_string(),
            village: record.well.village.clone(),
            latitude,
            longitude,
            coordinates: [Some(latitude), Some(longitude)],
            block: Some(record.well.block.clone()).filter(|b| !is_unknown(b)),
            levels,
        })
    }
}

/// Precondition for writing: full position and a known village.
pub fn is_eligible(record: &WideRecord) -> bool {
    record.position.is_resolved() && !is_unknown(&record.well.village)
}

// ═══════════════════════════════════════════
// Outcomes
// ═══════════════════════════════════════════

/// Result of one keyed write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteOutcome {
    Inserted,
    Modified,
    Unchanged,
}

impl WriteOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Inserted => "inserted",
            Self::Modified => "modified",
            Self::Unchanged => "unchanged",
        }
    }
}

/// Filter for `DocumentStore::count`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentFilter {
    All,
    /// Documents carrying a top-level field, e.g. `january`.
    HasField(String),
}

/// Exact persistence accounting for one upsert run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpsertStats {
    pub inserted: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub skipped: usize,
    pub errors: usize,
}

impl UpsertStats {
    pub fn record(&mut self, outcome: WriteOutcome) {
        match outcome {
            WriteOutcome::Inserted => self.inserted += 1,
            WriteOutcome::Modified => self.updated += 1,
            WriteOutcome::Unchanged => self.unchanged += 1,
        }
    }

    pub fn written(&self) -> usize {
        self.inserted + self.updated + self.unchanged
    }

    pub fn total(&self) -> usize {
        self.written() + self.skipped + self.errors
    }
}

/// Post-import check: stored total plus a few documents.
#[derive(Debug, Clone, PartialEq)]
pub struct Verification {
    pub total: usize,
    pub sample: Vec<WellDocument>,
}
