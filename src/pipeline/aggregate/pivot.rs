//! Pivoter: filtered readings to one row per well.

use std::collections::{BTreeMap, HashMap};

use super::error::AggregateError;
use super::filter::FilterOutcome;
use super::types::{ObservationWindow, Position, WideRecord, WideTable};
use crate::pipeline::readings::WellMetadata;

struct Group<'a> {
    well: &'a WellMetadata,
    levels: HashMap<u32, Option<String>>,
}

/// Reshapes filtered readings into a `WideTable` for one window.
#[derive(Debug, Clone)]
pub struct Pivoter {
    window: ObservationWindow,
}

impl Pivoter {
    pub fn new(window: ObservationWindow) -> Self {
        Self { window }
    }

    /// Group by well identity and spread months into columns.
    ///
    /// Metadata comes from the first reading seen for each well. A second
    /// reading for the same (well, month) is rejected; the filter never
    /// produces one.
    pub fn pivot(&self, filtered: &FilterOutcome<'_>) -> Result<WideTable, AggregateError> {
        let mut groups: BTreeMap<&str, Group<'_>> = BTreeMap::new();

        for fr in &filtered.readings {
            let group = groups.entry(fr.well_id()).or_insert_with(|| Group {
                well: fr.reading.well.as_ref(),
                levels: HashMap::new(),
            });
            let month = fr.month();
            if group.levels.contains_key(&month) {
                return Err(AggregateError::DuplicateObservation {
                    well_id: fr.well_id().to_string(),
                    month,
                });
            }
            let value = filtered
                .value(fr)
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string);
            group.levels.insert(month, value);
        }

        let months: Vec<u32> = self
            .window
            .months()
            .iter()
            .copied()
            .filter(|m| groups.values().any(|g| g.levels.contains_key(m)))
            .collect();

        let records = groups
            .into_values()
            .map(|mut g| WideRecord {
                well: g.well.clone(),
                position: Position::from_metadata(g.well),
                levels: months
                    .iter()
                    .map(|&m| (m, g.levels.remove(&m).flatten()))
                    .collect(),
            })
            .collect::<Vec<_>>();

        tracing::info!(
            wells = records.len(),
            months = months.len(),
            "Pivot complete"
        );

        Ok(WideTable { months, records })
    }
}
