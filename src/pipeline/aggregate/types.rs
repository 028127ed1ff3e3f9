//! Types for the observation calendar and the wide table.

use serde::{Deserialize, Serialize};

use super::error::AggregateError;
use crate::pipeline::readings::{is_unknown, WellMetadata, METADATA_COLUMNS};

/// Day of month the filter aims for.
pub const MID_MONTH_DAY: u32 = 15;

const MONTH_ABBR: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

const MONTH_KEYS: [&str; 12] = [
    "january",
    "february",
    "march",
    "april",
    "may",
    "june",
    "july",
    "august",
    "september",
    "october",
    "november",
    "december",
];

/// Wide-table column label for a month ("Jan" for 1).
pub fn month_abbr(month: u32) -> Option<&'static str> {
    MONTH_ABBR.get(month.checked_sub(1)? as usize).copied()
}

/// Persisted document key for a month ("january" for 1).
pub fn month_key(month: u32) -> Option<&'static str> {
    MONTH_KEYS.get(month.checked_sub(1)? as usize).copied()
}

/// Month number for a wide-table column label.
pub fn month_from_abbr(label: &str) -> Option<u32> {
    MONTH_ABBR
        .iter()
        .position(|m| *m == label)
        .map(|i| i as u32 + 1)
}

// ═══════════════════════════════════════════
// ObservationWindow
// ═══════════════════════════════════════════

/// Target year plus an ordered set of distinct months (1–12).
///
/// The declared month order is the column order of the wide table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "WindowSpec", into = "WindowSpec")]
pub struct ObservationWindow {
    year: i32,
    months: Vec<u32>,
}

#[derive(Serialize, Deserialize)]
struct WindowSpec {
    year: i32,
    months: Vec<u32>,
}

impl ObservationWindow {
    pub fn new(year: i32, months: Vec<u32>) -> Result<Self, AggregateError> {
        if months.is_empty() {
            return Err(AggregateError::InvalidWindow(
                "at least one month is required".into(),
            ));
        }
        for (i, &month) in months.iter().enumerate() {
            if !(1..=12).contains(&month) {
                return Err(AggregateError::InvalidWindow(format!(
                    "month {month} is outside 1-12"
                )));
            }
            if months[..i].contains(&month) {
                return Err(AggregateError::InvalidWindow(format!(
                    "month {month} appears more than once"
                )));
            }
        }
        Ok(Self { year, months })
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn months(&self) -> &[u32] {
        &self.months
    }

    pub fn contains(&self, month: u32) -> bool {
        self.months.contains(&month)
    }
}

impl Default for ObservationWindow {
    fn default() -> Self {
        Self {
            year: 2025,
            months: vec![1, 4, 8, 11],
        }
    }
}

impl TryFrom<WindowSpec> for ObservationWindow {
    type Error = AggregateError;

    fn try_from(spec: WindowSpec) -> Result<Self, Self::Error> {
        Self::new(spec.year, spec.months)
    }
}

impl From<ObservationWindow> for WindowSpec {
    fn from(window: ObservationWindow) -> Self {
        Self {
            year: window.year,
            months: window.months,
        }
    }
}

// ═══════════════════════════════════════════
// Position
// ═══════════════════════════════════════════

/// Combined geographic position. Both halves are absent when either
/// coordinate is unresolved or not a number.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl Position {
    pub fn from_fields(latitude: &str, longitude: &str) -> Self {
        match (parse_coordinate(latitude), parse_coordinate(longitude)) {
            (Some(lat), Some(lon)) => Self {
                latitude: Some(lat),
                longitude: Some(lon),
            },
            _ => Self::default(),
        }
    }

    pub fn from_metadata(well: &WellMetadata) -> Self {
        Self::from_fields(&well.latitude, &well.longitude)
    }

    pub fn is_resolved(&self) -> bool {
        self.latitude.is_some() && self.longitude.is_some()
    }

    pub fn as_pair(&self) -> [Option<f64>; 2] {
        [self.latitude, self.longitude]
    }
}

fn parse_coordinate(raw: &str) -> Option<f64> {
    if is_unknown(raw) {
        return None;
    }
    raw.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

// ═══════════════════════════════════════════
// Wide table
// ═══════════════════════════════════════════

/// One row of the wide table.
#[derive(Debug, Clone, PartialEq)]
pub struct WideRecord {
    /// First-seen metadata of the well.
    pub well: WellMetadata,
    pub position: Position,
    /// One slot per month of the table, in table order. `None` when the
    /// well has no filtered reading for that month.
    pub levels: Vec<(u32, Option<String>)>,
}

impl WideRecord {
    pub fn well_id(&self) -> &str {
        &self.well.well_id
    }

    pub fn level(&self, month: u32) -> Option<&str> {
        self.levels
            .iter()
            .find(|(m, _)| *m == month)
            .and_then(|(_, v)| v.as_deref())
    }
}

/// Pivoted output: one record per well, ordered by identity.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct WideTable {
    /// Months present in at least one record, in window order.
    pub months: Vec<u32>,
    pub records: Vec<WideRecord>,
}

impl WideTable {
    /// Metadata columns followed by one label per present month.
    pub fn columns(&self) -> Vec<String> {
        METADATA_COLUMNS
            .iter()
            .copied()
            .chain(self.months.iter().filter_map(|&m| month_abbr(m)))
            .map(str::to_string)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn month_labels() {
        assert_eq!(month_abbr(1), Some("Jan"));
        assert_eq!(month_abbr(11), Some("Nov"));
        assert_eq!(month_abbr(0), None);
        assert_eq!(month_abbr(13), None);
        assert_eq!(month_key(8), Some("august"));
        assert_eq!(month_from_abbr("Apr"), Some(4));
        assert_eq!(month_from_abbr("coordinates"), None);
    }

    #[test]
    fn window_rejects_duplicates_and_out_of_range() {
        let err = ObservationWindow::new(2025, vec![1, 4, 1]).unwrap_err();
        assert!(err.to_string().contains("more than once"));
        assert!(ObservationWindow::new(2025, vec![0]).is_err());
        assert!(ObservationWindow::new(2025, vec![12, 13]).is_err());
        assert!(ObservationWindow::new(2025, vec![]).is_err());
    }

    #[test]
    fn window_keeps_declared_order() {
        let w = ObservationWindow::new(2024, vec![11, 1, 8]).unwrap();
        assert_eq!(w.months(), &[11, 1, 8]);
        assert!(w.contains(8));
        assert!(!w.contains(4));
    }

    #[test]
    fn window_serde_validates() {
        let w: ObservationWindow =
            serde_json::from_str(r#"{"year": 2025, "months": [4, 1]}"#).unwrap();
        assert_eq!(w.months(), &[4, 1]);
        let json = serde_json::to_string(&w).unwrap();
        assert_eq!(json, r#"{"year":2025,"months":[4,1]}"#);

        let bad = serde_json::from_str::<ObservationWindow>(r#"{"year": 2025, "months": [2, 2]}"#);
        assert!(bad.is_err());
    }

    #[test]
    fn position_requires_both_coordinates() {
        let p = Position::from_fields("11.02", "76.95");
        assert!(p.is_resolved());
        assert_eq!(p.as_pair(), [Some(11.02), Some(76.95)]);

        assert_eq!(Position::from_fields("Unknown", "76.95").as_pair(), [None, None]);
        assert_eq!(Position::from_fields("11.02", "east").as_pair(), [None, None]);
        assert_eq!(Position::from_fields("", "").as_pair(), [None, None]);
    }

    #[test]
    fn columns_follow_present_months() {
        let table = WideTable {
            months: vec![1, 8],
            records: vec![],
        };
        assert_eq!(
            table.columns(),
            vec!["Well_ID", "Village", "Latitude", "Longitude", "Block", "Jan", "Aug"]
        );
    }
}
