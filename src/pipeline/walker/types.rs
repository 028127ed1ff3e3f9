//! Walk state, handles, and run accounting.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::error::FailedWell;
use crate::pipeline::readings::ReadingLog;

// ═══════════════════════════════════════════
// WalkState
// ═══════════════════════════════════════════

/// Where the walker is in the navigation protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WalkState {
    Idle,
    ListLoaded,
    FilterApplied,
    TableReady,
    WellSelected,
    Exported,
    Returned,
    Done,
}

impl WalkState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::ListLoaded => "list_loaded",
            Self::FilterApplied => "filter_applied",
            Self::TableReady => "table_ready",
            Self::WellSelected => "well_selected",
            Self::Exported => "exported",
            Self::Returned => "returned",
            Self::Done => "done",
        }
    }
}

impl fmt::Display for WalkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ═══════════════════════════════════════════
// Handles and choices
// ═══════════════════════════════════════════

/// Position of a well in the enumerated table. Row handles are re-fetched
/// before each use; only the index is kept across re-renders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WellHandle {
    /// Zero-based row index in the table.
    pub index: usize,
    /// One-based position in enumeration order, used in logs and the
    /// `well_<n>` identity fallback.
    pub ordinal: usize,
}

impl WellHandle {
    pub fn at(index: usize) -> Self {
        Self {
            index,
            ordinal: index + 1,
        }
    }

    pub fn fallback_id(&self) -> String {
        format!("well_{}", self.ordinal)
    }
}

/// How to pick an option from a select element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptionChoice {
    Label(String),
    Value(String),
    Index(usize),
}

impl fmt::Display for OptionChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Label(l) => write!(f, "label '{l}'"),
            Self::Value(v) => write!(f, "value '{v}'"),
            Self::Index(i) => write!(f, "index {i}"),
        }
    }
}

// ═══════════════════════════════════════════
// Results
// ═══════════════════════════════════════════

/// Exact extraction accounting. `found == succeeded + failed` once a walk
/// has finished.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStats {
    pub found: usize,
    pub succeeded: usize,
    pub failed: usize,
}

impl RunStats {
    pub fn is_exhaustive(&self) -> bool {
        self.found == self.succeeded + self.failed
    }
}

/// Output of a complete walk.
#[derive(Debug, Default)]
pub struct WalkReport {
    pub stats: RunStats,
    pub log: ReadingLog,
    pub failures: Vec<FailedWell>,
    /// Rows dropped by the extractor across all files.
    pub malformed_rows: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handle_ordinal_is_one_based() {
        let h = WellHandle::at(0);
        assert_eq!(h.ordinal, 1);
        assert_eq!(h.fallback_id(), "well_1");
    }

    #[test]
    fn state_names() {
        assert_eq!(WalkState::TableReady.as_str(), "table_ready");
        assert_eq!(WalkState::Done.to_string(), "done");
    }

    #[test]
    fn choice_display() {
        assert_eq!(OptionChoice::Label("CGWB".into()).to_string(), "label 'CGWB'");
        assert_eq!(OptionChoice::Index(1).to_string(), "index 1");
    }

    #[test]
    fn stats_exhaustive() {
        let s = RunStats {
            found: 3,
            succeeded: 2,
            failed: 1,
        };
        assert!(s.is_exhaustive());
        assert!(!RunStats { found: 1, ..Default::default() }.is_exhaustive());
    }
}
