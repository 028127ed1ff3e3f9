//! Temporal aggregation: long-format log → observation calendar → wide table.
//!
//! ```text
//! ReadingLog ─TemporalFilter→ FilterOutcome ─Pivoter→ WideTable
//! ```
//!
//! The filter keeps one reading per (well, month), the one closest to the
//! 15th. The pivoter turns those into one row per well with one column per
//! observed month, in the window's declared order.

pub mod error;
pub mod types;
pub mod filter;
pub mod pivot;
pub mod export;

pub use error::AggregateError;
pub use types::*;
pub use filter::{parse_timestamp, FilterOutcome, FilteredReading, TemporalFilter};
pub use pivot::Pivoter;
pub use export::{read_wide, write_filtered, write_wide};
