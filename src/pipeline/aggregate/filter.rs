//! TemporalFilter: reduces the long-format log to the observation calendar.
//!
//! Steps: parse timestamp (unparseable rows are counted and dropped), keep
//! the window's year, keep the window's months, then per (well, month) keep
//! the reading whose day is closest to the 15th. On a tie the earlier row
//! of the log wins. Output is sorted by (well identity, timestamp).

use std::collections::HashMap;

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime};

use super::error::AggregateError;
use super::types::{ObservationWindow, MID_MONTH_DAY};
use crate::config::LogColumns;
use crate::pipeline::readings::{Reading, ReadingLog};

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%d-%m-%Y %H:%M:%S",
    "%d-%m-%Y %H:%M",
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d-%m-%Y", "%d/%m/%Y"];

/// Parse a source timestamp. Accepts ISO-like dates with optional time,
/// RFC 3339, and day-first dates. The offset of an RFC 3339 value is
/// dropped; the local wall-clock reading is kept.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.naive_local());
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(dt);
        }
    }
    for fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(raw, fmt) {
            return d.and_hms_opt(0, 0, 0);
        }
    }
    None
}

/// A reading chosen as the representative of its (well, month) pair.
/// Borrows the reading from the log.
#[derive(Debug, Clone, PartialEq)]
pub struct FilteredReading<'a> {
    pub reading: &'a Reading,
    pub observed_at: NaiveDateTime,
}

impl<'a> FilteredReading<'a> {
    pub fn well_id(&self) -> &'a str {
        self.reading.well_id()
    }

    pub fn month(&self) -> u32 {
        self.observed_at.month()
    }

    /// Distance in days from the 15th.
    pub fn day_diff(&self) -> u32 {
        self.observed_at.day().abs_diff(MID_MONTH_DAY)
    }
}

/// Result of filtering one log.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterOutcome<'a> {
    pub readings: Vec<FilteredReading<'a>>,
    /// Source header of the log the readings came from.
    pub source_header: Vec<String>,
    pub timestamp_column: usize,
    pub value_column: usize,
    pub unparseable: usize,
    pub outside_window: usize,
}

impl FilterOutcome<'_> {
    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }

    pub fn len(&self) -> usize {
        self.readings.len()
    }

    /// Measured value of a filtered reading.
    pub fn value<'r>(&self, filtered: &FilteredReading<'r>) -> Option<&'r str> {
        filtered.reading.value(self.value_column)
    }
}

/// Restricts a log to one ObservationWindow.
#[derive(Debug, Clone)]
pub struct TemporalFilter {
    window: ObservationWindow,
    columns: LogColumns,
}

impl TemporalFilter {
    pub fn new(window: ObservationWindow, columns: LogColumns) -> Self {
        Self { window, columns }
    }

    pub fn window(&self) -> &ObservationWindow {
        &self.window
    }

    /// Filter `log`. An empty result is not an error; the caller decides
    /// whether it halts the run.
    pub fn filter<'a>(&self, log: &'a ReadingLog) -> Result<FilterOutcome<'a>, AggregateError> {
        // A log that never received a file has no header to resolve against.
        if log.source_header().is_none() {
            return Ok(FilterOutcome {
                readings: Vec::new(),
                source_header: Vec::new(),
                timestamp_column: 0,
                value_column: 0,
                unparseable: 0,
                outside_window: 0,
            });
        }

        let timestamp_column = log
            .column(&self.columns.timestamp)
            .ok_or_else(|| AggregateError::MissingColumn(self.columns.timestamp.clone()))?;
        let value_column = log
            .column(&self.columns.value)
            .ok_or_else(|| AggregateError::MissingColumn(self.columns.value.clone()))?;

        let mut selected: Vec<FilteredReading<'a>> = Vec::new();
        let mut slot: HashMap<(&'a str, u32), usize> = HashMap::new();
        let mut unparseable = 0usize;
        let mut outside_window = 0usize;

        for reading in log.readings() {
            let Some(observed_at) = reading.value(timestamp_column).and_then(parse_timestamp)
            else {
                unparseable += 1;
                continue;
            };
            if observed_at.year() != self.window.year() || !self.window.contains(observed_at.month())
            {
                outside_window += 1;
                continue;
            }

            let candidate = FilteredReading {
                reading,
                observed_at,
            };
            let key = (reading.well_id(), candidate.month());
            match slot.get(&key) {
                // Strictly closer only, so the first of equal candidates stays.
                Some(&i) if candidate.day_diff() < selected[i].day_diff() => {
                    selected[i] = candidate;
                }
                Some(_) => {}
                None => {
                    slot.insert(key, selected.len());
                    selected.push(candidate);
                }
            }
        }

        selected.sort_by(|a, b| {
            a.well_id()
                .cmp(b.well_id())
                .then(a.observed_at.cmp(&b.observed_at))
        });

        if unparseable > 0 {
            tracing::warn!(unparseable, "Readings with unparseable timestamps dropped");
        }
        tracing::info!(
            input = log.len(),
            selected = selected.len(),
            outside_window,
            year = self.window.year(),
            "Temporal filter complete"
        );

        Ok(FilterOutcome {
            readings: selected,
            source_header: log.source_header().map(<[String]>::to_vec).unwrap_or_default(),
            timestamp_column,
            value_column,
            unparseable,
            outside_window,
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::pipeline::readings::WellMetadata;

    /// Log with a Date / Water Level header from (well, date, value) rows.
    pub(crate) fn log_of(rows: &[(&str, &str, &str)]) -> ReadingLog {
        let readings = rows
            .iter()
            .map(|(id, date, value)| Reading {
                well: Arc::new(WellMetadata {
                    well_id: id.to_string(),
                    village: format!("{id}-village"),
                    latitude: "11.0".into(),
                    longitude: "77.0".into(),
                    block: "Annur".into(),
                }),
                values: vec![date.to_string(), value.to_string()],
            })
            .collect();
        ReadingLog::with_header(vec!["Date".into(), "Water Level".into()], readings)
    }

    fn filter_for(months: Vec<u32>) -> TemporalFilter {
        TemporalFilter::new(
            ObservationWindow::new(2025, months).unwrap(),
            LogColumns::default(),
        )
    }

    #[test]
    fn parses_supported_formats() {
        let expect = NaiveDate::from_ymd_opt(2025, 1, 10)
            .unwrap()
            .and_hms_opt(6, 30, 0)
            .unwrap();
        assert_eq!(parse_timestamp("2025-01-10 06:30:00"), Some(expect));
        assert_eq!(parse_timestamp("2025-01-10T06:30:00"), Some(expect));
        assert_eq!(parse_timestamp("2025-01-10 06:30"), Some(expect));
        assert_eq!(parse_timestamp("2025-01-10T06:30:00+05:30"), Some(expect));
        assert_eq!(parse_timestamp("10-01-2025 06:30:00"), Some(expect));
        assert_eq!(parse_timestamp("10/01/2025 06:30"), Some(expect));
        assert_eq!(
            parse_timestamp("2025-01-10"),
            NaiveDate::from_ymd_opt(2025, 1, 10).unwrap().and_hms_opt(0, 0, 0)
        );
        assert_eq!(parse_timestamp("not a date"), None);
        assert_eq!(parse_timestamp(""), None);
    }

    #[test]
    fn tie_keeps_first_occurrence() {
        let log = log_of(&[
            ("W1", "2025-01-10", "5.2"),
            ("W1", "2025-01-20", "5.8"),
            ("W1", "2025-04-14", "6.0"),
        ]);
        let out = filter_for(vec![1, 4]).filter(&log).unwrap();

        assert_eq!(out.len(), 2);
        assert_eq!(out.readings[0].month(), 1);
        assert_eq!(out.readings[0].day_diff(), 5);
        assert_eq!(out.value(&out.readings[0]), Some("5.2"));
        assert_eq!(out.readings[1].month(), 4);
        assert_eq!(out.value(&out.readings[1]), Some("6.0"));
    }

    #[test]
    fn closest_to_mid_month_wins() {
        let log = log_of(&[
            ("W1", "2025-08-01", "1.0"),
            ("W1", "2025-08-16", "2.0"),
            ("W1", "2025-08-14", "3.0"),
            ("W1", "2025-08-30", "4.0"),
        ]);
        let out = filter_for(vec![8]).filter(&log).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out.value(&out.readings[0]), Some("2.0"));
    }

    #[test]
    fn drops_other_years_months_and_bad_timestamps() {
        let log = log_of(&[
            ("W1", "2024-01-15", "1.0"),
            ("W1", "2025-02-15", "2.0"),
            ("W1", "garbage", "3.0"),
            ("W1", "", "3.5"),
            ("W1", "2025-11-15", "4.0"),
        ]);
        let out = filter_for(vec![1, 11]).filter(&log).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out.unparseable, 2);
        assert_eq!(out.outside_window, 2);
    }

    #[test]
    fn sorted_by_identity_then_time() {
        let log = log_of(&[
            ("W2", "2025-04-15", "1.0"),
            ("W1", "2025-11-15", "2.0"),
            ("W2", "2025-01-15", "3.0"),
            ("W1", "2025-01-15", "4.0"),
        ]);
        let out = filter_for(vec![1, 4, 8, 11]).filter(&log).unwrap();
        let order: Vec<(&str, u32)> = out
            .readings
            .iter()
            .map(|r| (r.well_id(), r.month()))
            .collect();
        assert_eq!(order, vec![("W1", 1), ("W1", 11), ("W2", 1), ("W2", 4)]);
    }

    #[test]
    fn at_most_one_per_well_and_month() {
        let log = log_of(&[
            ("W1", "2025-01-03", "1"),
            ("W1", "2025-01-27", "2"),
            ("W2", "2025-01-03", "3"),
            ("W1", "2025-01-15", "4"),
            ("W2", "2025-01-13", "5"),
        ]);
        let out = filter_for(vec![1]).filter(&log).unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out.value(&out.readings[0]), Some("4"));
        assert_eq!(out.value(&out.readings[1]), Some("5"));
    }

    #[test]
    fn nothing_in_window_is_empty_not_error() {
        let log = log_of(&[("W1", "2023-01-15", "1")]);
        let out = filter_for(vec![1]).filter(&log).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn log_without_header_filters_to_nothing() {
        let empty = ReadingLog::new();
        let out = filter_for(vec![1]).filter(&empty).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn missing_timestamp_column_is_error() {
        let log = ReadingLog::with_header(vec!["When".into(), "Water Level".into()], vec![]);
        let err = filter_for(vec![1]).filter(&log).unwrap_err();
        assert!(matches!(err, AggregateError::MissingColumn(c) if c == "Date"));
    }
}
