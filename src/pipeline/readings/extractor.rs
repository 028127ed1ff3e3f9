//! RowExtractor: parses one downloaded well file into readings.
//!
//! The first successful file of a run fixes the source header. Later files
//! are mapped onto it by column name, so a file whose columns come in a
//! different order still lines up. Rows shorter than the file header are
//! dropped and counted.

use std::io::Read;
use std::path::Path;
use std::sync::Arc;

use super::error::RowError;
use super::types::{Reading, WellMetadata};

/// Output of parsing one file.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedFile {
    /// Source header the values are aligned with (the run header once fixed).
    pub header: Vec<String>,
    pub readings: Vec<Reading>,
    /// Rows dropped because they were shorter than the header or unreadable.
    pub malformed: usize,
}

/// Stateless parser for raw reading files.
#[derive(Debug, Default, Clone, Copy)]
pub struct RowExtractor;

impl RowExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Parse a file on disk. `run_header` is the header fixed by an earlier
    /// file, or `None` for the first file of the run.
    pub fn parse(
        &self,
        path: &Path,
        well: &Arc<WellMetadata>,
        run_header: Option<&[String]>,
    ) -> Result<ParsedFile, RowError> {
        let file = std::fs::File::open(path)?;
        self.parse_reader(file, well, run_header)
    }

    pub fn parse_reader<R: Read>(
        &self,
        reader: R,
        well: &Arc<WellMetadata>,
        run_header: Option<&[String]>,
    ) -> Result<ParsedFile, RowError> {
        let mut csv = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(reader);

        let file_header: Vec<String> = csv
            .headers()?
            .iter()
            .map(|h| h.trim_start_matches('\u{feff}').trim().to_string())
            .collect();
        if file_header.iter().all(|h| h.is_empty()) {
            return Err(RowError::EmptyFile);
        }

        let header: Vec<String> = match run_header {
            Some(h) => h.to_vec(),
            None => file_header.clone(),
        };

        // Position of each run-header column within this file.
        let mapping = header
            .iter()
            .map(|column| {
                file_header
                    .iter()
                    .position(|h| h == column)
                    .ok_or_else(|| RowError::SchemaMismatch {
                        column: column.clone(),
                    })
            })
            .collect::<Result<Vec<usize>, RowError>>()?;

        let mut readings = Vec::new();
        let mut malformed = 0usize;

        for (i, record) in csv.records().enumerate() {
            let line = i as u64 + 2;
            let record = match record {
                Ok(r) => r,
                Err(e) => {
                    tracing::warn!(well_id = %well.well_id, line, error = %e, "Unreadable row dropped");
                    malformed += 1;
                    continue;
                }
            };

            if record.len() < file_header.len() {
                let err = RowError::MalformedRow {
                    line,
                    found: record.len(),
                    expected: file_header.len(),
                };
                tracing::warn!(well_id = %well.well_id, error = %err, "Row dropped");
                malformed += 1;
                continue;
            }

            let values = mapping
                .iter()
                .map(|&idx| record.get(idx).unwrap_or_default().trim().to_string())
                .collect();

            readings.push(Reading {
                well: Arc::clone(well),
                values,
            });
        }

        Ok(ParsedFile {
            header,
            readings,
            malformed,
        })
    }
}
