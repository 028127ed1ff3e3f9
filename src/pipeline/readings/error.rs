use thiserror::Error;

#[derive(Error, Debug)]
pub enum RowError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("File has no header row")]
    EmptyFile,

    #[error("Column '{column}' of the run header is missing from this file")]
    SchemaMismatch { column: String },

    #[error("Row {line} has {found} fields, expected {expected}")]
    MalformedRow {
        line: u64,
        found: usize,
        expected: usize,
    },

    #[error("Log header must start with the metadata columns, found {0:?}")]
    MissingMetadataColumns(Vec<String>),
}
