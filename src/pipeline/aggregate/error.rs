use thiserror::Error;

#[derive(Error, Debug)]
pub enum AggregateError {
    #[error("Invalid observation window: {0}")]
    InvalidWindow(String),

    #[error("Required column '{0}' is missing from the reading log")]
    MissingColumn(String),

    #[error("Well {well_id} has more than one filtered reading for month {month}")]
    DuplicateObservation { well_id: String, month: u32 },

    #[error("Wide table header must start with the metadata columns, found {0:?}")]
    MissingMetadataColumns(Vec<String>),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}
