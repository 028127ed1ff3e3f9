use thiserror::Error;

use crate::db::DatabaseError;

/// Failure of the persistence capability.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Document serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Field name '{0}' cannot be indexed")]
    InvalidField(String),
}

/// Why one record could not be written. Counted, never fatal to the batch.
#[derive(Error, Debug)]
pub enum UpsertError {
    #[error("Well {well_id}: {field} value '{value}' is not a number")]
    Coercion {
        well_id: String,
        field: String,
        value: String,
    },

    #[error(transparent)]
    Store(#[from] StoreError),
}
