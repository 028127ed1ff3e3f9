//! Persistence capability consumed by the Upserter.

use super::error::StoreError;
use super::types::{DocumentFilter, WellDocument, WriteOutcome};

/// A keyed document store.
pub trait DocumentStore {
    /// Enforce uniqueness on a top-level document field. Idempotent.
    fn ensure_unique_index(&self, field: &str) -> Result<(), StoreError>;

    /// Atomically insert `document` under `key`, or overwrite the document
    /// already stored there. Concurrent writers to one key never produce two
    /// documents; the last write wins.
    fn update_or_insert(&self, key: &str, document: &WellDocument)
        -> Result<WriteOutcome, StoreError>;

    fn count(&self, filter: &DocumentFilter) -> Result<usize, StoreError>;

    /// Up to `limit` stored documents, ordered by key.
    fn sample(&self, limit: usize) -> Result<Vec<WellDocument>, StoreError>;
}
