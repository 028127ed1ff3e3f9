use super::error::{StoreError, UpsertError};
use super::traits::DocumentStore;
use super::types::{
    is_eligible, DocumentFilter, UpsertStats, Verification, WellDocument, WriteOutcome, KEY_FIELD,
};
use crate::pipeline::aggregate::{WideRecord, WideTable};

const PROGRESS_EVERY: usize = 10;
const SAMPLE_SIZE: usize = 3;

/// Writes wide records into a `DocumentStore`.
pub struct Upserter<'s, S: DocumentStore + ?Sized> {
    store: &'s S,
}

impl<'s, S: DocumentStore + ?Sized> Upserter<'s, S> {
    pub fn new(store: &'s S) -> Self {
        Self { store }
    }

    /// Upsert every record. Only a failure to set up the unique index is
    /// returned as an error; per-record problems are counted.
    pub fn upsert(&self, table: &WideTable) -> Result<UpsertStats, StoreError> {
        self.store.ensure_unique_index(KEY_FIELD)?;

        let mut stats = UpsertStats::default();
        for record in &table.records {
            if !is_eligible(record) {
                tracing::debug!(
                    well_id = %record.well_id(),
                    village = %record.well.village,
                    latitude = %record.well.latitude,
                    longitude = %record.well.longitude,
                    "Skipping well with unresolved location or village"
                );
                stats.skipped += 1;
                continue;
            }

            match self.write(record) {
                Ok(outcome) => {
                    stats.record(outcome);
                    if stats.written() % PROGRESS_EVERY == 0 {
                        tracing::info!(
                            written = stats.written(),
                            total = table.len(),
                            "Upsert progress"
                        );
                    }
                }
                Err(e) => {
                    tracing::warn!(well_id = %record.well_id(), error = %e, "Upsert failed");
                    stats.errors += 1;
                }
            }
        }

        tracing::info!(
            inserted = stats.inserted,
            updated = stats.updated,
            unchanged = stats.unchanged,
            skipped = stats.skipped,
            errors = stats.errors,
            "Upsert complete"
        );
        Ok(stats)
    }

    fn write(&self, record: &WideRecord) -> Result<WriteOutcome, UpsertError> {
        let document = WellDocument::from_record(record)?;
        Ok(self.store.update_or_insert(record.well_id(), &document)?)
    }

    /// Count stored documents and fetch a small sample.
    pub fn verify(&self) -> Result<Verification, StoreError> {
        let total = self.store.count(&DocumentFilter::All)?;
        let sample = self.store.sample(SAMPLE_SIZE)?;
        tracing::info!(total, "Documents in store");
        for doc in &sample {
            tracing::info!(
                well_id = %doc.well_id,
                village = %doc.village,
                months = doc.levels.len(),
                "Sample document"
            );
        }
        Ok(Verification { total, sample })
    }
}
