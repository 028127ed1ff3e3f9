//! Upserter: writes one document per well into a keyed document store.
//!
//! Records without a resolved position or village are skipped. Each
//! remaining record is written with insert-if-absent-else-overwrite keyed
//! on well identity, and classified as inserted, updated, or unchanged.

pub mod error;
pub mod types;
pub mod traits;
pub mod store;
pub mod upserter;

pub use error::{StoreError, UpsertError};
pub use types::*;
pub use traits::DocumentStore;
pub use store::SqliteDocumentStore;
pub use upserter::Upserter;
