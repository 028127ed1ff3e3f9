//! Long-format reading log and the per-file row extractor.
//!
//! Every downloaded well file is parsed against one fixed source header (the
//! first successful file's) and prefixed with the well's metadata, producing
//! one `Reading` per source row.

pub mod error;
pub mod types;
pub mod extractor;
pub mod log_io;

pub use error::RowError;
pub use types::*;
pub use extractor::{ParsedFile, RowExtractor};
pub use log_io::{read_log, write_log};
