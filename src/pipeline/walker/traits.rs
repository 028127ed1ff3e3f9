//! Capability the walker drives the portal through.
//!
//! Selectors are CSS, optionally suffixed with `:has-text('...')` to match
//! on element text. Every wait is bounded by the timeout passed in.

use std::path::PathBuf;
use std::time::Duration;

use super::error::DocumentError;
use super::types::OptionChoice;

pub trait InteractiveDocument {
    /// Load `url` and wait for the page to settle.
    fn navigate(&mut self, url: &str, timeout: Duration) -> Result<(), DocumentError>;

    /// Set a select element and fire its change events.
    fn select_option(&mut self, selector: &str, choice: &OptionChoice)
        -> Result<(), DocumentError>;

    /// Wait until at least one element matching `selector` is visible.
    fn wait_until_visible(&mut self, selector: &str, timeout: Duration)
        -> Result<(), DocumentError>;

    /// Wait until a select element holds at least `min_options` options.
    fn wait_until_populated(
        &mut self,
        selector: &str,
        min_options: usize,
        timeout: Duration,
    ) -> Result<(), DocumentError>;

    /// Whether an element matching `selector` is visible right now.
    fn is_visible(&mut self, selector: &str) -> Result<bool, DocumentError>;

    /// Click the first element matching `selector`.
    fn click(&mut self, selector: &str) -> Result<(), DocumentError>;

    /// Number of elements matching `selector`, freshly queried.
    fn count(&mut self, selector: &str) -> Result<usize, DocumentError>;

    /// Click the `index`-th element matching `selector`.
    fn click_nth(&mut self, selector: &str, index: usize) -> Result<(), DocumentError>;

    /// Trimmed text of each cell of the `index`-th row matching `selector`.
    fn row_cells(&mut self, selector: &str, index: usize) -> Result<Vec<String>, DocumentError>;

    /// Click `trigger` and wait for the file it produces. Returns the path
    /// of the completed download; the caller owns and deletes it.
    fn await_download(&mut self, trigger: &str, timeout: Duration)
        -> Result<PathBuf, DocumentError>;
}
