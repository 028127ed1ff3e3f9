//! ScriptedDocument: an in-memory portal that replays a fixed well table.
//!
//! Mirrors the portal's observable behaviour closely enough to drive the
//! walker end to end without a browser: dropdowns with options, a filter
//! button that reveals the table, row selection, an export that writes a
//! file into the download directory, and return affordances.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::error::DocumentError;
use super::traits::InteractiveDocument;
use super::types::OptionChoice;
use crate::config::{FilterCriteria, PageSelectors};

/// One row of the scripted well table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptedRow {
    pub cells: Vec<String>,
    /// Contents of the exported file; `None` makes the export time out.
    pub download: Option<String>,
    /// Whether the row carries a selection handle. Caption rows do not.
    pub handle: bool,
}

impl ScriptedRow {
    pub fn new(cells: &[&str], download: &str) -> Self {
        Self {
            cells: cells.iter().map(|c| c.to_string()).collect(),
            download: Some(download.to_string()),
            handle: true,
        }
    }

    pub fn without_download(cells: &[&str]) -> Self {
        Self {
            download: None,
            ..Self::new(cells, "")
        }
    }

    /// Group caption or "no data" row: part of the table, not selectable.
    pub fn caption(cells: &[&str]) -> Self {
        Self {
            handle: false,
            ..Self::without_download(cells)
        }
    }
}

pub struct ScriptedDocument {
    selectors: PageSelectors,
    download_dir: PathBuf,
    options: HashMap<String, Vec<String>>,
    selected: HashMap<String, String>,
    hidden: HashSet<String>,
    stalled: HashSet<String>,
    rows: Vec<ScriptedRow>,
    shrink_after_return: Option<usize>,
    unreachable: bool,
    filtered: bool,
    selected_row: Option<usize>,
    clicks: Vec<String>,
    downloads: usize,
}

impl ScriptedDocument {
    /// Empty page: no options, no rows.
    pub fn new(selectors: PageSelectors, download_dir: impl AsRef<Path>) -> Self {
        Self {
            selectors,
            download_dir: download_dir.as_ref().to_path_buf(),
            options: HashMap::new(),
            selected: HashMap::new(),
            hidden: HashSet::new(),
            stalled: HashSet::new(),
            rows: Vec::new(),
            shrink_after_return: None,
            unreachable: false,
            filtered: false,
            selected_row: None,
            clicks: Vec::new(),
            downloads: 0,
        }
    }

    /// Page whose cascading dropdowns offer exactly the options `criteria`
    /// asks for, plus a placeholder, and a page-length select.
    pub fn portal(
        selectors: PageSelectors,
        criteria: &FilterCriteria,
        download_dir: impl AsRef<Path>,
    ) -> Self {
        let page_length = selectors.page_length.clone();
        let cascade = [
            (selectors.agency.clone(), criteria.agency.clone()),
            (selectors.project.clone(), criteria.project.clone()),
            (selectors.region.clone(), criteria.region.clone()),
            (selectors.subregion.clone(), criteria.subregion.clone()),
        ];
        let mut doc = Self::new(selectors, download_dir);
        for (selector, label) in cascade {
            doc.options
                .insert(selector, vec!["--Select--".to_string(), label]);
        }
        doc.options.insert(
            page_length,
            ["10", "25", "50", "100"].iter().map(|s| s.to_string()).collect(),
        );
        doc
    }

    pub fn with_options(mut self, selector: &str, labels: &[&str]) -> Self {
        self.options.insert(
            selector.to_string(),
            labels.iter().map(|l| l.to_string()).collect(),
        );
        self
    }

    pub fn with_rows(mut self, rows: Vec<ScriptedRow>) -> Self {
        self.rows = rows;
        self
    }

    /// Never visible.
    pub fn hide(mut self, selector: &str) -> Self {
        self.hidden.insert(selector.to_string());
        self
    }

    /// Never visible and never populated.
    pub fn stall(mut self, selector: &str) -> Self {
        self.stalled.insert(selector.to_string());
        self
    }

    /// After the next return to the list, the table re-renders with only
    /// `rows` rows.
    pub fn shrink_after_return(mut self, rows: usize) -> Self {
        self.shrink_after_return = Some(rows);
        self
    }

    /// Navigation never completes.
    pub fn unreachable(mut self) -> Self {
        self.unreachable = true;
        self
    }

    pub fn clicks(&self) -> &[String] {
        &self.clicks
    }

    pub fn selected(&self, selector: &str) -> Option<&str> {
        self.selected.get(selector).map(String::as_str)
    }

    pub fn downloads(&self) -> usize {
        self.downloads
    }

    fn is_row_selector(&self, selector: &str) -> bool {
        selector == self.selectors.table_rows || selector == self.selectors.row_handle
    }

    /// Table row index of each element matching `selector`.
    fn row_indices(&self, selector: &str) -> Vec<usize> {
        if !self.filtered {
            return Vec::new();
        }
        let handles_only = selector == self.selectors.row_handle;
        (0..self.rows.len())
            .filter(|&i| !handles_only || self.rows[i].handle)
            .collect()
    }

    fn is_return_selector(&self, selector: &str) -> bool {
        selector == self.selectors.return_primary
            || self.selectors.return_fallbacks.iter().any(|s| s == selector)
    }

    fn needs_selection(&self, selector: &str) -> bool {
        selector == self.selectors.export_button
            || self.is_return_selector(selector)
            || self.selectors.tabular_tab.as_deref() == Some(selector)
    }

    fn visible(&self, selector: &str) -> bool {
        if self.hidden.contains(selector) || self.stalled.contains(selector) {
            false
        } else if selector == self.selectors.table_rows {
            // The table body renders once filtered, even with no wells.
            self.filtered
        } else if self.is_row_selector(selector) {
            !self.row_indices(selector).is_empty()
        } else if self.needs_selection(selector) {
            self.selected_row.is_some()
        } else {
            true
        }
    }

    fn timeout(what: &str, timeout: Duration) -> DocumentError {
        DocumentError::Timeout {
            what: what.to_string(),
            waited_ms: timeout.as_millis() as u64,
        }
    }
}

impl InteractiveDocument for ScriptedDocument {
    fn navigate(&mut self, url: &str, timeout: Duration) -> Result<(), DocumentError> {
        if self.unreachable {
            return Err(Self::timeout(url, timeout));
        }
        self.filtered = false;
        self.selected_row = None;
        Ok(())
    }

    fn select_option(
        &mut self,
        selector: &str,
        choice: &OptionChoice,
    ) -> Result<(), DocumentError> {
        let options = self
            .options
            .get(selector)
            .ok_or_else(|| DocumentError::NotFound(selector.to_string()))?;
        let picked = match choice {
            OptionChoice::Label(l) | OptionChoice::Value(l) => options.iter().find(|o| *o == l),
            OptionChoice::Index(i) => options.get(*i),
        }
        .ok_or_else(|| DocumentError::OptionMissing {
            selector: selector.to_string(),
            choice: choice.to_string(),
        })?;
        self.selected.insert(selector.to_string(), picked.clone());
        Ok(())
    }

    fn wait_until_visible(
        &mut self,
        selector: &str,
        timeout: Duration,
    ) -> Result<(), DocumentError> {
        if self.visible(selector) {
            Ok(())
        } else {
            Err(Self::timeout(selector, timeout))
        }
    }

    fn wait_until_populated(
        &mut self,
        selector: &str,
        min_options: usize,
        timeout: Duration,
    ) -> Result<(), DocumentError> {
        let populated = !self.stalled.contains(selector)
            && self
                .options
                .get(selector)
                .is_some_and(|o| o.len() >= min_options);
        if populated {
            Ok(())
        } else {
            Err(Self::timeout(selector, timeout))
        }
    }

    fn is_visible(&mut self, selector: &str) -> Result<bool, DocumentError> {
        Ok(self.visible(selector))
    }

    fn click(&mut self, selector: &str) -> Result<(), DocumentError> {
        if !self.visible(selector) {
            return Err(DocumentError::NotFound(selector.to_string()));
        }
        self.clicks.push(selector.to_string());

        if selector == self.selectors.filter_button {
            self.filtered = true;
        } else if self.is_return_selector(selector) {
            self.selected_row = None;
            if let Some(n) = self.shrink_after_return.take() {
                self.rows.truncate(n);
            }
        }
        Ok(())
    }

    fn count(&mut self, selector: &str) -> Result<usize, DocumentError> {
        if self.is_row_selector(selector) {
            Ok(self.row_indices(selector).len())
        } else {
            Ok(usize::from(self.visible(selector)))
        }
    }

    fn click_nth(&mut self, selector: &str, index: usize) -> Result<(), DocumentError> {
        let count = self.count(selector)?;
        if index >= count {
            return Err(DocumentError::IndexOutOfRange {
                selector: selector.to_string(),
                index,
                count,
            });
        }
        self.clicks.push(format!("{selector}[{index}]"));
        if self.is_row_selector(selector) {
            self.selected_row = self.row_indices(selector).get(index).copied();
        }
        Ok(())
    }

    fn row_cells(&mut self, selector: &str, index: usize) -> Result<Vec<String>, DocumentError> {
        // Cells of the row enclosing the `index`-th match.
        let indices = self.row_indices(selector);
        let count = indices.len();
        indices
            .get(index)
            .and_then(|&i| self.rows.get(i))
            .map(|r| r.cells.clone())
            .ok_or_else(|| DocumentError::IndexOutOfRange {
                selector: selector.to_string(),
                index,
                count,
            })
    }

    fn await_download(
        &mut self,
        trigger: &str,
        timeout: Duration,
    ) -> Result<PathBuf, DocumentError> {
        self.click(trigger)?;
        let content = self
            .selected_row
            .and_then(|i| self.rows.get(i))
            .and_then(|r| r.download.clone())
            .ok_or_else(|| Self::timeout("download", timeout))?;

        std::fs::create_dir_all(&self.download_dir)?;
        self.downloads += 1;
        let path = self
            .download_dir
            .join(format!("export_{}.csv", self.downloads));
        std::fs::write(&path, content)?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_reveals_rows() {
        let dir = tempfile::tempdir().unwrap();
        let selectors = PageSelectors::default();
        let mut doc =
            ScriptedDocument::portal(selectors.clone(), &FilterCriteria::default(), dir.path())
                .with_rows(vec![ScriptedRow::new(&["1", "W1"], "Date\n2025-01-01\n")]);

        assert_eq!(doc.count(&selectors.row_handle).unwrap(), 0);
        doc.click(&selectors.filter_button).unwrap();
        assert_eq!(doc.count(&selectors.row_handle).unwrap(), 1);
        assert!(!doc.is_visible(&selectors.export_button).unwrap());

        doc.click_nth(&selectors.row_handle, 0).unwrap();
        assert!(doc.is_visible(&selectors.export_button).unwrap());

        let path = doc
            .await_download(&selectors.export_button, Duration::from_millis(5))
            .unwrap();
        assert_eq!(std::fs::read_to_string(path).unwrap(), "Date\n2025-01-01\n");
    }

    #[test]
    fn missing_option_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let mut doc = ScriptedDocument::new(PageSelectors::default(), dir.path())
            .with_options("#agency", &["--Select--", "CGWB"]);
        let err = doc
            .select_option("#agency", &OptionChoice::Label("SGWD".into()))
            .unwrap_err();
        assert!(matches!(err, DocumentError::OptionMissing { .. }));
        doc.select_option("#agency", &OptionChoice::Value("CGWB".into()))
            .unwrap();
        assert_eq!(doc.selected("#agency"), Some("CGWB"));
    }

    #[test]
    fn export_without_file_times_out() {
        let dir = tempfile::tempdir().unwrap();
        let selectors = PageSelectors::default();
        let mut doc = ScriptedDocument::new(selectors.clone(), dir.path())
            .with_rows(vec![ScriptedRow::without_download(&["1", "W1"])]);
        doc.click(&selectors.filter_button).unwrap();
        doc.click_nth(&selectors.row_handle, 0).unwrap();
        let err = doc
            .await_download(&selectors.export_button, Duration::from_millis(5))
            .unwrap_err();
        assert!(err.is_timeout());
    }

    #[test]
    fn caption_rows_have_no_handle() {
        let dir = tempfile::tempdir().unwrap();
        let selectors = PageSelectors::default();
        let mut doc = ScriptedDocument::new(selectors.clone(), dir.path()).with_rows(vec![
            ScriptedRow::caption(&["Annur block"]),
            ScriptedRow::new(&["1", "W1"], "Date\n"),
        ]);
        doc.click(&selectors.filter_button).unwrap();

        assert_eq!(doc.count(&selectors.table_rows).unwrap(), 2);
        assert_eq!(doc.count(&selectors.row_handle).unwrap(), 1);
        assert_eq!(doc.row_cells(&selectors.row_handle, 0).unwrap(), vec!["1", "W1"]);
        assert_eq!(doc.row_cells(&selectors.table_rows, 0).unwrap(), vec!["Annur block"]);
    }

    #[test]
    fn empty_result_still_renders_table() {
        let dir = tempfile::tempdir().unwrap();
        let selectors = PageSelectors::default();
        let mut doc = ScriptedDocument::new(selectors.clone(), dir.path());
        assert!(!doc.is_visible(&selectors.table_rows).unwrap());
        doc.click(&selectors.filter_button).unwrap();
        assert!(doc.is_visible(&selectors.table_rows).unwrap());
        assert_eq!(doc.count(&selectors.row_handle).unwrap(), 0);
    }
}
