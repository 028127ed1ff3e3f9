//! The walk itself: enumerate, then extract every well in order.

use std::path::Path;
use std::sync::Arc;

use super::error::{FailedWell, WalkError, WellFailure};
use super::recovery::{Recovery, RecoveryChain};
use super::traits::InteractiveDocument;
use super::types::{OptionChoice, RunStats, WalkReport, WalkState, WellHandle};
use crate::config::{FilterCriteria, MetadataLayout, RunConfig};
use crate::pipeline::readings::{ParsedFile, ReadingLog, RowExtractor, WellMetadata, UNKNOWN};

/// Dropdowns need the placeholder plus at least one real option.
const MIN_POPULATED_OPTIONS: usize = 2;

/// Drives one document session through the well table.
///
/// Wells are processed strictly one after another: the portal has a single
/// selection and a single export button per session. Running several
/// walkers, each over its own session and a disjoint slice of the handles
/// returned by `enumerate`, is the way to parallelize if the portal ever
/// tolerates concurrent sessions.
pub struct WellWalker<'c, D: InteractiveDocument> {
    doc: D,
    config: &'c RunConfig,
    extractor: RowExtractor,
    state: WalkState,
    return_chain: RecoveryChain,
}

impl<'c, D: InteractiveDocument> WellWalker<'c, D> {
    pub fn new(doc: D, config: &'c RunConfig) -> Self {
        let return_chain = RecoveryChain::clicks(
            &config.selectors.return_primary,
            config.timeouts.return_primary(),
            &config.selectors.return_fallbacks,
            config.timeouts.return_fallback(),
        );
        Self {
            doc,
            config,
            extractor: RowExtractor::new(),
            state: WalkState::Idle,
            return_chain,
        }
    }

    pub fn state(&self) -> WalkState {
        self.state
    }

    pub fn document(&self) -> &D {
        &self.doc
    }

    pub fn into_document(self) -> D {
        self.doc
    }

    fn transition(&mut self, next: WalkState) {
        tracing::debug!(from = %self.state, to = %next, "Walk state");
        self.state = next;
    }

    /// Enumerate and extract every well.
    pub fn walk(&mut self) -> Result<WalkReport, WalkError> {
        let config = self.config;
        let handles = self.enumerate(&config.criteria)?;
        Ok(self.run_all(&handles))
    }

    /// Apply the cascading filter and list the wells in the table.
    ///
    /// Fails with `NavigationTimeout` if any filter step or the results
    /// table never becomes ready, and with `NoResultsFound` if
    /// the rendered table has no rows. On success the document is in `TableReady`.
    pub fn enumerate(&mut self, criteria: &FilterCriteria) -> Result<Vec<WellHandle>, WalkError> {
        let config = self.config;
        let sel = &config.selectors;
        let timeouts = &config.timeouts;

        tracing::info!(url = %config.base_url, "Opening portal");
        self.doc
            .navigate(&config.base_url, timeouts.navigation())
            .map_err(WalkError::at("navigate"))?;
        self.transition(WalkState::ListLoaded);

        self.select_after_populated(&sel.agency, &criteria.agency, "agency")?;

        self.doc
            .wait_until_populated(&sel.project, MIN_POPULATED_OPTIONS, timeouts.populate())
            .map_err(WalkError::at("project"))?;
        let project_chain = RecoveryChain::new(vec![
            Recovery::Select {
                selector: sel.project.clone(),
                choice: OptionChoice::Label(criteria.project.clone()),
            },
            Recovery::Select {
                selector: sel.project.clone(),
                choice: OptionChoice::Index(1),
            },
        ]);
        let used = project_chain
            .attempt(&mut self.doc)
            .map_err(WalkError::at("project"))?;
        if used > 0 {
            tracing::warn!(
                project = %criteria.project,
                "Project label not offered, using first option"
            );
        }

        self.select_after_populated(&sel.region, &criteria.region, "region")?;
        self.select_after_populated(&sel.subregion, &criteria.subregion, "subregion")?;

        self.doc
            .click(&sel.filter_button)
            .map_err(WalkError::at("filter"))?;
        self.transition(WalkState::FilterApplied);

        // The table body renders even for an empty result; an empty table
        // shows up as a zero handle count below.
        self.doc
            .wait_until_visible(&sel.table_rows, timeouts.table())
            .map_err(WalkError::at("table"))?;

        // Page length is best-effort; the default page still yields wells.
        let page_size = OptionChoice::Value(config.page_size.clone());
        let resized = self
            .doc
            .wait_until_visible(&sel.page_length, timeouts.export_ready())
            .and_then(|()| self.doc.select_option(&sel.page_length, &page_size))
            .and_then(|()| self.doc.wait_until_visible(&sel.table_rows, timeouts.table()));
        if let Err(e) = resized {
            tracing::warn!(page_size = %config.page_size, error = %e, "Could not set page length");
        }

        let found = self
            .doc
            .count(&sel.row_handle)
            .map_err(WalkError::at("enumerate"))?;
        if found == 0 {
            return Err(WalkError::NoResultsFound);
        }
        self.transition(WalkState::TableReady);
        tracing::info!(
            found,
            subregion = %criteria.subregion,
            "Well table ready"
        );

        Ok((0..found).map(WellHandle::at).collect())
    }

    fn select_after_populated(
        &mut self,
        selector: &str,
        label: &str,
        step: &'static str,
    ) -> Result<(), WalkError> {
        self.doc
            .wait_until_populated(selector, MIN_POPULATED_OPTIONS, self.config.timeouts.populate())
            .map_err(WalkError::at(step))?;
        self.doc
            .select_option(selector, &OptionChoice::Label(label.to_string()))
            .map_err(WalkError::at(step))
    }

    /// Extract one well and return to the table. Failures are classified
    /// and returned, never propagated as structural errors.
    ///
    /// `run_header` is the header fixed by the first successful file.
    pub fn extract_one(
        &mut self,
        handle: WellHandle,
        run_header: Option<&[String]>,
    ) -> Result<ParsedFile, FailedWell> {
        let mut well_id = None;
        let result = self.export_and_parse(handle, run_header, &mut well_id);

        // Returning is attempted whether or not the export worked, so the
        // next well starts from the table.
        if self.state != WalkState::TableReady {
            self.return_to_table(handle);
        }

        result.map_err(|failure| FailedWell {
            ordinal: handle.ordinal,
            well_id,
            failure,
        })
    }

    fn export_and_parse(
        &mut self,
        handle: WellHandle,
        run_header: Option<&[String]>,
        well_id: &mut Option<String>,
    ) -> Result<ParsedFile, WellFailure> {
        let config = self.config;
        let sel = &config.selectors;
        let timeouts = &config.timeouts;

        // Row handles go stale after each return; query them again.
        let count = self
            .doc
            .count(&sel.row_handle)
            .map_err(WellFailure::at("refetch"))?;
        if handle.index >= count {
            return Err(WellFailure::RowMissing {
                index: handle.index,
                count,
            });
        }

        self.doc
            .click_nth(&sel.row_handle, handle.index)
            .map_err(WellFailure::at("select"))?;
        self.transition(WalkState::WellSelected);

        self.doc
            .wait_until_visible(&sel.export_button, timeouts.export_ready())
            .map_err(WellFailure::at("export_ready"))?;

        if let Some(tab) = &sel.tabular_tab {
            if matches!(self.doc.is_visible(tab), Ok(true)) {
                if let Err(e) = self.doc.click(tab) {
                    tracing::debug!(
                        ordinal = handle.ordinal,
                        error = %e,
                        "Tabular view not opened"
                    );
                }
            }
        }

        let well = Arc::new(self.scrape_metadata(handle));
        *well_id = Some(well.well_id.clone());
        tracing::info!(
            ordinal = handle.ordinal,
            well_id = %well.well_id,
            village = %well.village,
            latitude = %well.latitude,
            longitude = %well.longitude,
            "Well selected"
        );

        let path = self
            .doc
            .await_download(&sel.export_button, timeouts.download())
            .map_err(WellFailure::at("download"))?;
        self.transition(WalkState::Exported);

        let parsed = self.extractor.parse(&path, &well, run_header);
        discard_download(&path);
        Ok(parsed?)
    }

    /// Read identity metadata from the cells of the row holding the clicked
    /// handle. Anything missing becomes "Unknown"; a missing identity becomes
    /// `well_<ordinal>`.
    fn scrape_metadata(&mut self, handle: WellHandle) -> WellMetadata {
        let config = self.config;
        let layout = &config.metadata_layout;
        match self.doc.row_cells(&config.selectors.row_handle, handle.index) {
            Ok(cells) if cells.len() >= layout.min_cells => {
                metadata_from_cells(&cells, layout, handle)
            }
            Ok(cells) => {
                tracing::warn!(
                    ordinal = handle.ordinal,
                    cells = cells.len(),
                    expected = layout.min_cells,
                    "Row too short for metadata"
                );
                WellMetadata::unresolved(handle.fallback_id())
            }
            Err(e) => {
                tracing::warn!(
                    ordinal = handle.ordinal,
                    error = %e,
                    "Could not read well metadata"
                );
                WellMetadata::unresolved(handle.fallback_id())
            }
        }
    }

    fn return_to_table(&mut self, handle: WellHandle) {
        let config = self.config;
        match self.return_chain.attempt(&mut self.doc) {
            Ok(_) => self.transition(WalkState::Returned),
            Err(e) => {
                tracing::warn!(ordinal = handle.ordinal, error = %e, "Could not return to table");
            }
        }
        match self
            .doc
            .wait_until_visible(&config.selectors.table_rows, config.timeouts.reload())
        {
            Ok(()) => self.transition(WalkState::TableReady),
            Err(e) => {
                tracing::warn!(ordinal = handle.ordinal, error = %e, "Table did not reload");
            }
        }
    }

    /// Attempt every handle exactly once, in order, and account for each.
    pub fn run_all(&mut self, handles: &[WellHandle]) -> WalkReport {
        let mut report = WalkReport {
            stats: RunStats {
                found: handles.len(),
                ..RunStats::default()
            },
            log: ReadingLog::new(),
            ..WalkReport::default()
        };

        for &handle in handles {
            tracing::info!(ordinal = handle.ordinal, total = handles.len(), "Processing well");
            match self.extract_one(handle, report.log.source_header()) {
                Ok(parsed) => {
                    report.malformed_rows += parsed.malformed;
                    tracing::info!(
                        ordinal = handle.ordinal,
                        rows = parsed.readings.len(),
                        "Well added to log"
                    );
                    report.log.append(parsed);
                    report.stats.succeeded += 1;
                }
                Err(failed) => {
                    tracing::warn!(
                        ordinal = failed.ordinal,
                        well_id = failed.well_id.as_deref().unwrap_or(UNKNOWN),
                        kind = failed.failure.kind(),
                        error = %failed.failure,
                        "Well failed"
                    );
                    report.stats.failed += 1;
                    report.failures.push(failed);
                }
            }
        }

        self.transition(WalkState::Done);
        tracing::info!(
            found = report.stats.found,
            succeeded = report.stats.succeeded,
            failed = report.stats.failed,
            readings = report.log.len(),
            "Walk complete"
        );
        report
    }
}

fn metadata_from_cells(
    cells: &[String],
    layout: &MetadataLayout,
    handle: WellHandle,
) -> WellMetadata {
    let cell = |idx: Option<usize>| {
        idx.and_then(|i| cells.get(i))
            .map(|c| c.trim())
            .filter(|c| !c.is_empty())
            .map(str::to_string)
    };
    WellMetadata {
        well_id: cell(Some(layout.well_id)).unwrap_or_else(|| handle.fallback_id()),
        village: cell(Some(layout.village)).unwrap_or_else(|| UNKNOWN.into()),
        latitude: cell(Some(layout.latitude)).unwrap_or_else(|| UNKNOWN.into()),
        longitude: cell(Some(layout.longitude)).unwrap_or_else(|| UNKNOWN.into()),
        block: cell(layout.block).unwrap_or_else(|| UNKNOWN.into()),
    }
}

fn discard_download(path: &Path) {
    if let Err(e) = std::fs::remove_file(path) {
        tracing::warn!(path = %path.display(), error = %e, "Could not delete download");
    }
}
