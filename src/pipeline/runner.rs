//! Stage orchestration: scrape → transform → import.
//!
//! Each stage reads the previous stage's CSV artifact, so any stage can be
//! rerun on its own. Only structural failures come back as `PipelineError`;
//! everything per-well or per-record is in the stage summary.

use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::config::RunConfig;
use crate::pipeline::aggregate::{
    read_wide, write_filtered, write_wide, AggregateError, Pivoter, TemporalFilter,
};
use crate::pipeline::readings::{read_log, write_log, RowError};
use crate::pipeline::upsert::{DocumentStore, StoreError, UpsertStats, Upserter};
use crate::pipeline::walker::{DocumentError, InteractiveDocument, RunStats, WalkError, WellWalker};

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Walk aborted: {0}")]
    Walk(#[from] WalkError),

    #[error("Could not open the portal session: {0}")]
    Session(#[from] DocumentError),

    #[error("Reading log error: {0}")]
    Log(#[from] RowError),

    #[error("Aggregation error: {0}")]
    Aggregate(#[from] AggregateError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("No readings fall inside the observation window for {year}")]
    NoObservations { year: i32 },
}

pub fn new_run_id() -> String {
    Uuid::new_v4().to_string()
}

// ═══════════════════════════════════════════
// Stage summaries
// ═══════════════════════════════════════════

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ScrapeSummary {
    pub stats: RunStats,
    pub readings: usize,
    pub malformed_rows: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TransformSummary {
    pub readings: usize,
    pub filtered: usize,
    pub unparseable: usize,
    pub outside_window: usize,
    pub wells: usize,
    pub months: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub stats: UpsertStats,
    pub stored_total: usize,
}

/// Everything a full run reports.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PipelineSummary {
    pub run_id: String,
    pub scrape: Option<ScrapeSummary>,
    pub transform: Option<TransformSummary>,
    pub import: Option<ImportSummary>,
}

// ═══════════════════════════════════════════
// Stages
// ═══════════════════════════════════════════

/// Walk the portal and write the long-format log.
pub fn run_scrape<D: InteractiveDocument>(
    config: &RunConfig,
    doc: D,
) -> Result<ScrapeSummary, PipelineError> {
    let mut walker = WellWalker::new(doc, config);
    let report = walker.walk()?;

    let path = config.paths.all_data_path();
    write_log(&report.log, &path)?;
    tracing::info!(
        path = %path.display(),
        readings = report.log.len(),
        wells = report.log.well_count(),
        "Long-format log saved"
    );

    Ok(ScrapeSummary {
        stats: report.stats,
        readings: report.log.len(),
        malformed_rows: report.malformed_rows,
    })
}

/// Filter the long-format log to the observation window and pivot it.
/// Writes the filtered log and the wide table.
pub fn run_transform(config: &RunConfig) -> Result<TransformSummary, PipelineError> {
    let log = read_log(&config.paths.all_data_path())?;
    let no_observations = || PipelineError::NoObservations {
        year: config.window.year(),
    };
    if log.is_empty() {
        return Err(no_observations());
    }

    let outcome =
        TemporalFilter::new(config.window.clone(), config.columns.clone()).filter(&log)?;
    if outcome.is_empty() {
        tracing::warn!(
            readings = log.len(),
            unparseable = outcome.unparseable,
            outside_window = outcome.outside_window,
            "Nothing left after filtering"
        );
        return Err(no_observations());
    }

    let filtered_path = config.paths.filtered_path();
    write_filtered(&outcome, &filtered_path)?;
    tracing::info!(path = %filtered_path.display(), rows = outcome.len(), "Filtered log saved");

    let table = Pivoter::new(config.window.clone()).pivot(&outcome)?;
    let merged_path = config.paths.merged_path();
    write_wide(&table, &merged_path)?;
    tracing::info!(
        path = %merged_path.display(),
        wells = table.len(),
        columns = ?table.columns(),
        "Wide table saved"
    );

    Ok(TransformSummary {
        readings: log.len(),
        filtered: outcome.len(),
        unparseable: outcome.unparseable,
        outside_window: outcome.outside_window,
        wells: table.len(),
        months: table.months.len(),
    })
}

/// Upsert the wide table into `store` and verify the result.
pub fn run_import<S: DocumentStore + ?Sized>(
    config: &RunConfig,
    store: &S,
) -> Result<ImportSummary, PipelineError> {
    let table = read_wide(&config.paths.merged_path())?;
    tracing::info!(wells = table.len(), "Wide table loaded");

    let upserter = Upserter::new(store);
    let stats = upserter.upsert(&table)?;
    let verification = upserter.verify()?;

    Ok(ImportSummary {
        stats,
        stored_total: verification.total,
    })
}

/// All three stages in order.
pub fn run_full<D: InteractiveDocument, S: DocumentStore + ?Sized>(
    config: &RunConfig,
    doc: D,
    store: &S,
) -> Result<PipelineSummary, PipelineError> {
    let run_id = new_run_id();
    tracing::info!(run_id = %run_id, year = config.window.year(), "Pipeline started");

    let scrape = run_scrape(config, doc)?;
    let transform = run_transform(config)?;
    let import = run_import(config, store)?;

    tracing::info!(
        run_id = %run_id,
        found = scrape.stats.found,
        succeeded = scrape.stats.succeeded,
        failed = scrape.stats.failed,
        inserted = import.stats.inserted,
        updated = import.stats.updated,
        unchanged = import.stats.unchanged,
        skipped = import.stats.skipped,
        errors = import.stats.errors,
        "Pipeline complete"
    );

    Ok(PipelineSummary {
        run_id,
        scrape: Some(scrape),
        transform: Some(transform),
        import: Some(import),
    })
}
