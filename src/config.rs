//! Run configuration.
//!
//! One immutable `RunConfig` per run. Defaults reproduce the Coimbatore
//! district import (CGWB portal, year 2025, Jan/Apr/Aug/Nov); any field can be
//! overridden from a JSON file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::pipeline::aggregate::ObservationWindow;

/// Application-level constants
pub const APP_NAME: &str = "WellSync";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default tracing filter when `RUST_LOG` is unset.
pub fn default_log_filter() -> &'static str {
    "wellsync_lib=info,wellsync=info"
}

/// Application data directory: ~/WellSync/, or ./WellSync when no home
/// directory can be resolved.
pub fn app_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_NAME)
}

/// Default location of the document store.
pub fn default_store_path() -> PathBuf {
    app_data_dir().join("well_data.db")
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Could not read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid config JSON: {0}")]
    Json(#[from] serde_json::Error),
}

// ═══════════════════════════════════════════
// Sections
// ═══════════════════════════════════════════

/// Cascading filter applied before the well table is shown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterCriteria {
    pub agency: String,
    /// Project option label; falls back to the first real option when absent.
    pub project: String,
    pub region: String,
    pub subregion: String,
}

impl Default for FilterCriteria {
    fn default() -> Self {
        Self {
            agency: "CGWB".into(),
            project: "--All--".into(),
            region: "Tamil Nadu".into(),
            subregion: "Coimbatore".into(),
        }
    }
}

/// Selectors for the portal's interactive surface.
///
/// Plain CSS, plus `:has-text('...')` to match on element text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PageSelectors {
    pub agency: String,
    pub project: String,
    pub region: String,
    pub subregion: String,
    pub filter_button: String,
    pub table_rows: String,
    pub page_length: String,
    pub row_handle: String,
    pub export_button: String,
    pub tabular_tab: Option<String>,
    pub return_primary: String,
    pub return_fallbacks: Vec<String>,
}

impl Default for PageSelectors {
    fn default() -> Self {
        Self {
            agency: "#agency".into(),
            project: "#ProjectId".into(),
            region: "#StateCode".into(),
            subregion: "#DistrictCode".into(),
            filter_button: "button:has-text('Filter')".into(),
            table_rows: "table tbody tr".into(),
            page_length: "select[name='simpletable_length']".into(),
            row_handle: "table tbody tr input[type='radio']".into(),
            export_button: "button:has-text('Export')".into(),
            tabular_tab: Some("a:has-text('Tabular View')".into()),
            return_primary: "button.btn-list".into(),
            return_fallbacks: vec![
                "button:has-text('Close')".into(),
                "button.btn-primary.btn-list".into(),
            ],
        }
    }
}

/// Which table cells of a well row carry its metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetadataLayout {
    pub well_id: usize,
    pub village: usize,
    pub latitude: usize,
    pub longitude: usize,
    pub block: Option<usize>,
    /// Rows with fewer cells than this are left unresolved.
    pub min_cells: usize,
}

impl Default for MetadataLayout {
    fn default() -> Self {
        Self {
            well_id: 1,
            village: 2,
            latitude: 3,
            longitude: 4,
            block: None,
            min_cells: 5,
        }
    }
}

/// Bounded waits, in milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timeouts {
    pub navigation_ms: u64,
    pub populate_ms: u64,
    pub table_ms: u64,
    pub export_ready_ms: u64,
    pub download_ms: u64,
    pub return_primary_ms: u64,
    pub return_fallback_ms: u64,
    pub reload_ms: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            navigation_ms: 60_000,
            populate_ms: 10_000,
            table_ms: 15_000,
            export_ready_ms: 5_000,
            download_ms: 15_000,
            return_primary_ms: 2_000,
            return_fallback_ms: 1_000,
            reload_ms: 5_000,
        }
    }
}

impl Timeouts {
    pub fn navigation(&self) -> Duration {
        Duration::from_millis(self.navigation_ms)
    }
    pub fn populate(&self) -> Duration {
        Duration::from_millis(self.populate_ms)
    }
    pub fn table(&self) -> Duration {
        Duration::from_millis(self.table_ms)
    }
    pub fn export_ready(&self) -> Duration {
        Duration::from_millis(self.export_ready_ms)
    }
    pub fn download(&self) -> Duration {
        Duration::from_millis(self.download_ms)
    }
    pub fn return_primary(&self) -> Duration {
        Duration::from_millis(self.return_primary_ms)
    }
    pub fn return_fallback(&self) -> Duration {
        Duration::from_millis(self.return_fallback_ms)
    }
    pub fn reload(&self) -> Duration {
        Duration::from_millis(self.reload_ms)
    }
}

/// Names of the source columns the aggregation stages depend on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogColumns {
    pub timestamp: String,
    pub value: String,
}

impl Default for LogColumns {
    fn default() -> Self {
        Self {
            timestamp: "Date".into(),
            value: "Water Level".into(),
        }
    }
}

/// Where intermediate CSV artifacts go.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputPaths {
    pub download_dir: PathBuf,
    pub all_data: String,
    pub filtered: String,
    pub merged: String,
}

impl Default for OutputPaths {
    fn default() -> Self {
        Self {
            download_dir: PathBuf::from("CGWB"),
            all_data: "Coimbatore_CGWB_All_Data.csv".into(),
            filtered: "Coimbatore_CGWB_2025_Filtered.csv".into(),
            merged: "Coimbatore_CGWB_2025_Merged.csv".into(),
        }
    }
}

impl OutputPaths {
    pub fn all_data_path(&self) -> PathBuf {
        self.download_dir.join(&self.all_data)
    }
    pub fn filtered_path(&self) -> PathBuf {
        self.download_dir.join(&self.filtered)
    }
    pub fn merged_path(&self) -> PathBuf {
        self.download_dir.join(&self.merged)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WebDriverSettings {
    pub endpoint: String,
    pub headless: bool,
}

impl Default for WebDriverSettings {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:4444".into(),
            headless: false,
        }
    }
}

// ═══════════════════════════════════════════
// RunConfig
// ═══════════════════════════════════════════

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub base_url: String,
    pub criteria: FilterCriteria,
    pub window: ObservationWindow,
    /// Value of the page-length option to select (e.g. "50").
    pub page_size: String,
    pub selectors: PageSelectors,
    pub metadata_layout: MetadataLayout,
    pub timeouts: Timeouts,
    pub columns: LogColumns,
    pub paths: OutputPaths,
    pub store_path: PathBuf,
    pub webdriver: WebDriverSettings,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            base_url: "https://gwdata.cgwb.gov.in/WaterLevel/DWLR".into(),
            criteria: FilterCriteria::default(),
            window: ObservationWindow::default(),
            page_size: "50".into(),
            selectors: PageSelectors::default(),
            metadata_layout: MetadataLayout::default(),
            timeouts: Timeouts::default(),
            columns: LogColumns::default(),
            paths: OutputPaths::default(),
            store_path: default_store_path(),
            webdriver: WebDriverSettings::default(),
        }
    }
}

impl RunConfig {
    /// Parse a JSON config; absent fields keep their defaults. The observation
    /// window is validated while deserializing.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&json)
    }

    /// Load from `path` if given, otherwise use defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(p) => Self::load(p),
            None => Ok(Self::default()),
        }
    }
}
