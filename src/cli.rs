//! Command-line surface: `wellsync scrape | transform | import | run`.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use thiserror::Error;

use crate::config::{ConfigError, RunConfig};
use crate::pipeline::runner::{self, PipelineError};
use crate::pipeline::upsert::{SqliteDocumentStore, StoreError};
use crate::pipeline::walker::WebDriverDocument;

#[derive(Parser, Debug)]
#[command(name = "wellsync", author, version)]
#[command(about = "Scrape groundwater well readings, reduce them to an observation calendar, and upsert one document per well")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Walk the portal and write the long-format log.
    Scrape(RunArgs),
    /// Filter the long-format log and pivot it into the wide table.
    Transform(RunArgs),
    /// Upsert the wide table into the document store.
    Import(RunArgs),
    /// Scrape, transform, and import in one go.
    Run(RunArgs),
}

#[derive(Args, Debug, Clone, Default)]
pub struct RunArgs {
    /// JSON run configuration; defaults apply to absent fields.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Override the document store path.
    #[arg(long)]
    pub store: Option<PathBuf>,

    /// Run the browser without a window.
    #[arg(long)]
    pub headless: bool,
}

impl RunArgs {
    fn load(&self) -> Result<RunConfig, ConfigError> {
        let mut config = RunConfig::load_or_default(self.config.as_deref())?;
        if let Some(store) = &self.store {
            config.store_path = store.clone();
        }
        if self.headless {
            config.webdriver.headless = true;
        }
        Ok(config)
    }
}

#[derive(Error, Debug)]
pub enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error("Could not render summary: {0}")]
    Summary(#[from] serde_json::Error),
}

impl From<StoreError> for CliError {
    fn from(e: StoreError) -> Self {
        Self::Pipeline(PipelineError::Store(e))
    }
}

/// Execute one parsed command and print its summary as JSON.
pub fn dispatch(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        Command::Scrape(args) => {
            let config = args.load()?;
            let doc = connect(&config)?;
            print_summary(&runner::run_scrape(&config, doc)?)
        }
        Command::Transform(args) => {
            let config = args.load()?;
            print_summary(&runner::run_transform(&config)?)
        }
        Command::Import(args) => {
            let config = args.load()?;
            let store = SqliteDocumentStore::open(&config.store_path)?;
            print_summary(&runner::run_import(&config, &store)?)
        }
        Command::Run(args) => {
            let config = args.load()?;
            let store = SqliteDocumentStore::open(&config.store_path)?;
            let doc = connect(&config)?;
            print_summary(&runner::run_full(&config, doc, &store)?)
        }
    }
}

fn connect(config: &RunConfig) -> Result<WebDriverDocument, PipelineError> {
    Ok(WebDriverDocument::connect(
        &config.webdriver,
        &config.paths.download_dir,
    )?)
}

fn print_summary<T: Serialize>(summary: &T) -> Result<(), CliError> {
    println!("{}", serde_json::to_string_pretty(summary)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_subcommand_with_config() {
        let cli = Cli::try_parse_from(["wellsync", "transform", "--config", "run.json"]).unwrap();
        match cli.command {
            Command::Transform(args) => {
                assert_eq!(args.config, Some(PathBuf::from("run.json")));
                assert!(!args.headless);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn overrides_apply_on_top_of_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.json");
        std::fs::write(&path, r#"{"page_size": "100"}"#).unwrap();

        let args = RunArgs {
            config: Some(path),
            store: Some(PathBuf::from("/tmp/wells.db")),
            headless: true,
        };
        let config = args.load().unwrap();
        assert_eq!(config.page_size, "100");
        assert_eq!(config.store_path, PathBuf::from("/tmp/wells.db"));
        assert!(config.webdriver.headless);
    }

    #[test]
    fn missing_subcommand_is_rejected() {
        assert!(Cli::try_parse_from(["wellsync"]).is_err());
    }

    #[test]
    fn transform_without_log_fails_cleanly() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.json");
        let out = dir.path().join("out");
        std::fs::write(
            &path,
            serde_json::json!({ "paths": { "download_dir": out } }).to_string(),
        )
        .unwrap();

        let cli = Cli::try_parse_from([
            "wellsync",
            "transform",
            "--config",
            path.to_str().unwrap(),
        ])
        .unwrap();
        assert!(matches!(
            dispatch(cli),
            Err(CliError::Pipeline(PipelineError::Log(_)))
        ));
    }
}
