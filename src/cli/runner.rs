//! CLI runner - executes commands

use crate::catalog::Catalog;
use crate::cli::commands::{Cli, Commands, OutputFormat};
use crate::config::TapConfig;
use crate::engine::{PageFetcher, StreamStatus, SyncEngine, SyncReport};
use crate::error::{Error, Result};
use crate::http::HttpClient;
use crate::output::{JsonLinesSink, LineFormat, SchemaProjection};
use crate::state::StateManager;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::info;

/// CLI runner
pub struct Runner {
    cli: Cli,
    out: Arc<JsonLinesSink>,
}

impl Runner {
    /// Create a new runner writing to standard output
    pub fn new(cli: Cli) -> Self {
        let out = JsonLinesSink::stdout().with_format(line_format(cli.format));
        Self::with_output(cli, out)
    }

    /// Create a runner writing to a custom sink
    pub fn with_output(cli: Cli, out: JsonLinesSink) -> Self {
        Self {
            cli,
            out: Arc::new(out),
        }
    }

    /// Run the CLI command
    pub async fn run(&self) -> Result<()> {
        match &self.cli.command {
            Commands::Read { streams } => self.read(streams.as_deref()).await,
            Commands::Discover => self.discover().await,
            Commands::Streams => self.streams().await,
        }
    }

    /// Load configuration; inline JSON takes precedence
    fn load_config(&self) -> Result<TapConfig> {
        if let Some(json) = &self.cli.config_json {
            return TapConfig::from_json(json);
        }
        match &self.cli.config {
            Some(path) => TapConfig::from_file(path),
            None => Err(Error::config("No config given; use --config or --config-json")),
        }
    }

    /// Load state; inline JSON takes precedence
    fn load_state(&self) -> Result<StateManager> {
        if let Some(state_json) = &self.cli.state_json {
            StateManager::from_json(state_json)
        } else if let Some(path) = &self.cli.state {
            StateManager::from_file(path)
        } else {
            Ok(StateManager::in_memory())
        }
    }

    fn load_catalog(&self) -> Result<Catalog> {
        match &self.cli.catalog {
            Some(path) => Catalog::from_file(path),
            None => Catalog::builtin(),
        }
    }

    /// Discover streams
    async fn discover(&self) -> Result<()> {
        let catalog = self.load_catalog()?;

        let streams: Vec<Value> = catalog
            .descriptors()
            .iter()
            .map(|d| {
                json!({
                    "name": d.name,
                    "json_schema": d.json_schema(),
                    "supported_sync_modes": ["incremental"],
                    "source_defined_cursor": d.replication_key.is_some(),
                    "default_cursor_field": d.replication_key.as_ref().map(|k| vec![k.clone()]),
                    "source_defined_primary_key": d.primary_key.iter().map(|k| vec![k.clone()]).collect::<Vec<_>>(),
                    "parent_stream": d.parent.as_ref().map(|p| p.stream.clone())
                })
            })
            .collect();

        self.out
            .write_message(&json!({
                "type": "CATALOG",
                "catalog": {
                    "streams": streams
                }
            }))
            .await
    }

    /// List available streams (lightweight, no schemas)
    async fn streams(&self) -> Result<()> {
        let catalog = self.load_catalog()?;
        let names: Vec<&str> = catalog
            .descriptors()
            .iter()
            .map(|d| d.name.as_str())
            .collect();

        self.out
            .write_message(&json!({
                "type": "STREAMS",
                "streams": names
            }))
            .await
    }

    /// Read data
    async fn read(&self, streams: Option<&str>) -> Result<()> {
        let config = self.load_config()?;
        let catalog = Arc::new(self.load_catalog()?);
        let state = Arc::new(self.load_state()?);

        let selection = Cli::stream_selection(streams).or_else(|| config.streams.clone());
        let selected = catalog.select(selection.as_deref())?;

        let client = HttpClient::with_config(config.http_client_config(catalog.base_url()))?;
        let fetcher = PageFetcher::new(Arc::new(client), config.retry_policy())
            .with_transform(Arc::new(SchemaProjection::for_catalog(&catalog)?));

        let mut engine = SyncEngine::new(
            Arc::new(fetcher),
            state.clone(),
            self.out.clone(),
            catalog,
        )
        .with_config(config.sync_config()?);

        self.log("INFO", format!("Syncing {} streams", selected.len()))
            .await?;
        let report = engine.sync_all(&selected).await;
        info!(status = report.status(), "Sync finished");

        self.log_outcomes(&report).await?;

        // Final state for callers that do not keep a state file
        let final_state: Value = serde_json::from_str(&state.to_json().await?)?;
        self.out
            .write_message(&json!({
                "type": "STATE",
                "state": final_state
            }))
            .await?;

        self.out
            .write_message(&json!({
                "type": "SYNC_SUMMARY",
                "summary": summary(&report, state.as_ref())
            }))
            .await
    }

    async fn log_outcomes(&self, report: &SyncReport) -> Result<()> {
        for outcome in &report.streams {
            for job in &outcome.dropped_batches {
                self.log(
                    "WARN",
                    format!(
                        "Dropped child batch {} of stream {} ({} parent keys)",
                        job.id,
                        outcome.stream,
                        job.parent_keys.len()
                    ),
                )
                .await?;
            }
            if let Some(error) = &outcome.error {
                self.log(
                    "ERROR",
                    format!("Error syncing stream {}: {error}", outcome.stream),
                )
                .await?;
            }
        }
        Ok(())
    }

    async fn log(&self, level: &str, message: String) -> Result<()> {
        self.out
            .write_message(&json!({
                "type": "LOG",
                "log": {
                    "level": level,
                    "message": message
                }
            }))
            .await
    }
}

fn line_format(format: OutputFormat) -> LineFormat {
    match format {
        OutputFormat::Json => LineFormat::Json,
        OutputFormat::Pretty => LineFormat::Pretty,
    }
}

fn summary(report: &SyncReport, state: &StateManager) -> Value {
    let count = |status: StreamStatus| {
        report
            .streams
            .iter()
            .filter(|s| s.status == status)
            .count()
    };

    json!({
        "status": report.status(),
        "total_records": report.stats.records_synced,
        "total_pages": report.stats.pages_fetched,
        "total_streams": report.streams.len(),
        "successful_streams": count(StreamStatus::Completed),
        "partial_streams": count(StreamStatus::Partial),
        "failed_streams": count(StreamStatus::Failed),
        "child_batches": report.stats.batches_run,
        "dropped_child_batches": report.stats.batches_failed,
        "duration_ms": report.stats.duration_ms,
        "state_file": (!state.is_in_memory()).then(|| state.path().to_string_lossy().to_string()),
        "streams": report.streams
    })
}
