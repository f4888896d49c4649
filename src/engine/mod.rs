//! Execution engine module
//!
//! Main read loop and stream orchestration.
//!
//! # Overview
//!
//! The engine module provides:
//! - `SyncEngine` - Drives each stream through its pages with bookmarking
//! - `PageFetcher` - One page request through the retry policy
//! - `SyncConfig` - Configuration for sync operations
//! - `SyncReport` - Per-stream outcomes for the run
//!
//! Parent paging is strictly sequential. A bookmark is saved only after the
//! records it covers have been written and flushed, so a failure never
//! leaves a bookmark ahead of the emitted data.

mod child;
mod fetcher;
mod types;

pub use fetcher::PageFetcher;
pub use types::{Page, StreamOutcome, StreamStatus, SyncConfig, SyncReport, SyncStats};

use crate::catalog::{Catalog, DispatchStrategy, StreamDescriptor};
use crate::error::{Error, Result};
use crate::output::RecordSink;
use crate::pagination::{CursorInput, CursorStep, PageToken, PaginationMode, WindowCursor};
use crate::partition::{BatchDispatcher, BatchJob, BatchReport, BatchStatus};
use crate::state::{Bookmark, BookmarkStore, PartitionState};
use crate::types::{key_field, JsonObject};
use child::{sync_children, ChildBatchFetcher};
use chrono::Duration;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

/// Sync engine for orchestrating data extraction
pub struct SyncEngine {
    fetcher: Arc<PageFetcher>,
    store: Arc<dyn BookmarkStore>,
    sink: Arc<dyn RecordSink>,
    catalog: Arc<Catalog>,
    config: SyncConfig,
    stats: SyncStats,
}

impl SyncEngine {
    /// Create a new sync engine
    pub fn new(
        fetcher: Arc<PageFetcher>,
        store: Arc<dyn BookmarkStore>,
        sink: Arc<dyn RecordSink>,
        catalog: Arc<Catalog>,
    ) -> Self {
        Self {
            fetcher,
            store,
            sink,
            catalog,
            config: SyncConfig::default(),
            stats: SyncStats::default(),
        }
    }

    /// Set sync configuration
    #[must_use]
    pub fn with_config(mut self, config: SyncConfig) -> Self {
        self.config = config;
        self
    }

    /// Get statistics
    pub fn stats(&self) -> &SyncStats {
        &self.stats
    }

    /// Sync streams one after another.
    ///
    /// A fatal error ends only the stream it happened in.
    pub async fn sync_all(&mut self, streams: &[String]) -> SyncReport {
        let start = Instant::now();
        let mut outcomes = Vec::with_capacity(streams.len());

        for name in streams {
            outcomes.push(self.sync_stream(name).await);
        }

        self.stats.set_duration(start.elapsed().as_millis() as u64);
        SyncReport {
            streams: outcomes,
            stats: self.stats.clone(),
        }
    }

    /// Sync one top-level stream and its child stream, if any
    pub async fn sync_stream(&mut self, name: &str) -> StreamOutcome {
        let start = Instant::now();
        let mut outcome = StreamOutcome::new(name);
        info!(stream = name, "Starting sync");

        let result = match self.catalog.descriptor(name).cloned() {
            Ok(descriptor) if descriptor.is_child() => Err(Error::config(format!(
                "Stream '{name}' is synced through its parent"
            ))),
            Ok(descriptor) => self.run_stream(&descriptor, &mut outcome).await,
            Err(e) => Err(e),
        };

        if let Err(e) = result {
            error!(stream = name, "Sync failed: {e}");
            outcome.fail(&e);
            self.stats.add_error();
        }

        match self.store.load(name).await {
            Ok(bookmark) if bookmark != Bookmark::new() => outcome.bookmark = Some(bookmark),
            Ok(_) => {}
            Err(e) => warn!(stream = name, "Could not read back bookmark: {e}"),
        }
        self.stats.add_failed_batches(outcome.dropped_batches.len());

        outcome.duration_ms = start.elapsed().as_millis() as u64;
        self.stats.add_stream();
        info!(
            stream = name,
            status = ?outcome.status,
            records = outcome.records,
            child_records = outcome.child_records,
            pages = outcome.pages,
            "Finished sync"
        );
        outcome
    }

    async fn run_stream(
        &mut self,
        descriptor: &StreamDescriptor,
        outcome: &mut StreamOutcome,
    ) -> Result<()> {
        let child = match descriptor.children {
            DispatchStrategy::None => None,
            _ => Some(
                self.catalog
                    .child_of(&descriptor.name)
                    .cloned()
                    .ok_or_else(|| {
                        Error::stream_not_found(format!("{}.children", descriptor.name))
                    })?,
            ),
        };
        let parent_key = child
            .as_ref()
            .and_then(|c| c.parent.as_ref())
            .map(|link| link.parent_key.clone())
            .or_else(|| descriptor.key_field().map(ToString::to_string));

        let mut bookmark = self.store.load(&descriptor.name).await?;
        bookmark.begin_run(descriptor.replication_key.as_deref(), self.config.start_date);

        let mut child_bookmark = match &child {
            Some(c) => self.store.load(&c.name).await?,
            None => Bookmark::new(),
        };

        // Unwindowed streams filter on the run's starting value, fixed once.
        let lower_bound = match descriptor.pagination {
            PaginationMode::None | PaginationMode::SkipOnly => bookmark
                .starting_replication_value
                .map(|v| v + Duration::seconds(1)),
            _ => None,
        };

        let cursor = WindowCursor::for_stream(descriptor);
        let today = self.config.today.unwrap_or_else(chrono::Utc::now);

        let mut dispatcher = match (&child, descriptor.children) {
            (Some(c), DispatchStrategy::Batched) => Some(BatchDispatcher::new(
                c.name.clone(),
                Arc::new(ChildBatchFetcher {
                    fetcher: Arc::clone(&self.fetcher),
                    sink: Arc::clone(&self.sink),
                    descriptor: c.clone(),
                }),
                self.config.batch_size,
                self.config.concurrency,
            )),
            _ => None,
        };

        let mut prior: Option<PageToken> = None;
        let mut has_more = false;

        loop {
            let resume_point = if descriptor.pagination.is_windowed() {
                bookmark.resume_point()
            } else {
                None
            };
            let token = match cursor.next_token(CursorInput {
                prior: prior.as_ref(),
                has_more,
                resume_point,
                today,
            })? {
                CursorStep::Next(token) => token,
                CursorStep::Stop => break,
            };

            let page = self
                .fetcher
                .fetch_page(descriptor, &token, lower_bound)
                .await?;
            outcome.pages += 1;
            self.stats.add_page();

            match (&child, descriptor.children) {
                (Some(c), DispatchStrategy::Batched) => {
                    // Children of this page finish before its parents are
                    // emitted and the page is checkpointed.
                    if let (Some(dispatcher), Some(field)) = (dispatcher.as_mut(), &parent_key) {
                        for record in &page.records {
                            match key_field(record, field) {
                                Some(key) => dispatcher.push(key).await?,
                                None => warn!(
                                    stream = %descriptor.name,
                                    child = %c.name,
                                    "Record without '{field}', no children fetched"
                                ),
                            }
                        }
                        let report = dispatcher.drain().await?;
                        self.record_batches(&c.name, &report, outcome);
                    }
                    self.emit(&descriptor.name, &page.records, outcome).await?;
                    self.sink.flush().await?;
                    if let Some(value) = page.max_replication_value {
                        bookmark.advance(value);
                    }
                    self.checkpoint(&descriptor.name, &bookmark.flattened())
                        .await?;
                    self.checkpoint(&c.name, &child_bookmark.flattened())
                        .await?;
                    outcome.checkpoints += 1;
                }
                (Some(c), DispatchStrategy::PerRecord) => {
                    self.emit(&descriptor.name, &page.records, outcome).await?;
                    self.sync_per_record(
                        c,
                        parent_key.as_deref(),
                        &page.records,
                        &mut child_bookmark,
                        outcome,
                    )
                    .await?;
                    self.sink.flush().await?;
                    if let Some(value) = page.max_replication_value {
                        bookmark.advance(value);
                    }
                    self.checkpoint(&c.name, &child_bookmark).await?;
                    self.checkpoint(&descriptor.name, &bookmark).await?;
                    outcome.checkpoints += 1;
                }
                _ => {
                    self.emit(&descriptor.name, &page.records, outcome).await?;
                    self.sink.flush().await?;
                    if let Some(value) = page.max_replication_value {
                        bookmark.advance(value);
                    }
                    self.checkpoint(&descriptor.name, &bookmark).await?;
                    outcome.checkpoints += 1;
                }
            }

            has_more = page.has_more;
            prior = Some(token);
        }

        bookmark.finalize();
        if matches!(descriptor.children, DispatchStrategy::Batched) {
            bookmark = bookmark.flattened();
        }
        self.checkpoint(&descriptor.name, &bookmark).await?;
        outcome.checkpoints += 1;
        Ok(())
    }

    /// Fold one drained round of child batches into the outcome
    fn record_batches(&mut self, child: &str, report: &BatchReport, outcome: &mut StreamOutcome) {
        self.stats.add_batches(report.jobs.len());
        outcome.child_records += report.child_records();
        self.stats.add_records(report.child_records());
        for job in report.failed() {
            warn!(
                stream = %child,
                batch = job.id,
                keys = job.parent_keys.len(),
                "Dropped child batch"
            );
        }
        outcome.dropped_batches.extend(report.failed().cloned());
    }

    /// Inline child fetch for each parent record of a page.
    ///
    /// A failed child fetch is logged and reported like a dropped batch.
    async fn sync_per_record(
        &mut self,
        child: &StreamDescriptor,
        parent_key: Option<&str>,
        records: &[JsonObject],
        child_bookmark: &mut Bookmark,
        outcome: &mut StreamOutcome,
    ) -> Result<()> {
        let Some(field) = parent_key else {
            return Ok(());
        };

        for record in records {
            let Some(key) = key_field(record, field) else {
                continue;
            };
            let keys = vec![key.clone()];
            match sync_children(&self.fetcher, self.sink.as_ref(), child, &keys).await {
                Ok(count) => {
                    outcome.child_records += count;
                    self.stats.add_records(count);
                    let mut context = JsonObject::new();
                    context.insert(field.to_string(), key.clone().into());
                    *child_bookmark.partition_mut(&key) = PartitionState::completed(context);
                }
                Err(e) => {
                    warn!(stream = %child.name, parent = %key, "Child fetch failed: {e}");
                    outcome.dropped_batches.push(BatchJob {
                        id: outcome.dropped_batches.len(),
                        parent_keys: keys,
                        status: BatchStatus::Failed {
                            error: e.to_string(),
                        },
                    });
                }
            }
            self.stats.add_batches(1);
        }
        Ok(())
    }

    async fn emit(
        &mut self,
        stream: &str,
        records: &[JsonObject],
        outcome: &mut StreamOutcome,
    ) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }
        self.sink.write_records(stream, records).await?;
        outcome.records += records.len();
        self.stats.add_records(records.len());
        Ok(())
    }

    /// Save a bookmark, then announce it downstream
    async fn checkpoint(&self, stream: &str, bookmark: &Bookmark) -> Result<()> {
        self.store.save(stream, bookmark).await?;
        self.sink.write_state(stream, bookmark).await
    }
}
