//! Engine types
//!
//! Configuration, statistics and per-run reports for the sync engine.

use crate::partition::{BatchJob, DEFAULT_BATCH_SIZE, DEFAULT_CONCURRENCY};
use crate::state::Bookmark;
use crate::types::JsonObject;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// One page of records
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    /// Records to emit, in server order
    pub records: Vec<JsonObject>,
    /// A continuation marker was present
    pub has_more: bool,
    /// Records in the response before transforms ran
    pub fetched: usize,
    /// Highest replication value in the response
    pub max_replication_value: Option<DateTime<Utc>>,
}

/// Configuration for sync operation
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Lower bound used when a stream has no bookmark
    pub start_date: Option<DateTime<Utc>>,
    /// Parent keys per child batch
    pub batch_size: usize,
    /// Concurrent child batch workers
    pub concurrency: usize,
    /// Fixed "now" for window computation; the wall clock when unset
    pub today: Option<DateTime<Utc>>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            start_date: None,
            batch_size: DEFAULT_BATCH_SIZE,
            concurrency: DEFAULT_CONCURRENCY,
            today: None,
        }
    }
}

impl SyncConfig {
    /// Create a new sync config
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the start date
    #[must_use]
    pub fn with_start_date(mut self, start_date: DateTime<Utc>) -> Self {
        self.start_date = Some(start_date);
        self
    }

    /// Set child batch size
    #[must_use]
    pub fn with_batch_size(mut self, size: usize) -> Self {
        self.batch_size = size;
        self
    }

    /// Set child worker count
    #[must_use]
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// Pin the current time
    #[must_use]
    pub fn with_today(mut self, today: DateTime<Utc>) -> Self {
        self.today = Some(today);
        self
    }
}

/// Statistics from a sync operation
#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncStats {
    /// Total records synced
    pub records_synced: usize,
    /// Total pages fetched
    pub pages_fetched: usize,
    /// Total streams synced
    pub streams_synced: usize,
    /// Total child batches run
    pub batches_run: usize,
    /// Child batches that failed and were skipped
    pub batches_failed: usize,
    /// Errors encountered
    pub errors: usize,
    /// Duration in milliseconds
    pub duration_ms: u64,
}

impl SyncStats {
    /// Create new stats
    pub fn new() -> Self {
        Self::default()
    }

    /// Add records
    pub fn add_records(&mut self, count: usize) {
        self.records_synced += count;
    }

    /// Add a page
    pub fn add_page(&mut self) {
        self.pages_fetched += 1;
    }

    /// Add a stream
    pub fn add_stream(&mut self) {
        self.streams_synced += 1;
    }

    /// Add child batches
    pub fn add_batches(&mut self, count: usize) {
        self.batches_run += count;
    }

    /// Add failed child batches
    pub fn add_failed_batches(&mut self, count: usize) {
        self.batches_failed += count;
    }

    /// Add an error
    pub fn add_error(&mut self) {
        self.errors += 1;
    }

    /// Set duration
    pub fn set_duration(&mut self, ms: u64) {
        self.duration_ms = ms;
    }
}

/// How a stream's sync ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StreamStatus {
    /// Caught up; bookmark finalized
    Completed,
    /// Failed after saving at least one checkpoint; resumable
    Partial,
    /// Failed before any checkpoint
    Failed,
}

/// Result of syncing one stream
#[derive(Debug, Clone, Serialize)]
pub struct StreamOutcome {
    /// Stream name
    pub stream: String,
    /// Final status
    pub status: StreamStatus,
    /// Records emitted for this stream
    pub records: usize,
    /// Records emitted for its child stream
    pub child_records: usize,
    /// Pages fetched
    pub pages: usize,
    /// Bookmark checkpoints saved
    pub checkpoints: usize,
    /// Child batches that failed and were skipped
    pub dropped_batches: Vec<BatchJob>,
    /// Last saved bookmark
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bookmark: Option<Bookmark>,
    /// Fatal error, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Duration in milliseconds
    pub duration_ms: u64,
}

impl StreamOutcome {
    /// Create an outcome for a stream about to sync
    pub fn new(stream: impl Into<String>) -> Self {
        Self {
            stream: stream.into(),
            status: StreamStatus::Completed,
            records: 0,
            child_records: 0,
            pages: 0,
            checkpoints: 0,
            dropped_batches: Vec::new(),
            bookmark: None,
            error: None,
            duration_ms: 0,
        }
    }

    /// Mark the stream as failed with an error
    pub fn fail(&mut self, error: &crate::error::Error) {
        self.status = if self.checkpoints > 0 {
            StreamStatus::Partial
        } else {
            StreamStatus::Failed
        };
        self.error = Some(error.to_string());
    }
}

/// Result of a whole run
#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncReport {
    /// Per-stream outcomes in sync order
    pub streams: Vec<StreamOutcome>,
    /// Totals
    pub stats: SyncStats,
}

impl SyncReport {
    /// Outcome of one stream
    pub fn stream(&self, name: &str) -> Option<&StreamOutcome> {
        self.streams.iter().find(|s| s.stream == name)
    }

    /// Whether every stream completed
    pub fn is_success(&self) -> bool {
        self.streams
            .iter()
            .all(|s| s.status == StreamStatus::Completed)
    }

    /// Overall status label
    pub fn status(&self) -> &'static str {
        let failed = self
            .streams
            .iter()
            .filter(|s| s.status != StreamStatus::Completed)
            .count();
        if failed == 0 {
            "SUCCEEDED"
        } else if failed == self.streams.len() {
            "FAILED"
        } else {
            "PARTIAL"
        }
    }
}
