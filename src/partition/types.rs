//! Batch types and traits
//!
//! Defines the child fan-out abstractions.

use crate::error::Result;
use async_trait::async_trait;
use serde::Serialize;

/// Lifecycle of one child batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BatchStatus {
    /// Waiting for a worker
    Pending,
    /// Being fetched
    Running,
    /// All child records emitted
    Done {
        /// Child records emitted
        records: usize,
    },
    /// Fetch failed; the batch was skipped
    Failed {
        /// Error description
        error: String,
    },
}

/// A group of parent keys fetched in one child request sequence
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchJob {
    /// Submission order, starting at zero
    pub id: usize,
    /// Parent keys covered by the batch
    pub parent_keys: Vec<String>,
    /// Current status
    #[serde(flatten)]
    pub status: BatchStatus,
}

impl BatchJob {
    /// Create a pending job
    pub fn new(id: usize, parent_keys: Vec<String>) -> Self {
        Self {
            id,
            parent_keys,
            status: BatchStatus::Pending,
        }
    }

    /// Check if the job failed
    pub fn is_failed(&self) -> bool {
        matches!(self.status, BatchStatus::Failed { .. })
    }
}

/// Outcome of one fan-out round
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    /// Jobs in submission order
    pub jobs: Vec<BatchJob>,
}

impl BatchReport {
    /// Jobs that failed
    pub fn failed(&self) -> impl Iterator<Item = &BatchJob> {
        self.jobs.iter().filter(|j| j.is_failed())
    }

    /// Number of failed jobs
    pub fn failed_count(&self) -> usize {
        self.failed().count()
    }

    /// Child records emitted by successful jobs
    pub fn child_records(&self) -> usize {
        self.jobs
            .iter()
            .map(|j| match j.status {
                BatchStatus::Done { records } => records,
                _ => 0,
            })
            .sum()
    }
}

/// Fetches and emits the children of one batch
#[async_trait]
pub trait BatchHandler: Send + Sync {
    /// Run a batch, returning the number of child records emitted
    async fn run(&self, job: &BatchJob) -> Result<usize>;
}
