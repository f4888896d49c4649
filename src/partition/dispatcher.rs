//! Batch dispatcher
//!
//! Groups parent keys into fixed-size batches and runs them on a bounded
//! worker pool. A failed batch is logged and reported; it never fails the
//! parent stream.

use super::types::{BatchHandler, BatchJob, BatchReport, BatchStatus};
use crate::error::{Error, Result};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error};

/// Default parent keys per batch
pub const DEFAULT_BATCH_SIZE: usize = 10;

/// Default number of concurrent batch workers
pub const DEFAULT_CONCURRENCY: usize = 2;

/// Accumulates parent keys and fans them out to child fetches
pub struct BatchDispatcher {
    stream: String,
    handler: Arc<dyn BatchHandler>,
    batch_size: usize,
    semaphore: Arc<Semaphore>,
    pending: Vec<String>,
    next_id: usize,
    in_flight: BTreeMap<usize, BatchJob>,
    tasks: JoinSet<BatchJob>,
}

impl std::fmt::Debug for BatchDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchDispatcher")
            .field("stream", &self.stream)
            .field("batch_size", &self.batch_size)
            .field("pending", &self.pending.len())
            .field("in_flight", &self.in_flight.len())
            .finish_non_exhaustive()
    }
}

impl BatchDispatcher {
    /// Create a dispatcher for a child stream
    pub fn new(
        stream: impl Into<String>,
        handler: Arc<dyn BatchHandler>,
        batch_size: usize,
        concurrency: usize,
    ) -> Self {
        Self {
            stream: stream.into(),
            handler,
            batch_size: batch_size.max(1),
            semaphore: Arc::new(Semaphore::new(concurrency.max(1))),
            pending: Vec::new(),
            next_id: 0,
            in_flight: BTreeMap::new(),
            tasks: JoinSet::new(),
        }
    }

    /// Add a parent key; a full batch is submitted immediately.
    ///
    /// Waits for a free worker when all of them are busy.
    pub async fn push(&mut self, key: impl Into<String>) -> Result<()> {
        self.pending.push(key.into());
        if self.pending.len() >= self.batch_size {
            self.submit().await?;
        }
        Ok(())
    }

    async fn submit(&mut self) -> Result<()> {
        if self.pending.is_empty() {
            return Ok(());
        }

        let permit = Arc::clone(&self.semaphore)
            .acquire_owned()
            .await
            .map_err(|e| Error::Other(format!("Batch worker pool closed: {e}")))?;

        let id = self.next_id;
        self.next_id += 1;
        let keys = std::mem::take(&mut self.pending);
        let job = BatchJob::new(id, keys);
        self.in_flight.insert(id, job.clone());

        debug!(
            stream = %self.stream,
            batch = id,
            keys = job.parent_keys.len(),
            "Submitting child batch"
        );

        let handler = Arc::clone(&self.handler);
        let stream = self.stream.clone();
        self.tasks.spawn(async move {
            let _permit = permit;
            let mut job = job;
            job.status = BatchStatus::Running;
            job.status = match handler.run(&job).await {
                Ok(records) => BatchStatus::Done { records },
                Err(e) => {
                    let err = Error::ChildBatch {
                        stream,
                        batch: job.id,
                        message: e.to_string(),
                    };
                    error!("{err}");
                    BatchStatus::Failed {
                        error: e.to_string(),
                    }
                }
            };
            job
        });
        Ok(())
    }

    /// Submit the partial batch and wait for every batch in flight.
    ///
    /// The report covers the batches submitted since the previous drain.
    /// Batch ids keep counting across drains.
    pub async fn drain(&mut self) -> Result<BatchReport> {
        self.submit().await?;

        while let Some(joined) = self.tasks.join_next().await {
            match joined {
                Ok(job) => {
                    self.in_flight.insert(job.id, job);
                }
                Err(join_err) => {
                    error!(stream = %self.stream, "Child batch worker panicked: {join_err}");
                }
            }
        }

        // A job still pending or running here lost its worker.
        let jobs = std::mem::take(&mut self.in_flight)
            .into_values()
            .map(|mut job| {
                if matches!(job.status, BatchStatus::Pending | BatchStatus::Running) {
                    job.status = BatchStatus::Failed {
                        error: "batch worker terminated".to_string(),
                    };
                }
                job
            })
            .collect();

        Ok(BatchReport { jobs })
    }
}
