//! Tests for the child fan-out module

use super::*;
use crate::error::{Error, Result};
use async_trait::async_trait;
use pretty_assertions::assert_eq;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// Records every batch and fails those containing a poisoned key
#[derive(Default)]
struct RecordingHandler {
    batches: Mutex<Vec<Vec<String>>>,
    poison: Option<String>,
    running: AtomicUsize,
    peak: AtomicUsize,
}

impl RecordingHandler {
    fn poisoned(key: &str) -> Self {
        Self {
            poison: Some(key.to_string()),
            ..Default::default()
        }
    }
}

#[async_trait]
impl BatchHandler for RecordingHandler {
    async fn run(&self, job: &BatchJob) -> Result<usize> {
        let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(10)).await;
        self.running.fetch_sub(1, Ordering::SeqCst);

        self.batches.lock().await.push(job.parent_keys.clone());
        if let Some(poison) = &self.poison {
            if job.parent_keys.contains(poison) {
                return Err(Error::fatal_status(500, "boom"));
            }
        }
        Ok(job.parent_keys.len() * 2)
    }
}

fn keys(n: usize) -> Vec<String> {
    (0..n).map(|i| format!("T{i}")).collect()
}

// ============================================================================
// Batching Tests
// ============================================================================

#[tokio::test]
async fn test_batches_of_ten_with_partial_tail() {
    let handler = Arc::new(RecordingHandler::default());
    let mut dispatcher = BatchDispatcher::new("detail", handler.clone(), 10, 2);

    for key in keys(25) {
        dispatcher.push(key).await.unwrap();
    }
    let report = dispatcher.drain().await.unwrap();

    let sizes: Vec<usize> = report.jobs.iter().map(|j| j.parent_keys.len()).collect();
    assert_eq!(sizes, vec![10, 10, 5]);
    assert_eq!(report.failed_count(), 0);
    assert_eq!(report.child_records(), 50);

    // Every key lands in exactly one batch.
    let mut seen: Vec<String> = handler.batches.lock().await.concat();
    seen.sort();
    let mut expected = keys(25);
    expected.sort();
    assert_eq!(seen, expected);
}

#[tokio::test]
async fn test_jobs_reported_in_submission_order() {
    let handler = Arc::new(RecordingHandler::default());
    let mut dispatcher = BatchDispatcher::new("detail", handler, 3, 2);
    for key in keys(7) {
        dispatcher.push(key).await.unwrap();
    }

    let report = dispatcher.drain().await.unwrap();
    let ids: Vec<usize> = report.jobs.iter().map(|j| j.id).collect();
    assert_eq!(ids, vec![0, 1, 2]);
    assert_eq!(report.jobs[0].parent_keys, vec!["T0", "T1", "T2"]);
    assert_eq!(report.jobs[2].parent_keys, vec!["T6"]);
}

#[tokio::test]
async fn test_exact_multiple_has_no_empty_tail() {
    let handler = Arc::new(RecordingHandler::default());
    let mut dispatcher = BatchDispatcher::new("detail", handler, 5, 2);
    for key in keys(10) {
        dispatcher.push(key).await.unwrap();
    }

    let report = dispatcher.drain().await.unwrap();
    assert_eq!(report.jobs.len(), 2);
}

#[tokio::test]
async fn test_no_keys_no_batches() {
    let handler = Arc::new(RecordingHandler::default());
    let mut dispatcher = BatchDispatcher::new("detail", handler.clone(), 10, 2);

    let report = dispatcher.drain().await.unwrap();
    assert!(report.jobs.is_empty());
    assert!(handler.batches.lock().await.is_empty());
}

#[tokio::test]
async fn test_drain_reports_only_new_batches() {
    let handler = Arc::new(RecordingHandler::default());
    let mut dispatcher = BatchDispatcher::new("detail", handler.clone(), 2, 2);

    for key in ["A", "B", "C"] {
        dispatcher.push(key).await.unwrap();
    }
    let first = dispatcher.drain().await.unwrap();
    assert_eq!(first.jobs.len(), 2);
    assert_eq!(first.jobs[1].parent_keys, vec!["C"]);

    dispatcher.push("D").await.unwrap();
    let second = dispatcher.drain().await.unwrap();
    assert_eq!(second.jobs.len(), 1);
    assert_eq!(second.jobs[0].id, 2);
    assert_eq!(second.jobs[0].parent_keys, vec!["D"]);

    assert!(dispatcher.drain().await.unwrap().jobs.is_empty());
    assert_eq!(handler.batches.lock().await.len(), 3);
}

// ============================================================================
// Failure and Concurrency Tests
// ============================================================================

#[tokio::test]
async fn test_failed_batch_is_reported_not_raised() {
    let handler = Arc::new(RecordingHandler::poisoned("T12"));
    let mut dispatcher = BatchDispatcher::new("detail", handler, 10, 2);
    for key in keys(25) {
        dispatcher.push(key).await.unwrap();
    }

    let report = dispatcher.drain().await.unwrap();

    assert_eq!(report.failed_count(), 1);
    let failed = report.failed().next().unwrap();
    assert_eq!(failed.id, 1);
    assert!(failed.parent_keys.contains(&"T12".to_string()));
    assert!(matches!(&failed.status, BatchStatus::Failed { error } if error.contains("500")));
    assert_eq!(report.child_records(), 30);
}

#[tokio::test]
async fn test_worker_pool_is_bounded() {
    let handler = Arc::new(RecordingHandler::default());
    let mut dispatcher = BatchDispatcher::new("detail", handler.clone(), 1, 2);
    for key in keys(8) {
        dispatcher.push(key).await.unwrap();
    }
    dispatcher.drain().await.unwrap();

    assert!(handler.peak.load(Ordering::SeqCst) <= 2);
    assert_eq!(handler.batches.lock().await.len(), 8);
}

#[test]
fn test_batch_job_serializes_flat_status() {
    let mut job = BatchJob::new(3, vec!["A".to_string()]);
    job.status = BatchStatus::Failed {
        error: "x".to_string(),
    };
    let value = serde_json::to_value(&job).unwrap();
    assert_eq!(value["id"], 3);
    assert_eq!(value["status"], "failed");
    assert_eq!(value["error"], "x");
}
