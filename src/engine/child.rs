//! Child stream fetches
//!
//! A child request sequence is filtered by a member list of parent keys and
//! paged with `$skip` until the continuation marker disappears.

use super::fetcher::PageFetcher;
use crate::catalog::StreamDescriptor;
use crate::error::Result;
use crate::output::RecordSink;
use crate::pagination::{CursorInput, CursorStep, PageToken, WindowCursor};
use crate::partition::{BatchHandler, BatchJob};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use tracing::debug;

/// Fetch and emit every child record of `parent_keys`.
///
/// Pages are held until the sequence completes, so a failed sequence
/// emits nothing.
pub(crate) async fn sync_children(
    fetcher: &PageFetcher,
    sink: &dyn RecordSink,
    descriptor: &StreamDescriptor,
    parent_keys: &[String],
) -> Result<usize> {
    let cursor = WindowCursor::for_stream(descriptor);
    let today = Utc::now();
    let mut prior: Option<PageToken> = None;
    let mut has_more = false;
    let mut records = Vec::new();

    loop {
        let token = match cursor.next_token(CursorInput {
            prior: prior.as_ref(),
            has_more,
            resume_point: None,
            today,
        })? {
            CursorStep::Next(token) => token,
            CursorStep::Stop => break,
        };

        let page = fetcher
            .fetch_children(descriptor, parent_keys, token.skip())
            .await?;
        records.extend(page.records);

        has_more = page.has_more;
        prior = Some(token);
    }

    if !records.is_empty() {
        sink.write_records(&descriptor.name, &records).await?;
    }
    debug!(
        stream = %descriptor.name,
        parents = parent_keys.len(),
        records = records.len(),
        "Child fetch complete"
    );
    Ok(records.len())
}

/// Batch handler that runs a child fetch per batch
pub(crate) struct ChildBatchFetcher {
    pub(crate) fetcher: Arc<PageFetcher>,
    pub(crate) sink: Arc<dyn RecordSink>,
    pub(crate) descriptor: StreamDescriptor,
}

#[async_trait]
impl BatchHandler for ChildBatchFetcher {
    async fn run(&self, job: &BatchJob) -> Result<usize> {
        sync_children(
            &self.fetcher,
            self.sink.as_ref(),
            &self.descriptor,
            &job.parent_keys,
        )
        .await
    }
}
