//! Page fetcher
//!
//! Turns a page token into a request, runs it through the retry policy and
//! decodes the response.

use super::types::Page;
use crate::catalog::StreamDescriptor;
use crate::decode::{DecoderConfig, JsonDecoder, RecordDecoder};
use crate::error::Result;
use crate::http::{RetryPolicy, Transport};
use crate::output::{IdentityTransform, RecordTransform};
use crate::pagination::PageToken;
use crate::query::{child_query, page_query, ODataQuery};
use crate::types::timestamp_field;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::debug;

/// Fetches single pages of a stream
pub struct PageFetcher {
    transport: Arc<dyn Transport>,
    retry: RetryPolicy,
    transform: Arc<dyn RecordTransform>,
}

impl std::fmt::Debug for PageFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageFetcher")
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

impl PageFetcher {
    /// Create a fetcher
    pub fn new(transport: Arc<dyn Transport>, retry: RetryPolicy) -> Self {
        Self {
            transport,
            retry,
            transform: Arc::new(IdentityTransform),
        }
    }

    /// Set the record transform
    #[must_use]
    pub fn with_transform(mut self, transform: Arc<dyn RecordTransform>) -> Self {
        self.transform = transform;
        self
    }

    /// Fetch the page a token points at
    pub async fn fetch_page(
        &self,
        descriptor: &StreamDescriptor,
        token: &PageToken,
        lower_bound: Option<DateTime<Utc>>,
    ) -> Result<Page> {
        self.fetch(descriptor, page_query(descriptor, token, lower_bound))
            .await
    }

    /// Fetch one page of child records for a set of parent keys
    pub async fn fetch_children(
        &self,
        descriptor: &StreamDescriptor,
        parent_keys: &[String],
        skip: u64,
    ) -> Result<Page> {
        self.fetch(descriptor, child_query(descriptor, parent_keys, skip))
            .await
    }

    async fn fetch(&self, descriptor: &StreamDescriptor, query: ODataQuery) -> Result<Page> {
        let params = query.into_params();
        debug!(stream = %descriptor.name, ?params, "Fetching page");

        let response = self
            .retry
            .get(self.transport.as_ref(), &descriptor.path, &params)
            .await?;

        let decoder = JsonDecoder::with_config(DecoderConfig::new(
            descriptor.records_path.clone(),
            descriptor.continuation_key.clone(),
        ));
        let decoded = decoder.decode(&response.body)?;

        let fetched = decoded.records.len();
        let max_replication_value = descriptor.replication_key.as_deref().and_then(|rk| {
            decoded
                .records
                .iter()
                .filter_map(|r| timestamp_field(r, rk))
                .max()
        });

        let records = decoded
            .records
            .into_iter()
            .filter_map(|r| self.transform.transform(&descriptor.name, r))
            .collect();

        Ok(Page {
            records,
            has_more: decoded.has_more,
            fetched,
            max_replication_value,
        })
    }
}
