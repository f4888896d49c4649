//! Retry policy around transport calls
//!
//! Classifies HTTP outcomes and decides whether to try again:
//! - `2xx` is a success
//! - `5xx` and any configured extra status (e.g. `429`) are retriable
//! - everything else is fatal and surfaced on the first attempt
//!
//! The policy keeps no memory between calls: every request starts with a
//! fresh attempt counter.

use super::client::{Transport, TransportResponse};
use crate::error::{Error, Result};
use crate::types::{BackoffType, QueryParams};
use std::collections::BTreeSet;
use std::time::Duration;
use tracing::warn;

/// Longest response body kept in an error message
const MAX_ERROR_BODY: usize = 512;

/// Outcome class of an HTTP status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusClass {
    /// `[200, 300)`
    Success,
    /// Server error or configured transient status
    Retriable,
    /// Client error or any other unexpected status
    Fatal,
}

/// Retry and backoff settings for page requests
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts per request, including the first one
    pub max_attempts: u32,
    /// Growth of the delay between attempts
    pub backoff_type: BackoffType,
    /// Delay unit; the first retry waits this long
    pub backoff_factor: Duration,
    /// Upper bound for a single delay
    pub max_backoff: Duration,
    /// Statuses below 500 that are still transient
    pub extra_retry_statuses: BTreeSet<u16>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 8,
            backoff_type: BackoffType::Exponential,
            backoff_factor: Duration::from_secs(5),
            max_backoff: Duration::from_secs(300),
            extra_retry_statuses: BTreeSet::from([429]),
        }
    }
}

impl RetryPolicy {
    /// Create a policy with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the attempt cap
    #[must_use]
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    /// Set backoff shape and bounds
    #[must_use]
    pub fn with_backoff(mut self, backoff_type: BackoffType, factor: Duration, max: Duration) -> Self {
        self.backoff_type = backoff_type;
        self.backoff_factor = factor;
        self.max_backoff = max;
        self
    }

    /// Replace the set of extra retriable statuses
    #[must_use]
    pub fn with_extra_retry_statuses(mut self, statuses: impl IntoIterator<Item = u16>) -> Self {
        self.extra_retry_statuses = statuses.into_iter().collect();
        self
    }

    /// Classify an HTTP status
    pub fn classify(&self, status: u16) -> StatusClass {
        if status >= 500 || self.extra_retry_statuses.contains(&status) {
            StatusClass::Retriable
        } else if (200..300).contains(&status) {
            StatusClass::Success
        } else {
            StatusClass::Fatal
        }
    }

    /// Delay before the retry that follows failed attempt `attempt` (1-based)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let attempt = attempt.max(1);
        let delay = match self.backoff_type {
            BackoffType::Constant => self.backoff_factor,
            BackoffType::Linear => self.backoff_factor.saturating_mul(attempt),
            BackoffType::Exponential => {
                let factor = 2u32.saturating_pow(attempt - 1);
                self.backoff_factor.saturating_mul(factor)
            }
        };

        std::cmp::min(delay, self.max_backoff)
    }

    /// Issue a GET through `transport`, retrying per this policy
    pub async fn get(
        &self,
        transport: &dyn Transport,
        path: &str,
        query: &QueryParams,
    ) -> Result<TransportResponse> {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;

            let error = match transport.get(path, query).await {
                Ok(response) => match self.classify(response.status) {
                    StatusClass::Success => return Ok(response),
                    StatusClass::Fatal => {
                        return Err(Error::fatal_status(
                            response.status,
                            truncate_body(&response.body),
                        ))
                    }
                    StatusClass::Retriable => {
                        Error::retriable_status(response.status, truncate_body(&response.body))
                    }
                },
                Err(e) if e.is_retryable() => e,
                Err(e) => return Err(e),
            };

            if attempt >= max_attempts {
                return Err(Error::ExhaustedRetries {
                    attempts: attempt,
                    last: Box::new(error),
                });
            }

            let delay = self.delay_for(attempt);
            warn!(
                path,
                attempt,
                max_attempts,
                status = error.status(),
                "Request failed ({error}), retrying in {delay:?}"
            );
            tokio::time::sleep(delay).await;
        }
    }
}

fn truncate_body(body: &str) -> String {
    match body.char_indices().nth(MAX_ERROR_BODY) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}
