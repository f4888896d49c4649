//! HTTP module
//!
//! Provides the transport seam and the retry policy wrapped around it.
//!
//! # Features
//!
//! - **Transport**: one authenticated GET per call, status passed through
//! - **Retry Policy**: status classification with exponential backoff
//! - **Rate Limiting**: Token bucket rate limiter using governor

mod client;
mod rate_limit;
mod retry;

pub use client::{
    BasicAuth, HttpClient, HttpClientConfig, HttpClientConfigBuilder, Transport, TransportResponse,
};
pub use rate_limit::{RateLimiter, RateLimiterConfig};
pub use retry::{RetryPolicy, StatusClass};
