//! Tap configuration
//!
//! The user-supplied JSON config: credentials, start date, stream selection
//! and tuning for the HTTP client, retry policy and child batches.

use crate::engine::SyncConfig;
use crate::error::{Error, Result, ResultExt};
use crate::http::{HttpClientConfig, RateLimiterConfig, RetryPolicy};
use crate::types::{parse_timestamp, BackoffType};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

// ============================================================================
// Top-Level Config
// ============================================================================

/// Complete tap configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TapConfig {
    /// Restaurant365 user name
    #[serde(default)]
    pub username: String,

    /// Restaurant365 password
    #[serde(default)]
    pub password: String,

    /// Store (tenant) name, prefixed to the user name for Basic auth
    #[serde(default)]
    pub store_name: String,

    /// Lower bound for streams without a bookmark
    #[serde(default)]
    pub start_date: Option<String>,

    /// Custom User-Agent header
    #[serde(default)]
    pub user_agent: Option<String>,

    /// Override for the catalog base URL
    #[serde(default)]
    pub base_url: Option<String>,

    /// Streams to sync; all top-level streams when absent
    #[serde(default)]
    pub streams: Option<Vec<String>>,

    /// HTTP client settings
    #[serde(default)]
    pub http: HttpSettings,

    /// Retry settings
    #[serde(default)]
    pub retry: RetrySettings,

    /// Child batch settings
    #[serde(default)]
    pub batch: BatchSettings,
}

impl TapConfig {
    /// Load and validate a config file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        Self::from_json(&contents)
    }

    /// Parse and validate an inline JSON config
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Check required fields and value ranges
    pub fn validate(&self) -> Result<()> {
        for (field, value) in [
            ("username", &self.username),
            ("password", &self.password),
            ("store_name", &self.store_name),
        ] {
            if value.trim().is_empty() {
                return Err(Error::missing_field(field));
            }
        }

        self.start_date()?;

        if self.http.timeout_secs == 0 {
            return Err(Error::invalid_value("http.timeout_secs", "must be positive"));
        }
        if self.retry.max_attempts == 0 {
            return Err(Error::invalid_value("retry.max_attempts", "must be positive"));
        }
        if self.batch.batch_size == 0 {
            return Err(Error::invalid_value("batch.batch_size", "must be positive"));
        }
        if self.batch.concurrency == 0 {
            return Err(Error::invalid_value("batch.concurrency", "must be positive"));
        }
        Ok(())
    }

    /// Parsed start date
    pub fn start_date(&self) -> Result<Option<DateTime<Utc>>> {
        match self.start_date.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(raw) => parse_timestamp(raw).map(Some).ok_or_else(|| {
                Error::invalid_value("start_date", format!("'{raw}' is not a timestamp"))
            }),
        }
    }

    /// Basic auth user name, `store\user`
    pub fn auth_username(&self) -> String {
        format!("{}\\{}", self.store_name, self.username)
    }

    /// HTTP client settings for a catalog base URL
    pub fn http_client_config(&self, catalog_base_url: &str) -> HttpClientConfig {
        let mut builder = HttpClientConfig::builder()
            .base_url(self.base_url.as_deref().unwrap_or(catalog_base_url))
            .timeout(Duration::from_secs(self.http.timeout_secs))
            .basic_auth(self.auth_username(), self.password.clone());

        builder = match RateLimiterConfig::per_second(self.http.requests_per_second) {
            Some(limit) => builder.rate_limit(limit),
            None => builder.no_rate_limit(),
        };

        if let Some(agent) = &self.user_agent {
            builder = builder.user_agent(agent.clone());
        }
        builder.build()
    }

    /// Retry policy for page requests
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new()
            .with_max_attempts(self.retry.max_attempts)
            .with_backoff(
                self.retry.backoff_type,
                Duration::from_millis(self.retry.backoff_factor_ms),
                Duration::from_millis(self.retry.max_backoff_ms),
            )
            .with_extra_retry_statuses(self.retry.extra_retry_statuses.iter().copied())
    }

    /// Engine settings
    pub fn sync_config(&self) -> Result<SyncConfig> {
        let mut config = SyncConfig::new()
            .with_batch_size(self.batch.batch_size)
            .with_concurrency(self.batch.concurrency);
        if let Some(start) = self.start_date()? {
            config = config.with_start_date(start);
        }
        Ok(config)
    }
}

// ============================================================================
// Sections
// ============================================================================

/// HTTP client settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpSettings {
    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Client-side request rate; 0 disables the limiter
    #[serde(default = "default_rps")]
    pub requests_per_second: u32,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout(),
            requests_per_second: default_rps(),
        }
    }
}

fn default_timeout() -> u64 {
    30
}

fn default_rps() -> u32 {
    10
}

/// Retry settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrySettings {
    /// Attempts per request, including the first
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Type of backoff
    #[serde(default)]
    pub backoff_type: BackoffType,

    /// First retry delay in milliseconds
    #[serde(default = "default_backoff_factor_ms")]
    pub backoff_factor_ms: u64,

    /// Maximum delay in milliseconds
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,

    /// Statuses below 500 to retry
    #[serde(default = "default_extra_retry_statuses")]
    pub extra_retry_statuses: Vec<u16>,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            backoff_type: BackoffType::default(),
            backoff_factor_ms: default_backoff_factor_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            extra_retry_statuses: default_extra_retry_statuses(),
        }
    }
}

fn default_max_attempts() -> u32 {
    8
}

fn default_backoff_factor_ms() -> u64 {
    5000
}

fn default_max_backoff_ms() -> u64 {
    300_000
}

fn default_extra_retry_statuses() -> Vec<u16> {
    vec![429]
}

/// Child batch settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchSettings {
    /// Parent keys per child request sequence
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Concurrent child batch workers
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

impl Default for BatchSettings {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            concurrency: default_concurrency(),
        }
    }
}

fn default_batch_size() -> usize {
    crate::partition::DEFAULT_BATCH_SIZE
}

fn default_concurrency() -> usize {
    crate::partition::DEFAULT_CONCURRENCY
}
