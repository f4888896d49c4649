//! Common types used throughout the tap
//!
//! This module contains shared type definitions, type aliases,
//! and timestamp helpers used across multiple modules.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// Type Aliases
// ============================================================================

/// JSON value type (re-exported from serde_json)
pub type JsonValue = serde_json::Value;

/// JSON object type
pub type JsonObject = serde_json::Map<String, JsonValue>;

/// Ordered query parameters sent with a request
pub type QueryParams = Vec<(String, String)>;

// ============================================================================
// Backoff Type
// ============================================================================

/// Type of backoff for retries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffType {
    /// Constant delay between retries
    Constant,
    /// Linear increase in delay
    Linear,
    /// Exponential increase in delay
    #[default]
    Exponential,
}

// ============================================================================
// Timestamps
// ============================================================================

/// Timestamp layout used in `$filter` expressions
pub const FILTER_TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Render a timestamp the way the OData filter grammar expects it
pub fn format_filter_timestamp(ts: &DateTime<Utc>) -> String {
    ts.format(FILTER_TIMESTAMP_FORMAT).to_string()
}

/// Parse a timestamp as returned by the API or written in config.
///
/// Accepts RFC 3339, naive `YYYY-MM-DDTHH:MM:SS[.fff]` (taken as UTC),
/// and bare dates.
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Read a timestamp field from a JSON record
pub fn timestamp_field(record: &JsonObject, field: &str) -> Option<DateTime<Utc>> {
    record.get(field)?.as_str().and_then(parse_timestamp)
}

/// Render a key field of a record as a plain string
pub fn key_field(record: &JsonObject, field: &str) -> Option<String> {
    match record.get(field)? {
        JsonValue::String(s) => Some(s.clone()),
        JsonValue::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
