//! Decoder types and traits
//!
//! Defines the core decoder abstractions.

use crate::error::Result;
use crate::types::JsonObject;

/// Records and paging signal extracted from one response body
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DecodedPage {
    /// Records in server order
    pub records: Vec<JsonObject>,
    /// A continuation marker was present
    pub has_more: bool,
}

/// Configuration for decoding responses
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecoderConfig {
    /// JSONPath to extract records from the response
    pub records_path: String,
    /// Top-level key whose presence means more pages exist
    pub continuation_key: String,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            records_path: "$.value[*]".to_string(),
            continuation_key: "@odata.nextLink".to_string(),
        }
    }
}

impl DecoderConfig {
    /// Create a decoder config
    pub fn new(records_path: impl Into<String>, continuation_key: impl Into<String>) -> Self {
        Self {
            records_path: records_path.into(),
            continuation_key: continuation_key.into(),
        }
    }
}

/// Trait for decoding response bodies into records
pub trait RecordDecoder: Send + Sync {
    /// Decode a response body.
    ///
    /// Unparsable bodies, a missing records path and non-object records are
    /// all errors; a record is never silently dropped.
    fn decode(&self, body: &str) -> Result<DecodedPage>;
}
