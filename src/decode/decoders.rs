//! Decoder implementations

use super::types::{DecodedPage, DecoderConfig, RecordDecoder};
use crate::error::{Error, Result};
use crate::types::JsonObject;
use serde_json::Value;

// ============================================================================
// JSON Decoder
// ============================================================================

/// JSON decoder for OData collection responses
#[derive(Debug, Clone, Default)]
pub struct JsonDecoder {
    config: DecoderConfig,
}

impl JsonDecoder {
    /// Create a decoder with the default OData layout
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a decoder from a config
    pub fn with_config(config: DecoderConfig) -> Self {
        Self { config }
    }

    /// Decoder config
    pub fn config(&self) -> &DecoderConfig {
        &self.config
    }

    fn extract_records(&self, value: &Value) -> Result<Vec<Value>> {
        let path = self.config.records_path.as_str();
        if is_simple_path(path) {
            return match extract_simple_path(value, path) {
                Some(Value::Array(arr)) => Ok(arr.clone()),
                Some(Value::Null) | None => Err(Error::malformed(format!(
                    "records path '{path}' not found in response"
                ))),
                Some(other) => Ok(vec![other.clone()]),
            };
        }
        extract_with_jsonpath(value, path)
    }
}

impl RecordDecoder for JsonDecoder {
    fn decode(&self, body: &str) -> Result<DecodedPage> {
        let value: Value = serde_json::from_str(body)
            .map_err(|e| Error::malformed(format!("Failed to parse JSON: {e}")))?;

        let records = self
            .extract_records(&value)?
            .into_iter()
            .enumerate()
            .map(|(i, record)| match record {
                Value::Object(map) => Ok(map),
                other => Err(Error::malformed(format!(
                    "record {i} is not an object: {other}"
                ))),
            })
            .collect::<Result<Vec<JsonObject>>>()?;

        Ok(DecodedPage {
            records,
            has_more: value
                .get(&self.config.continuation_key)
                .is_some_and(|m| !m.is_null()),
        })
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// `$.a.b` or `$.a.b[*]`: plain keys with an optional trailing wildcard
fn is_simple_path(path: &str) -> bool {
    let body = path.strip_prefix("$.").unwrap_or(path);
    let body = body.strip_suffix("[*]").unwrap_or(body);
    !body.is_empty()
        && body
            .split('.')
            .all(|part| !part.is_empty() && !part.contains(['[', ']', '*', '?', '@']))
}

/// Extract a value using simple dot-notation path
fn extract_simple_path<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    let path = path.strip_prefix("$.").unwrap_or(path);
    let path = path.strip_suffix("[*]").unwrap_or(path);

    path.split('.').try_fold(value, |current, part| current.get(part))
}

/// Extract records using jsonpath-rust
fn extract_with_jsonpath(value: &Value, path: &str) -> Result<Vec<Value>> {
    use jsonpath_rust::JsonPath;

    let jp = JsonPath::try_from(path)
        .map_err(|e| Error::json_path(format!("Invalid JSONPath '{path}': {e}")))?;

    match jp.find(value) {
        Value::Array(arr) => Ok(arr),
        Value::Null => Ok(vec![]),
        other => Ok(vec![other]),
    }
}
