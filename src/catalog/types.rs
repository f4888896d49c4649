//! Stream descriptor types
//!
//! A [`StreamDescriptor`] is the immutable, fully-resolved definition of one
//! stream. Descriptors are built once from the YAML catalog and never change
//! during a run.

use crate::pagination::PaginationMode;
use serde::{Deserialize, Serialize};
use serde_json::json;

/// How a stream's child streams are synced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchStrategy {
    /// The stream has no children
    #[default]
    None,
    /// One child request per parent record, inline with the parent page
    PerRecord,
    /// Parent keys grouped into batches fetched by a bounded worker pool
    Batched,
}

impl DispatchStrategy {
    /// Whether children are fetched in bulk
    pub fn is_batched(self) -> bool {
        matches!(self, Self::Batched)
    }
}

/// JSON type of a catalog field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    String,
    Integer,
    Number,
    Boolean,
    DateTime,
}

impl FieldType {
    /// JSON Schema fragment for a nullable field of this type
    pub fn json_schema(self) -> serde_json::Value {
        match self {
            Self::String => json!({"type": ["null", "string"]}),
            Self::Integer => json!({"type": ["null", "integer"]}),
            Self::Number => json!({"type": ["null", "number"]}),
            Self::Boolean => json!({"type": ["null", "boolean"]}),
            Self::DateTime => json!({"type": ["null", "string"], "format": "date-time"}),
        }
    }
}

/// One field of a stream schema
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    /// Field name as returned by the API
    pub name: String,
    /// Field type
    #[serde(rename = "type")]
    pub field_type: FieldType,
}

/// Field pair a window is applied to when a stream has no replication key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowFields {
    /// Compared `ge` the window start
    pub lower: String,
    /// Compared `le` the window end
    pub upper: String,
}

/// Link from a child stream to its parent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParentLink {
    /// Parent stream name
    pub stream: String,
    /// Key read from each parent record
    pub parent_key: String,
    /// Child field matched against the parent keys
    pub child_key: String,
}

/// Immutable definition of a stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamDescriptor {
    /// Stream name
    pub name: String,
    /// Request path relative to the base URL
    pub path: String,
    /// Primary key fields
    pub primary_key: Vec<String>,
    /// Replication key field
    pub replication_key: Option<String>,
    /// Window width in days for time-windowed modes
    pub window_days: i64,
    /// Pagination mode
    pub pagination: PaginationMode,
    /// Extra `$filter` clause, e.g. `type eq 'AP Invoice'`
    pub type_filter: Option<String>,
    /// Window bounds applied to a field pair instead of the replication key
    pub window_fields: Option<WindowFields>,
    /// Child sync strategy
    pub children: DispatchStrategy,
    /// Parent link for child streams
    pub parent: Option<ParentLink>,
    /// JSONPath to the records in a response
    pub records_path: String,
    /// Response key signalling more pages in the current window
    pub continuation_key: String,
    /// Records per page, used as the `$skip` increment
    pub page_size: u64,
    /// Schema fields in declaration order
    pub fields: Vec<Field>,
}

impl StreamDescriptor {
    /// Whether this stream is only synced through its parent
    pub fn is_child(&self) -> bool {
        self.parent.is_some()
    }

    /// Window width as a duration
    pub fn window(&self) -> chrono::Duration {
        chrono::Duration::days(self.window_days)
    }

    /// JSON Schema of a record
    pub fn json_schema(&self) -> serde_json::Value {
        let properties: serde_json::Map<String, serde_json::Value> = self
            .fields
            .iter()
            .map(|f| (f.name.clone(), f.field_type.json_schema()))
            .collect();
        json!({
            "type": "object",
            "properties": properties,
            "additionalProperties": self.fields.is_empty()
        })
    }

    /// Primary key used to identify a record for child fan-out
    pub fn key_field(&self) -> Option<&str> {
        self.primary_key.first().map(String::as_str)
    }
}
