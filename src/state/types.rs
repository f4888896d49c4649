//! Bookmark types for tracking sync progress
//!
//! These types are serialized to JSON and persisted between runs. The layout
//! follows the Singer state format: `{"bookmarks": {"<stream>": {...}}}`.

use crate::types::JsonObject;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Complete state for the tap
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct State {
    /// Per-stream bookmarks
    #[serde(default)]
    pub bookmarks: BTreeMap<String, Bookmark>,
}

impl State {
    /// Create a new empty state
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the bookmark of a stream
    pub fn bookmark(&self, stream: &str) -> Option<&Bookmark> {
        self.bookmarks.get(stream)
    }

    /// Get a mutable bookmark, creating an empty one if needed
    pub fn bookmark_mut(&mut self, stream: &str) -> &mut Bookmark {
        self.bookmarks.entry(stream.to_string()).or_default()
    }
}

/// Resume state of one stream
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Bookmark {
    /// Value the current run started from
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "timestamp_serde"
    )]
    pub starting_replication_value: Option<DateTime<Utc>>,

    /// Name of the replication key field
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replication_key: Option<String>,

    /// Highest value of a completed run
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "timestamp_serde"
    )]
    pub replication_key_value: Option<DateTime<Utc>>,

    /// Last value emitted by the run in progress
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress_markers: Option<ProgressMarkers>,

    /// Per-parent state of child streams, keyed by parent key
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub partitions: BTreeMap<String, PartitionState>,
}

impl Bookmark {
    /// Create a new empty bookmark
    pub fn new() -> Self {
        Self::default()
    }

    /// Fix the run's starting value.
    ///
    /// A saved replication value wins over the configured start date.
    /// Progress markers left by an interrupted run are kept so the next
    /// window resumes where that run stopped.
    pub fn begin_run(&mut self, replication_key: Option<&str>, start_date: Option<DateTime<Utc>>) {
        self.starting_replication_value = self.replication_key_value.or(start_date);
        if let Some(key) = replication_key {
            self.replication_key = Some(key.to_string());
        }
    }

    /// Value the next window is computed from
    pub fn resume_point(&self) -> Option<DateTime<Utc>> {
        self.progress_value().or(self.starting_replication_value)
    }

    /// Last emitted value of the run in progress
    pub fn progress_value(&self) -> Option<DateTime<Utc>> {
        self.progress_markers
            .as_ref()
            .and_then(|p| p.replication_key_value)
    }

    /// Record emitted progress. Never moves backwards.
    pub fn advance(&mut self, value: DateTime<Utc>) {
        let markers = self.progress_markers.get_or_insert_with(Default::default);
        if markers.replication_key_value.is_none_or(|current| value > current) {
            markers.replication_key_value = Some(value);
        }
    }

    /// Fold run progress into the committed value and drop the markers
    pub fn finalize(&mut self) {
        if let Some(progress) = self.progress_value() {
            if self.replication_key_value.is_none_or(|current| progress > current) {
                self.replication_key_value = Some(progress);
            }
        }
        if self.replication_key_value.is_some() {
            self.starting_replication_value = self.replication_key_value;
        }
        self.progress_markers = None;
    }

    /// Copy without per-parent partitions
    pub fn flattened(&self) -> Self {
        Self {
            partitions: BTreeMap::new(),
            ..self.clone()
        }
    }

    /// Get partition state
    pub fn partition(&self, key: &str) -> Option<&PartitionState> {
        self.partitions.get(key)
    }

    /// Get mutable partition state, creating if needed
    pub fn partition_mut(&mut self, key: &str) -> &mut PartitionState {
        self.partitions.entry(key.to_string()).or_default()
    }
}

/// Fine-grained progress within a run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressMarkers {
    /// Highest replication value emitted so far
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "timestamp_serde"
    )]
    pub replication_key_value: Option<DateTime<Utc>>,
}

/// State of one child partition
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PartitionState {
    /// Parent context the partition was synced for
    #[serde(default, skip_serializing_if = "JsonObject::is_empty")]
    pub context: JsonObject,

    /// Whether this partition has been fully synced
    #[serde(default)]
    pub completed: bool,
}

impl PartitionState {
    /// Create a completed partition state
    pub fn completed(context: JsonObject) -> Self {
        Self {
            context,
            completed: true,
        }
    }
}

/// Timestamps are written as RFC 3339 and read leniently, so state files
/// produced by other Singer taps (no offset, fractional seconds) still load.
mod timestamp_serde {
    use crate::types::parse_timestamp;
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(ts) => serializer.serialize_str(&ts.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Option::<String>::deserialize(deserializer)? {
            Some(raw) => parse_timestamp(&raw)
                .map(Some)
                .ok_or_else(|| de::Error::custom(format!("invalid timestamp '{raw}'"))),
            None => Ok(None),
        }
    }
}
