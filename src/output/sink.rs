//! Record sinks
//!
//! A sink receives records and bookmark checkpoints in emission order.
//! `flush` must return only once everything written so far is durable at
//! the destination; the engine saves a bookmark only after a flush.

use crate::error::{Error, Result};
use crate::state::Bookmark;
use crate::types::JsonObject;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::io::Write;
use tokio::sync::Mutex;

/// Destination for extracted records
#[async_trait]
pub trait RecordSink: Send + Sync {
    /// Write records of one stream in order
    async fn write_records(&self, stream: &str, records: &[JsonObject]) -> Result<()>;

    /// Write a bookmark checkpoint
    async fn write_state(&self, stream: &str, bookmark: &Bookmark) -> Result<()>;

    /// Make everything written so far durable
    async fn flush(&self) -> Result<()>;
}

/// Output format for line-oriented messages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LineFormat {
    /// One compact JSON document per line
    #[default]
    Json,
    /// Pretty-printed JSON documents
    Pretty,
}

// ============================================================================
// JSON Lines Sink
// ============================================================================

/// Writes RECORD and STATE messages as JSON lines
pub struct JsonLinesSink {
    writer: Mutex<Box<dyn Write + Send>>,
    format: LineFormat,
}

impl std::fmt::Debug for JsonLinesSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonLinesSink")
            .field("format", &self.format)
            .finish_non_exhaustive()
    }
}

impl JsonLinesSink {
    /// Create a sink over any writer
    pub fn new(writer: impl Write + Send + 'static) -> Self {
        Self {
            writer: Mutex::new(Box::new(writer)),
            format: LineFormat::Json,
        }
    }

    /// Create a sink on standard output
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }

    /// Set the output format
    #[must_use]
    pub fn with_format(mut self, format: LineFormat) -> Self {
        self.format = format;
        self
    }

    /// Write one message
    pub async fn write_message(&self, message: &Value) -> Result<()> {
        let line = match self.format {
            LineFormat::Json => serde_json::to_string(message)?,
            LineFormat::Pretty => serde_json::to_string_pretty(message)?,
        };
        let mut writer = self.writer.lock().await;
        writeln!(writer, "{line}")?;
        Ok(())
    }
}

#[async_trait]
impl RecordSink for JsonLinesSink {
    async fn write_records(&self, stream: &str, records: &[JsonObject]) -> Result<()> {
        let emitted_at = chrono::Utc::now().timestamp_millis();
        for record in records {
            self.write_message(&json!({
                "type": "RECORD",
                "record": {
                    "stream": stream,
                    "data": record,
                    "emitted_at": emitted_at
                }
            }))
            .await?;
        }
        Ok(())
    }

    async fn write_state(&self, stream: &str, bookmark: &Bookmark) -> Result<()> {
        self.write_message(&json!({
            "type": "STATE",
            "state": {
                "type": "STREAM",
                "stream": {
                    "stream_descriptor": { "name": stream },
                    "stream_state": bookmark
                }
            }
        }))
        .await
    }

    async fn flush(&self) -> Result<()> {
        self.writer.lock().await.flush().map_err(Error::from)
    }
}

// ============================================================================
// Memory Sink
// ============================================================================

/// Something a [`MemorySink`] received
#[derive(Debug, Clone, PartialEq)]
pub enum SinkEvent {
    /// One record
    Record {
        /// Stream name
        stream: String,
        /// Record data
        data: JsonObject,
    },
    /// A bookmark checkpoint
    State {
        /// Stream name
        stream: String,
        /// Bookmark at the checkpoint
        bookmark: Bookmark,
    },
    /// A flush call
    Flush,
}

/// Collects everything in memory, in order
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<SinkEvent>>,
}

impl MemorySink {
    /// Create an empty sink
    pub fn new() -> Self {
        Self::default()
    }

    /// All events received so far
    pub async fn events(&self) -> Vec<SinkEvent> {
        self.events.lock().await.clone()
    }

    /// Records received for one stream
    pub async fn records(&self, stream: &str) -> Vec<JsonObject> {
        self.events
            .lock()
            .await
            .iter()
            .filter_map(|e| match e {
                SinkEvent::Record { stream: s, data } if s == stream => Some(data.clone()),
                _ => None,
            })
            .collect()
    }

    /// Number of records received across all streams
    pub async fn record_count(&self) -> usize {
        self.events
            .lock()
            .await
            .iter()
            .filter(|e| matches!(e, SinkEvent::Record { .. }))
            .count()
    }
}

#[async_trait]
impl RecordSink for MemorySink {
    async fn write_records(&self, stream: &str, records: &[JsonObject]) -> Result<()> {
        let mut events = self.events.lock().await;
        events.extend(records.iter().map(|data| SinkEvent::Record {
            stream: stream.to_string(),
            data: data.clone(),
        }));
        Ok(())
    }

    async fn write_state(&self, stream: &str, bookmark: &Bookmark) -> Result<()> {
        self.events.lock().await.push(SinkEvent::State {
            stream: stream.to_string(),
            bookmark: bookmark.clone(),
        });
        Ok(())
    }

    async fn flush(&self) -> Result<()> {
        self.events.lock().await.push(SinkEvent::Flush);
        Ok(())
    }
}
