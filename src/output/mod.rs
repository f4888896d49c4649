//! Output module
//!
//! Handles record emission and schema projection.
//!
//! # Overview
//!
//! This module provides:
//! - `RecordSink` - Ordered record and checkpoint destination with flush
//! - `JsonLinesSink` - RECORD / STATE messages on any writer
//! - `MemorySink` - In-memory sink for embedding and tests
//! - `RecordTransform` - Per-record hook applied before emission

mod sink;
mod transform;

pub use sink::{JsonLinesSink, LineFormat, MemorySink, RecordSink, SinkEvent};
pub use transform::{IdentityTransform, RecordTransform, SchemaProjection};
