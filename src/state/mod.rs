//! State management module
//!
//! Handles bookmark tracking and resumability. Bookmarks are persisted
//! between sync runs to enable incremental syncs.
//!
//! # Overview
//!
//! The state module provides:
//! - `Bookmark` - Per-stream resume state with progress markers
//! - `BookmarkStore` - Load/save seam used by the engine
//! - `StateManager` - File-based state persistence

mod manager;
mod types;

pub use manager::{BookmarkStore, StateManager};
pub use types::{Bookmark, PartitionState, ProgressMarkers, State};
