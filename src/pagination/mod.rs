//! Pagination module
//!
//! Supports: None, Skip Only, Time Windowed, Time Windowed With Skip
//!
//! # Overview
//!
//! The pagination module decides which page to request next. Time windows
//! advance from the bookmark; within a window, `$skip` advances while the
//! response carries a continuation marker.

mod cursor;
mod types;

pub use cursor::WindowCursor;
pub use types::{CursorInput, CursorStep, PageToken, PaginationMode, DEFAULT_PAGE_SIZE};
