//! Pagination types
//!
//! Defines the pagination modes a stream can declare and the explicit token
//! threaded between successive page requests.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Page size used by the upstream API, also the `$skip` increment
pub const DEFAULT_PAGE_SIZE: u64 = 5000;

/// How a stream walks through its records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaginationMode {
    /// A single request returns everything
    #[default]
    None,
    /// Bare `$skip` offset while a continuation marker is present
    SkipOnly,
    /// Consecutive time windows, one request each
    TimeWindowed,
    /// Consecutive time windows, each paged with `$skip`
    TimeWindowedWithSkip,
}

impl PaginationMode {
    /// Whether the mode walks time windows
    pub fn is_windowed(self) -> bool {
        matches!(self, Self::TimeWindowed | Self::TimeWindowedWithSkip)
    }

    /// Whether continuation markers are followed with `$skip`
    pub fn follows_continuation(self) -> bool {
        matches!(self, Self::SkipOnly | Self::TimeWindowedWithSkip)
    }
}

/// Position of the next page request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PageToken {
    /// One page of a time window
    Window {
        /// Inclusive lower bound of the window
        window_start: DateTime<Utc>,
        /// Records to skip within the window
        skip: u64,
        /// The window reaches the present; no window follows it
        final_window: bool,
    },
    /// A bare `$skip` offset
    Offset(u64),
    /// The only request of an unpaginated stream
    Single,
}

impl PageToken {
    /// First page of a window
    pub fn window(window_start: DateTime<Utc>, final_window: bool) -> Self {
        Self::Window {
            window_start,
            skip: 0,
            final_window,
        }
    }

    /// `$skip` value to send, if any
    pub fn skip(&self) -> u64 {
        match self {
            Self::Window { skip, .. } | Self::Offset(skip) => *skip,
            Self::Single => 0,
        }
    }

    /// Window start, for windowed tokens
    pub fn window_start(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Window { window_start, .. } => Some(*window_start),
            _ => None,
        }
    }
}

/// Outcome of asking the cursor for the next page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorStep {
    /// Fetch this page next
    Next(PageToken),
    /// The stream is caught up
    Stop,
}

impl CursorStep {
    /// Check if this is a stop result
    pub fn is_stop(&self) -> bool {
        matches!(self, Self::Stop)
    }

    /// The token to fetch, if any
    pub fn token(self) -> Option<PageToken> {
        match self {
            Self::Next(token) => Some(token),
            Self::Stop => None,
        }
    }
}

/// Everything the cursor needs to compute the next token
#[derive(Debug, Clone, Copy)]
pub struct CursorInput<'a> {
    /// Token of the page just processed, `None` before the first page
    pub prior: Option<&'a PageToken>,
    /// The page just processed carried a continuation marker
    pub has_more: bool,
    /// Last emitted replication value, or the run's starting value
    pub resume_point: Option<DateTime<Utc>>,
    /// Upper limit; windows starting after it are never requested
    pub today: DateTime<Utc>,
}
