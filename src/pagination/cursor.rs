//! Window cursor
//!
//! Computes the next page token from the previous one. The cursor holds no
//! mutable state: everything that changes between pages is passed in through
//! [`CursorInput`], so the same cursor can be driven from a test table.

use super::types::{CursorInput, CursorStep, PageToken, PaginationMode};
use crate::catalog::StreamDescriptor;
use crate::error::{Error, Result};
use chrono::{DateTime, Duration, Utc};

/// Immutable paging parameters of one stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowCursor {
    mode: PaginationMode,
    window: Duration,
    page_size: u64,
}

impl WindowCursor {
    /// Create a cursor
    pub fn new(mode: PaginationMode, window: Duration, page_size: u64) -> Self {
        Self {
            mode,
            window,
            page_size,
        }
    }

    /// Cursor for a catalog stream
    pub fn for_stream(descriptor: &StreamDescriptor) -> Self {
        Self::new(
            descriptor.pagination,
            descriptor.window(),
            descriptor.page_size,
        )
    }

    /// Pagination mode
    pub fn mode(&self) -> PaginationMode {
        self.mode
    }

    /// Window width
    pub fn window(&self) -> Duration {
        self.window
    }

    /// Compute the next token, or `Stop` once the stream is caught up.
    ///
    /// A continuation marker always keeps the current window and moves
    /// `$skip` forward. Otherwise the next window starts one second after
    /// the resume point; if that would not move past the previous window
    /// start (an empty window), the previous start plus one window width
    /// is used instead.
    pub fn next_token(&self, input: CursorInput<'_>) -> Result<CursorStep> {
        match self.mode {
            PaginationMode::None => Ok(match input.prior {
                None => CursorStep::Next(PageToken::Single),
                Some(_) => CursorStep::Stop,
            }),
            PaginationMode::SkipOnly => Ok(match input.prior {
                None => CursorStep::Next(PageToken::Offset(0)),
                Some(prior) if input.has_more => {
                    CursorStep::Next(PageToken::Offset(prior.skip() + self.page_size))
                }
                Some(_) => CursorStep::Stop,
            }),
            PaginationMode::TimeWindowed | PaginationMode::TimeWindowedWithSkip => {
                self.next_window(input)
            }
        }
    }

    fn next_window(&self, input: CursorInput<'_>) -> Result<CursorStep> {
        let resume = input
            .resume_point
            .ok_or_else(|| Error::missing_field("start_date"))?;
        let candidate = resume + Duration::seconds(1);

        let Some(prior) = input.prior else {
            return Ok(self.open_window(candidate, input.today));
        };

        let (prior_start, prior_final) = match *prior {
            PageToken::Window {
                window_start,
                final_window,
                ..
            } => (window_start, final_window),
            // A non-window token can only come from a mode change; restart.
            _ => return Ok(self.open_window(candidate, input.today)),
        };

        if input.has_more && self.mode.follows_continuation() {
            return Ok(CursorStep::Next(PageToken::Window {
                window_start: prior_start,
                skip: prior.skip() + self.page_size,
                final_window: prior_final,
            }));
        }

        if prior_final {
            return Ok(CursorStep::Stop);
        }

        let candidate = if candidate <= prior_start {
            prior_start + self.step()
        } else {
            candidate
        };
        Ok(self.open_window(candidate, input.today))
    }

    fn open_window(&self, start: DateTime<Utc>, today: DateTime<Utc>) -> CursorStep {
        if start > today {
            return CursorStep::Stop;
        }
        let final_window =
            self.mode == PaginationMode::TimeWindowedWithSkip && today - start < self.window;
        CursorStep::Next(PageToken::window(start, final_window))
    }

    /// Forced advance past an empty window.
    ///
    /// Windows over a field pair are closed on their last day, so the next
    /// one starts a day later to avoid requesting that day twice.
    fn step(&self) -> Duration {
        match self.mode {
            PaginationMode::TimeWindowed => self.window + Duration::days(1),
            _ => self.window,
        }
    }
}
