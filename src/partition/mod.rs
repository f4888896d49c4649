//! Child fan-out module
//!
//! Parent records can drive child fetches. With the batched strategy,
//! parent keys are grouped and each group becomes one child request
//! sequence filtered by a member list. Batches run on a small bounded
//! worker pool so the upstream rate limit is respected.

mod dispatcher;
mod types;

pub use dispatcher::{BatchDispatcher, DEFAULT_BATCH_SIZE, DEFAULT_CONCURRENCY};
pub use types::{BatchHandler, BatchJob, BatchReport, BatchStatus};

#[cfg(test)]
mod tests;
