//! CLI module
//!
//! Command-line interface for running the tap.
//!
//! # Commands
//!
//! - `read` - Extract data from streams
//! - `discover` - Describe streams with their schemas
//! - `streams` - List stream names (lightweight)

mod commands;
mod runner;

pub use commands::{Cli, Commands, OutputFormat};
pub use runner::Runner;
