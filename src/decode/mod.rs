//! Response decoder module
//!
//! Extracts records from OData JSON responses and detects whether the
//! current window has more pages.

mod decoders;
mod types;

pub use decoders::JsonDecoder;
pub use types::{DecodedPage, DecoderConfig, RecordDecoder};
