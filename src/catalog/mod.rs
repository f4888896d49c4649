//! Stream catalog module
//!
//! Data-driven stream table: every stream is a row of the YAML catalog, not
//! a type of its own. Streams sharing a view differ only by their
//! `type_filter` clause.
//!
//! # Overview
//!
//! The catalog module provides:
//! - `StreamDescriptor` - Immutable, resolved stream definition
//! - `Catalog` - Validated table loaded from YAML
//! - `SchemaCatalog` - Field list and primary key lookup

mod loader;
mod types;

pub use loader::{Catalog, SchemaCatalog, BUILTIN_CATALOG};
pub use types::{DispatchStrategy, Field, FieldType, ParentLink, StreamDescriptor, WindowFields};

#[cfg(test)]
mod tests;
