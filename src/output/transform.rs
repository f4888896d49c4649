//! Record transforms
//!
//! A transform runs on every record before emission and may drop it by
//! returning `None`. Only kept records contribute parent keys to child
//! fan-out.

use crate::catalog::SchemaCatalog;
use crate::types::JsonObject;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::trace;

/// Per-record hook applied before emission
pub trait RecordTransform: Send + Sync {
    /// Transform a record; `None` drops it
    fn transform(&self, stream: &str, record: JsonObject) -> Option<JsonObject>;
}

/// Emits records unchanged
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityTransform;

impl RecordTransform for IdentityTransform {
    fn transform(&self, _stream: &str, record: JsonObject) -> Option<JsonObject> {
        Some(record)
    }
}

/// Keeps only the fields a stream declares in the catalog
#[derive(Debug, Clone, Default)]
pub struct SchemaProjection {
    fields: HashMap<String, HashSet<String>>,
}

impl SchemaProjection {
    /// Build a projection for the given streams
    pub fn new<'a>(
        catalog: &dyn SchemaCatalog,
        streams: impl IntoIterator<Item = &'a str>,
    ) -> crate::error::Result<Self> {
        let mut fields = HashMap::new();
        for stream in streams {
            let names = catalog
                .fields_for(stream)?
                .iter()
                .map(|f| f.name.clone())
                .collect();
            fields.insert(stream.to_string(), names);
        }
        Ok(Self { fields })
    }

    /// Build a projection from a shared catalog for all of its streams
    pub fn for_catalog(catalog: &Arc<crate::catalog::Catalog>) -> crate::error::Result<Self> {
        let names: Vec<String> = catalog.descriptors().iter().map(|d| d.name.clone()).collect();
        Self::new(catalog.as_ref(), names.iter().map(String::as_str))
    }
}

impl RecordTransform for SchemaProjection {
    fn transform(&self, stream: &str, mut record: JsonObject) -> Option<JsonObject> {
        let Some(allowed) = self.fields.get(stream) else {
            return Some(record);
        };
        // An empty field list means the schema is open.
        if allowed.is_empty() {
            return Some(record);
        }
        record.retain(|key, _| {
            let keep = allowed.contains(key);
            if !keep {
                trace!(stream, field = %key, "Dropping undeclared field");
            }
            keep
        });
        Some(record)
    }
}
