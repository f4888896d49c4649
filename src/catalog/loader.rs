//! YAML catalog loading
//!
//! Parses the stream table, applies catalog-wide defaults and validates the
//! result. The built-in Restaurant365 table is embedded in the binary.

use super::types::{DispatchStrategy, Field, ParentLink, StreamDescriptor, WindowFields};
use crate::error::{Error, Result};
use crate::pagination::PaginationMode;
use regex::Regex;
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::LazyLock;

/// Embedded Restaurant365 stream table
pub const BUILTIN_CATALOG: &str = include_str!("../../catalog/restaurant365.yaml");

/// Widest window a stream may declare
const MAX_WINDOW_DAYS: i64 = 3650;

/// Field names usable inside a `$filter` / `$orderby` expression
static IDENTIFIER_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*(/[A-Za-z_][A-Za-z0-9_]*)*$").unwrap());

/// Maps stream names to their fields and primary keys
pub trait SchemaCatalog: Send + Sync {
    /// Ordered schema fields of a stream
    fn fields_for(&self, stream: &str) -> Result<&[Field]>;

    /// Primary key fields of a stream
    fn primary_key_for(&self, stream: &str) -> Result<&[String]>;
}

#[derive(Debug, Deserialize)]
struct CatalogDefinition {
    base_url: String,
    #[serde(default = "default_records_path")]
    records_path: String,
    #[serde(default = "default_continuation_key")]
    continuation_key: String,
    #[serde(default = "default_page_size")]
    page_size: u64,
    #[serde(default = "default_window_days")]
    window_days: i64,
    streams: Vec<StreamDefinition>,
}

#[derive(Debug, Deserialize)]
struct StreamDefinition {
    name: String,
    path: String,
    #[serde(default)]
    primary_key: Vec<String>,
    #[serde(default)]
    replication_key: Option<String>,
    #[serde(default)]
    pagination: PaginationMode,
    #[serde(default)]
    type_filter: Option<String>,
    #[serde(default)]
    window_days: Option<i64>,
    #[serde(default)]
    window_fields: Option<WindowFields>,
    #[serde(default)]
    children: DispatchStrategy,
    #[serde(default)]
    parent: Option<ParentLink>,
    #[serde(default)]
    records_path: Option<String>,
    #[serde(default)]
    page_size: Option<u64>,
    #[serde(default)]
    fields: Vec<Field>,
}

fn default_records_path() -> String {
    "$.value[*]".to_string()
}

fn default_continuation_key() -> String {
    "@odata.nextLink".to_string()
}

fn default_page_size() -> u64 {
    5000
}

fn default_window_days() -> i64 {
    10
}

/// Validated, ordered stream table
#[derive(Debug, Clone)]
pub struct Catalog {
    base_url: String,
    streams: Vec<StreamDescriptor>,
    index: HashMap<String, usize>,
}

impl Catalog {
    /// The embedded Restaurant365 catalog
    pub fn builtin() -> Result<Self> {
        Self::from_yaml(BUILTIN_CATALOG)
    }

    /// Load a catalog from a YAML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            Error::config(format!("Failed to read catalog {}: {e}", path.display()))
        })?;
        Self::from_yaml(&contents)
    }

    /// Parse and validate a catalog from YAML text
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let definition: CatalogDefinition = serde_yaml::from_str(yaml)?;
        Self::from_definition(definition)
    }

    fn from_definition(def: CatalogDefinition) -> Result<Self> {
        let streams: Vec<StreamDescriptor> = def
            .streams
            .into_iter()
            .map(|s| StreamDescriptor {
                name: s.name,
                path: s.path,
                primary_key: s.primary_key,
                replication_key: s.replication_key,
                window_days: s.window_days.unwrap_or(def.window_days),
                pagination: s.pagination,
                type_filter: s.type_filter,
                window_fields: s.window_fields,
                children: s.children,
                parent: s.parent,
                records_path: s.records_path.unwrap_or_else(|| def.records_path.clone()),
                continuation_key: def.continuation_key.clone(),
                page_size: s.page_size.unwrap_or(def.page_size),
                fields: s.fields,
            })
            .collect();

        let mut index = HashMap::new();
        for (i, stream) in streams.iter().enumerate() {
            if index.insert(stream.name.clone(), i).is_some() {
                return Err(Error::config(format!(
                    "Duplicate stream name '{}'",
                    stream.name
                )));
            }
        }

        let catalog = Self {
            base_url: def.base_url,
            streams,
            index,
        };
        catalog.validate()?;
        Ok(catalog)
    }

    fn validate(&self) -> Result<()> {
        for stream in &self.streams {
            validate_stream(stream)?;

            if let Some(link) = &stream.parent {
                let parent = self.descriptor(&link.stream).map_err(|_| {
                    Error::invalid_value(
                        format!("{}.parent", stream.name),
                        format!("unknown parent stream '{}'", link.stream),
                    )
                })?;
                if parent.children == DispatchStrategy::None {
                    return Err(Error::invalid_value(
                        format!("{}.parent", stream.name),
                        format!("parent '{}' does not declare children", parent.name),
                    ));
                }
                if parent.is_child() {
                    return Err(Error::invalid_value(
                        format!("{}.parent", stream.name),
                        "nested child streams are not supported",
                    ));
                }
            }

            if stream.children != DispatchStrategy::None && self.child_of(&stream.name).is_none() {
                return Err(Error::invalid_value(
                    format!("{}.children", stream.name),
                    "no stream names this one as its parent",
                ));
            }
        }
        Ok(())
    }

    /// Base URL of the upstream API
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Look up a stream descriptor
    pub fn descriptor(&self, name: &str) -> Result<&StreamDescriptor> {
        self.index
            .get(name)
            .map(|&i| &self.streams[i])
            .ok_or_else(|| Error::stream_not_found(name))
    }

    /// All descriptors in declaration order
    pub fn descriptors(&self) -> &[StreamDescriptor] {
        &self.streams
    }

    /// Streams synced directly (children are reached through their parent)
    pub fn top_level(&self) -> impl Iterator<Item = &StreamDescriptor> {
        self.streams.iter().filter(|s| !s.is_child())
    }

    /// Child stream attached to `parent`, if any
    pub fn child_of(&self, parent: &str) -> Option<&StreamDescriptor> {
        self.streams
            .iter()
            .find(|s| s.parent.as_ref().is_some_and(|p| p.stream == parent))
    }

    /// Resolve a user selection into top-level stream names.
    ///
    /// Selecting a child stream selects its parent instead.
    pub fn select(&self, names: Option<&[String]>) -> Result<Vec<String>> {
        let Some(names) = names else {
            return Ok(self.top_level().map(|s| s.name.clone()).collect());
        };

        let mut seen = HashSet::new();
        let mut selected = Vec::new();
        for name in names {
            let descriptor = self.descriptor(name)?;
            let target = match &descriptor.parent {
                Some(link) => link.stream.clone(),
                None => descriptor.name.clone(),
            };
            if seen.insert(target.clone()) {
                selected.push(target);
            }
        }
        Ok(selected)
    }
}

impl SchemaCatalog for Catalog {
    fn fields_for(&self, stream: &str) -> Result<&[Field]> {
        Ok(&self.descriptor(stream)?.fields)
    }

    fn primary_key_for(&self, stream: &str) -> Result<&[String]> {
        Ok(&self.descriptor(stream)?.primary_key)
    }
}

fn validate_stream(stream: &StreamDescriptor) -> Result<()> {
    let name = &stream.name;

    let mut identifiers: Vec<&str> = stream.primary_key.iter().map(String::as_str).collect();
    identifiers.extend(stream.replication_key.as_deref());
    identifiers.extend(stream.fields.iter().map(|f| f.name.as_str()));
    if let Some(wf) = &stream.window_fields {
        identifiers.push(&wf.lower);
        identifiers.push(&wf.upper);
    }
    if let Some(link) = &stream.parent {
        identifiers.push(&link.parent_key);
        identifiers.push(&link.child_key);
    }
    if let Some(bad) = identifiers.iter().find(|id| !IDENTIFIER_REGEX.is_match(id)) {
        return Err(Error::invalid_value(
            name.clone(),
            format!("'{bad}' is not a valid field name"),
        ));
    }

    if stream.page_size == 0 {
        return Err(Error::invalid_value(
            format!("{name}.page_size"),
            "must be positive",
        ));
    }

    if !(1..=MAX_WINDOW_DAYS).contains(&stream.window_days) {
        return Err(Error::invalid_value(
            format!("{name}.window_days"),
            format!("must be between 1 and {MAX_WINDOW_DAYS}"),
        ));
    }

    if stream.pagination.is_windowed() {
        if stream.replication_key.is_none() && stream.window_fields.is_none() {
            return Err(Error::invalid_value(
                format!("{name}.pagination"),
                "windowed streams need a replication key or window fields",
            ));
        }
    }

    if stream.children != DispatchStrategy::None && stream.key_field().is_none() {
        return Err(Error::invalid_value(
            format!("{name}.primary_key"),
            "parent streams need a primary key",
        ));
    }

    if stream.is_child() && stream.pagination.is_windowed() {
        return Err(Error::invalid_value(
            format!("{name}.pagination"),
            "child streams are fetched by key and cannot be windowed",
        ));
    }

    Ok(())
}
