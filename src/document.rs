//! The document model

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::dimension::DimensionSet;
use crate::value::Value;

/// Prefix used for keys in the data-field namespace.
pub const DATA_PREFIX: &str = "_data.";

pub fn data_key(field: &str) -> String {
    format!("{DATA_PREFIX}{field}")
}

pub fn strip_data_prefix(key: &str) -> Option<&str> {
    key.strip_prefix(DATA_PREFIX)
}

/// A single record in the store. Never carries a `simple_id`; that is
/// always computed fresh from a `List` snapshot (see `simpleid.rs`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub uuid: Uuid,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub body: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub dimensions: HashMap<String, Value>,
}

impl Document {
    /// The effective value of an enumerated dimension, applying the
    /// declared default when the document doesn't carry it explicitly
    ///.
    pub fn dimension_value<'a>(&'a self, dims: &'a DimensionSet, name: &str) -> Option<&'a str> {
        if let Some(v) = self.dimensions.get(name).and_then(Value::as_str) {
            return Some(v);
        }
        dims.find(name).and_then(|d| d.default_value())
    }

    pub fn data_value(&self, field: &str) -> Option<&Value> {
        self.dimensions.get(&data_key(field))
    }

    /// The raw value of a hierarchical reference field: empty/missing means
    /// root.
    pub fn ref_value(&self, ref_field: &str) -> Option<&str> {
        self.dimensions
            .get(ref_field)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    }
}

/// A read-only snapshot of a document with its computed SimpleID attached.
/// This is what `List`, `find`, `get`, etc. hand back to callers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentView {
    pub simple_id: String,
    #[serde(flatten)]
    pub document: Document,
}

impl std::ops::Deref for DocumentView {
    type Target = Document;
    fn deref(&self) -> &Document {
        &self.document
    }
}
