//! Dimension set: validated configuration
//!
//! A `DimensionSet` is the immutable, validated description of the axes a
//! collection is partitioned along. It is produced either directly or
//! derived from a typed record schema (see `schema.rs`), and is shared
//! freely once built.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// One enumerated value's declared short prefix letter(s).
pub type PrefixMap = HashMap<String, String>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DimensionKind {
    /// A closed, ordered set of allowed values with optional per-value
    /// prefix letters and an optional default.
    Enumerated {
        values: Vec<String>,
        prefixes: PrefixMap,
        default: Option<String>,
    },
    /// A reference field naming a dimension key that holds either empty
    /// (root) or the uuid of another document.
    Hierarchical { ref_field: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dimension {
    pub name: String,
    pub kind: DimensionKind,
}

impl Dimension {
    pub fn enumerated(
        name: impl Into<String>,
        values: Vec<String>,
        prefixes: PrefixMap,
        default: Option<String>,
    ) -> Self {
        Self {
            name: name.into(),
            kind: DimensionKind::Enumerated {
                values,
                prefixes,
                default,
            },
        }
    }

    pub fn hierarchical(name: impl Into<String>, ref_field: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: DimensionKind::Hierarchical {
                ref_field: ref_field.into(),
            },
        }
    }

    pub fn is_hierarchical(&self) -> bool {
        matches!(self.kind, DimensionKind::Hierarchical { .. })
    }

    pub fn values(&self) -> Option<&[String]> {
        match &self.kind {
            DimensionKind::Enumerated { values, .. } => Some(values),
            DimensionKind::Hierarchical { .. } => None,
        }
    }

    pub fn default_value(&self) -> Option<&str> {
        match &self.kind {
            DimensionKind::Enumerated { default, .. } => default.as_deref(),
            DimensionKind::Hierarchical { .. } => None,
        }
    }

    pub fn prefix_for(&self, value: &str) -> Option<&str> {
        match &self.kind {
            DimensionKind::Enumerated { prefixes, .. } => prefixes.get(value).map(|s| s.as_str()),
            DimensionKind::Hierarchical { .. } => None,
        }
    }

    /// Values other than `value`, used to compile `<Dim>Not(v)` into a
    /// set-membership filter.
    pub fn complement_of(&self, value: &str) -> Vec<String> {
        match self.values() {
            Some(values) => values.iter().filter(|v| v.as_str() != value).cloned().collect(),
            None => Vec::new(),
        }
    }
}

/// The validated, ordered set of dimensions for a store.
#[derive(Debug, Clone)]
pub struct DimensionSet {
    dimensions: Vec<Dimension>,
    index: HashMap<String, usize>,
}

impl DimensionSet {
    /// Build and validate a dimension set: non-empty, unique names, globally
    /// unique prefix letters, defaults within their value set, no `=` in a
    /// values entry.
    pub fn new(dimensions: Vec<Dimension>) -> Result<Self> {
        if dimensions.is_empty() {
            return Err(Error::configuration("dimension set must declare at least one dimension"));
        }

        let mut index = HashMap::with_capacity(dimensions.len());
        for (i, dim) in dimensions.iter().enumerate() {
            if index.insert(dim.name.clone(), i).is_some() {
                return Err(Error::configuration(format!(
                    "duplicate dimension name '{}'",
                    dim.name
                )));
            }
        }

        let mut letter_owners: HashMap<String, String> = HashMap::new();
        for dim in &dimensions {
            if let DimensionKind::Enumerated {
                values,
                prefixes,
                default,
            } = &dim.kind
            {
                if values.is_empty() {
                    return Err(Error::configuration(format!(
                        "dimension '{}' must declare at least one value",
                        dim.name
                    )));
                }

                let mut seen = std::collections::HashSet::new();
                for v in values {
                    if v.is_empty() {
                        return Err(Error::configuration(format!(
                            "dimension '{}' contains an empty value",
                            dim.name
                        )));
                    }
                    if v.contains('=') {
                        return Err(Error::configuration(format!(
                            "value '{}' for dimension '{}' contains '=' (did you mean to use prefix=letter form?)",
                            v, dim.name
                        )));
                    }
                    if !seen.insert(v.clone()) {
                        return Err(Error::configuration(format!(
                            "duplicate value '{}' in dimension '{}'",
                            v, dim.name
                        )));
                    }
                }

                for (value, letter) in prefixes {
                    if !values.contains(value) {
                        return Err(Error::configuration(format!(
                            "prefix for value '{}' in dimension '{}' does not name a declared value",
                            value, dim.name
                        )));
                    }
                    if let Some(owner) = letter_owners.get(letter) {
                        return Err(Error::configuration(format!(
                            "prefix letter '{}' is used by both dimension '{}' and dimension '{}'",
                            letter, owner, dim.name
                        )));
                    }
                    letter_owners.insert(letter.clone(), dim.name.clone());
                }

                if let Some(default) = default {
                    if !values.contains(default) {
                        return Err(Error::configuration(format!(
                            "default value '{}' for dimension '{}' is not in its declared values",
                            default, dim.name
                        )));
                    }
                }
            }
        }

        Ok(Self { dimensions, index })
    }

    pub fn dimensions(&self) -> &[Dimension] {
        &self.dimensions
    }

    pub fn find(&self, name: &str) -> Option<&Dimension> {
        self.index.get(name).map(|&i| &self.dimensions[i])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Reference field names for every hierarchical dimension (usually just
    /// `parent_id`, but the model allows more than one).
    pub fn ref_fields(&self) -> impl Iterator<Item = &str> {
        self.dimensions.iter().filter_map(|d| match &d.kind {
            DimensionKind::Hierarchical { ref_field } => Some(ref_field.as_str()),
            DimensionKind::Enumerated { .. } => None,
        })
    }

    pub fn is_ref_field(&self, key: &str) -> bool {
        self.ref_fields().any(|r| r == key)
    }

    /// Names of every enumerated dimension, in declaration order; the
    /// canonicalizer walks these to build each partition key.
    pub fn enumerated_names(&self) -> impl Iterator<Item = &str> {
        self.dimensions.iter().filter_map(|d| match &d.kind {
            DimensionKind::Enumerated { .. } => Some(d.name.as_str()),
            DimensionKind::Hierarchical { .. } => None,
        })
    }

    /// The union of every declared prefix letter, longest-first, so the
    /// canonicalizer's greedy segment parser never needs backtracking
    /// between differently-sized letter groups.
    pub fn prefix_alphabet(&self) -> Vec<(&str, &str, &str)> {
        let mut out = Vec::new();
        for dim in &self.dimensions {
            if let DimensionKind::Enumerated { prefixes, .. } = &dim.kind {
                for (value, letter) in prefixes {
                    out.push((letter.as_str(), dim.name.as_str(), value.as_str()));
                }
            }
        }
        out.sort_by(|a, b| b.0.len().cmp(&a.0.len()).then_with(|| a.0.cmp(b.0)));
        out
    }
}
