//! Introspection: debug info, per-dimension/per-data-field statistics,
//! and an integrity report.
//!
//! Every type here is plain, serializable data; the store never formats a
//! report as text itself, leaving presentation to the caller.

use std::collections::HashMap;

use serde::Serialize;

use crate::dimension::{DimensionKind, DimensionSet};
use crate::document::Document;
use crate::value::Value;

/// Store-level debug summary.
#[derive(Debug, Serialize)]
pub struct DebugInfo {
    pub flavor: &'static str,
    pub document_count: usize,
    pub dimension_count: usize,
    pub hierarchical_dimension_count: usize,
    pub data_field_count: usize,
    pub dimension_stats: Vec<DimensionStats>,
}

/// Value-distribution histogram for one enumerated dimension. Hierarchical
/// dimensions report an empty histogram; their shape is a tree, not a
/// distribution.
#[derive(Debug, Serialize)]
pub struct DimensionStats {
    pub name: String,
    pub histogram: HashMap<String, usize>,
    /// True when every document carries the same value as the declared
    /// default; the "default-only, never diverged" warning condition.
    pub default_only: bool,
}

/// Presence coverage for one `_data.` field: the fraction of documents that
/// carry a non-absent value for it, in `[0, 1]`.
#[derive(Debug, Serialize)]
pub struct FieldStats {
    pub field: String,
    pub present_count: usize,
    pub total_count: usize,
    pub coverage: f64,
}

#[derive(Debug, Serialize)]
pub struct IntegrityReport {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl IntegrityReport {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Build the debug summary for a document snapshot.
pub fn debug_info(dims: &DimensionSet, docs: &[Document], data_fields: &[&'static str]) -> DebugInfo {
    let hierarchical_dimension_count = dims.ref_fields().count();
    DebugInfo {
        flavor: "nanostore",
        document_count: docs.len(),
        dimension_count: dims.dimensions().len(),
        hierarchical_dimension_count,
        data_field_count: data_fields.len(),
        dimension_stats: dimension_stats(dims, docs),
    }
}

pub fn dimension_stats(dims: &DimensionSet, docs: &[Document]) -> Vec<DimensionStats> {
    dims.dimensions()
        .iter()
        .filter_map(|dim| {
            let DimensionKind::Enumerated { default, .. } = &dim.kind else {
                return None;
            };
            let mut histogram: HashMap<String, usize> = HashMap::new();
            for doc in docs {
                if let Some(v) = doc.dimension_value(dims, &dim.name) {
                    *histogram.entry(v.to_string()).or_insert(0) += 1;
                }
            }
            let default_only = default
                .as_ref()
                .is_some_and(|d| histogram.keys().all(|k| k == d));
            Some(DimensionStats {
                name: dim.name.clone(),
                histogram,
                default_only,
            })
        })
        .collect()
}

/// Per-data-field presence coverage.
pub fn field_stats(docs: &[Document], data_fields: &[&'static str]) -> Vec<FieldStats> {
    data_fields
        .iter()
        .map(|field| {
            let present_count = docs.iter().filter(|d| d.data_value(field).is_some()).count();
            let total_count = docs.len();
            let coverage = if total_count == 0 { 0.0 } else { present_count as f64 / total_count as f64 };
            FieldStats {
                field: field.to_string(),
                present_count,
                total_count,
                coverage,
            }
        })
        .collect()
}

/// Scan every document for structural problems. Always
/// succeeds: problems are reported, never turned into an `Err`.
pub fn integrity_report(dims: &DimensionSet, docs: &[Document], data_fields: &[&'static str]) -> IntegrityReport {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    let mut seen_uuids = std::collections::HashSet::new();
    for doc in docs {
        if !seen_uuids.insert(doc.uuid) {
            errors.push(format!("duplicate uuid '{}'", doc.uuid));
        }
    }

    for doc in docs {
        for dim in dims.dimensions() {
            if let DimensionKind::Enumerated { values, .. } = &dim.kind {
                if let Some(v) = doc.dimensions.get(&dim.name) {
                    match v.as_str() {
                        Some(s) if !s.is_empty() && !values.contains(&s.to_string()) => {
                            errors.push(format!(
                                "document '{}' has value '{}' outside declared set for dimension '{}'",
                                doc.uuid, s, dim.name
                            ));
                        }
                        None => {
                            errors.push(format!(
                                "document '{}' carries a non-scalar or non-string value for enumerated dimension '{}'",
                                doc.uuid, dim.name
                            ));
                        }
                        _ => {}
                    }
                }
            }
        }

        for ref_field in dims.ref_fields() {
            if let Some(target) = doc.ref_value(ref_field) {
                let target_uuid = uuid::Uuid::parse_str(target).ok();
                let exists = target_uuid.is_some_and(|t| docs.iter().any(|d| d.uuid == t));
                if !exists {
                    errors.push(format!(
                        "document '{}' has a dangling reference '{}' in field '{}'",
                        doc.uuid, target, ref_field
                    ));
                }
            }
        }
    }

    for stats in dimension_stats(dims, docs) {
        if stats.default_only && !docs.is_empty() {
            warnings.push(format!("dimension '{}' has never diverged from its default value", stats.name));
        }
    }

    for field in data_fields {
        let mut variants: std::collections::HashSet<&'static str> = std::collections::HashSet::new();
        for doc in docs {
            if let Some(v) = doc.data_value(field) {
                variants.insert(variant_name(v));
            }
        }
        if variants.len() > 1 {
            warnings.push(format!("data field '{field}' holds mixed value types across documents"));
        }
    }

    IntegrityReport { errors, warnings }
}

fn variant_name(v: &Value) -> &'static str {
    match v {
        Value::String(_) => "string",
        Value::Bool(_) => "bool",
        Value::Int(_) => "int",
        Value::Float(_) => "float",
        Value::Instant(_) => "instant",
    }
}
