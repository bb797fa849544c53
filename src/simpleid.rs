//! The ID canonicalizer
//!
//! SimpleIDs are never persisted: they're recomputed from the
//! live document collection on every `List`/resolve call. This module is the
//! single place that knows how to do that, so round-trip and uniqueness hold
//! by construction.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::dimension::DimensionSet;
use crate::document::Document;
use crate::error::{Error, Result};

/// One document's enumerated-value tuple, in dimension-declaration order;
/// the key that defines a partition together with the parent uuid.
fn enumerated_tuple(dims: &DimensionSet, doc: &Document) -> Vec<Option<String>> {
    dims.enumerated_names()
        .map(|name| doc.dimension_value(dims, name).map(|v| v.to_string()))
        .collect()
}

fn parent_uuid(dims: &DimensionSet, doc: &Document) -> Option<Uuid> {
    dims.ref_fields()
        .find_map(|field| doc.ref_value(field))
        .and_then(|s| Uuid::parse_str(s).ok())
}

/// The prefix-letter portion of a segment: the ordered concatenation of
/// prefix letters for every non-default enumerated value the document
/// carries.
fn prefix_string(dims: &DimensionSet, doc: &Document) -> String {
    let mut out = String::new();
    for dim in dims.dimensions() {
        if dim.is_hierarchical() {
            continue;
        }
        let Some(value) = doc.dimension_value(dims, &dim.name) else {
            continue;
        };
        if Some(value) == dim.default_value() {
            continue;
        }
        if let Some(letter) = dim.prefix_for(value) {
            out.push_str(letter);
        }
    }
    out
}

struct Assignment {
    /// uuid -> (parent uuid, segment string)
    segments: HashMap<Uuid, (Option<Uuid>, String)>,
}

fn build_segments(dims: &DimensionSet, docs: &[Document]) -> Assignment {
    let mut partitions: HashMap<(Option<Uuid>, Vec<Option<String>>), Vec<&Document>> = HashMap::new();

    for doc in docs {
        let key = (parent_uuid(dims, doc), enumerated_tuple(dims, doc));
        partitions.entry(key).or_default().push(doc);
    }

    let mut segments = HashMap::with_capacity(docs.len());
    for ((parent, _tuple), mut members) in partitions {
        members.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.uuid.cmp(&b.uuid)));
        for (i, doc) in members.into_iter().enumerate() {
            let ordinal = i + 1;
            let segment = format!("{}{}", prefix_string(dims, doc), ordinal);
            segments.insert(doc.uuid, (parent, segment));
        }
    }

    Assignment { segments }
}

fn dotted_path(assignment: &Assignment, uuid: Uuid) -> String {
    let mut parts = Vec::new();
    let mut current = uuid;
    loop {
        let Some((parent, segment)) = assignment.segments.get(&current) else {
            break;
        };
        parts.push(segment.clone());
        match parent {
            Some(p) => current = *p,
            None => break,
        }
    }
    parts.reverse();
    parts.join(".")
}

/// Compute the SimpleID for every document in one pass. Returns a `uuid -> SimpleID` map.
pub fn assign_all(dims: &DimensionSet, docs: &[Document]) -> HashMap<Uuid, String> {
    let assignment = build_segments(dims, docs);
    docs.iter()
        .map(|doc| (doc.uuid, dotted_path(&assignment, doc.uuid)))
        .collect()
}

/// Compute the SimpleID for a single document, given the full snapshot it
/// belongs to (the snapshot determines partition membership and ordinals).
pub fn assign_one(dims: &DimensionSet, docs: &[Document], target: Uuid) -> Option<String> {
    let assignment = build_segments(dims, docs);
    assignment.segments.get(&target).map(|_| dotted_path(&assignment, target))
}

fn is_ordinal(s: &str) -> bool {
    !s.is_empty() && s.chars().next().is_some_and(|c| c != '0') && s.chars().all(|c| c.is_ascii_digit())
}

/// Split one grammar segment into its prefix letters and ordinal digits,
/// validating against the SimpleID segment grammar (letters, then a
/// non-zero-leading run of digits).
fn split_segment(segment: &str) -> Result<(&str, &str)> {
    let digit_start = segment
        .find(|c: char| c.is_ascii_digit())
        .ok_or_else(|| Error::not_found(segment))?;
    let (letters, ordinal) = segment.split_at(digit_start);
    if !letters.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(Error::not_found(segment));
    }
    if !is_ordinal(ordinal) {
        return Err(Error::not_found(segment));
    }
    Ok((letters, ordinal))
}

/// Resolve a SimpleID back to a uuid against a given document snapshot.
/// Unknown prefix letters, out-of-range ordinals, and orphan segments all
/// surface as `not_found`.
pub fn resolve(dims: &DimensionSet, docs: &[Document], simple_id: &str) -> Result<Uuid> {
    for segment in simple_id.split('.') {
        split_segment(segment)?;
    }

    let assignment = build_segments(dims, docs);
    let mut by_path: HashMap<String, Uuid> = HashMap::with_capacity(docs.len());
    for doc in docs {
        by_path.insert(dotted_path(&assignment, doc.uuid), doc.uuid);
    }

    by_path
        .get(simple_id)
        .copied()
        .ok_or_else(|| Error::not_found(simple_id))
}

/// Parse a `(created_at, uuid)` pair out of a document for ordering
/// purposes; exposed for callers who need the same tiebreak rule the
/// canonicalizer itself uses.
pub fn ordering_key(doc: &Document) -> (DateTime<Utc>, Uuid) {
    (doc.created_at, doc.uuid)
}
