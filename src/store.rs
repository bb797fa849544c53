//! The store kernel
//!
//! Single-writer, many-reader within one process. Mutations take
//! the write lock; readers take the read lock just long enough to clone a
//! snapshot, then release it before computing SimpleIDs or filtering, so
//! canonicalization never runs while holding the lock.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::{Arc, RwLock};

use uuid::Uuid;

use crate::clock::{self, Clock, SharedClock};
use crate::dimension::{DimensionKind, DimensionSet};
use crate::document::{data_key, strip_data_prefix, Document, DocumentView};
use crate::error::{Error, Result};
use crate::filter::{FilterSet, OrderClause};
use crate::introspect::{self, DebugInfo, FieldStats, IntegrityReport};
use crate::persist::FileHandle;
use crate::value::Value;

/// A title/body/dimension patch, shared by `update`, `update_by_dimension`,
/// and `update_by_uuids`. Presence, not value, drives clearing: a key absent
/// from `dimensions` leaves the field untouched; a key present (even at its
/// zero value) overwrites it.
#[derive(Debug, Clone, Default)]
pub struct Patch {
    pub title: Option<String>,
    pub body: Option<String>,
    pub dimensions: HashMap<String, Value>,
}

/// Options accepted by `Store::list`.
#[derive(Debug, Clone, Default)]
pub struct ListOptions {
    pub filter: FilterSet,
    pub order_by: Vec<OrderClause>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

pub struct Store {
    dims: DimensionSet,
    documents: RwLock<Vec<Document>>,
    clock: RwLock<SharedClock>,
    handle: FileHandle,
}

impl Store {
    /// Open the store at `path`, creating it (empty) if it doesn't exist yet.
    pub fn open(path: impl AsRef<Path>, dims: DimensionSet) -> Result<Self> {
        let (handle, documents) = FileHandle::open_or_create(path, &dims)?;
        Ok(Self {
            dims,
            documents: RwLock::new(documents),
            clock: RwLock::new(clock::system()),
            handle,
        })
    }

    pub fn dimensions(&self) -> &DimensionSet {
        &self.dims
    }

    /// Replace the instant source. Production stores never need this; tests
    /// use it to get deterministic `created_at` ordering.
    pub fn set_clock(&self, clock: Arc<dyn Clock>) {
        *self.clock.write().unwrap() = clock;
    }

    pub fn close(self) -> Result<()> {
        self.handle.close()
    }

    fn now(&self) -> chrono::DateTime<chrono::Utc> {
        self.clock.read().unwrap().now()
    }

    fn snapshot(&self) -> Vec<Document> {
        self.documents.read().unwrap().clone()
    }

    fn persist(&self, docs: &[Document]) -> Result<()> {
        self.handle.write(&self.dims, docs)
    }

    /// Validate one dimension-map key/value pair: `_data.*` keys accept any
    /// scalar, dimension keys must be declared, enumerated values must be in
    /// their set.
    fn validate_entry(&self, key: &str, value: &Value) -> Result<()> {
        if strip_data_prefix(key).is_some() {
            return Ok(());
        }
        if self.dims.is_ref_field(key) {
            return Ok(());
        }
        match self.dims.find(key) {
            Some(dim) => {
                if let DimensionKind::Enumerated { values, .. } = &dim.kind {
                    match value.as_str() {
                        Some(v) if v.is_empty() => {}
                        Some(v) if values.contains(&v.to_string()) => {}
                        Some(v) => return Err(Error::validation(key, v, values)),
                        None => return Err(Error::validation(key, value.display(), values)),
                    }
                }
                Ok(())
            }
            None => Err(Error::InvalidValue(format!(
                "unknown dimension key '{key}': not a declared dimension and not prefixed '_data.'"
            ))),
        }
    }

    fn resolve_id(&self, id: &str, docs: &[Document]) -> Result<Uuid> {
        if let Ok(u) = Uuid::parse_str(id) {
            if docs.iter().any(|d| d.uuid == u) {
                return Ok(u);
            }
            return Err(Error::not_found(id));
        }
        crate::simpleid::resolve(&self.dims, docs, id)
    }

    /// Walk ancestors of `candidate_parent` looking for `doc_uuid`; used to
    /// reject updates that would create a reference cycle.
    fn creates_cycle(&self, docs: &[Document], doc_uuid: Uuid, candidate_parent: Uuid) -> bool {
        let mut current = candidate_parent;
        loop {
            if current == doc_uuid {
                return true;
            }
            let Some(doc) = docs.iter().find(|d| d.uuid == current) else {
                return false;
            };
            let Some(parent) = self.dims.ref_fields().find_map(|f| doc.ref_value(f)) else {
                return false;
            };
            match Uuid::parse_str(parent) {
                Ok(p) => current = p,
                Err(_) => return false,
            }
        }
    }

    /// Validate a dimension patch and resolve any hierarchical reference
    /// values, which may arrive as a UUID or a SimpleID, to their UUID form.
    /// Returns the patch with ref-field values rewritten to the resolved
    /// UUID string; everything else passes through unchanged.
    fn validate_patch(
        &self,
        docs: &[Document],
        doc_uuid: Uuid,
        patch: &HashMap<String, Value>,
    ) -> Result<HashMap<String, Value>> {
        let mut resolved = patch.clone();
        for (key, value) in patch {
            self.validate_entry(key, value)?;

            if self.dims.is_ref_field(key) {
                if let Some(target) = value.as_str().filter(|s| !s.is_empty()) {
                    let target_uuid = self.resolve_id(target, docs)?;
                    if target_uuid == doc_uuid || self.creates_cycle(docs, doc_uuid, target_uuid) {
                        return Err(Error::constraint(format!(
                            "setting '{key}' to '{target}' would create a cyclic hierarchical reference"
                        )));
                    }
                    resolved.insert(key.clone(), Value::String(target_uuid.to_string()));
                }
            }
        }
        Ok(resolved)
    }

    /// Insert a document, applying enumerated defaults for dimensions the
    /// caller didn't supply.
    pub fn add(&self, title: impl Into<String>, mut dimensions: HashMap<String, Value>) -> Result<Uuid> {
        let title = title.into();
        let docs = self.snapshot();

        for dim in self.dims.dimensions() {
            if let DimensionKind::Enumerated { default: Some(default), .. } = &dim.kind {
                dimensions.entry(dim.name.clone()).or_insert_with(|| Value::String(default.clone()));
            }
        }

        let dimensions = self.validate_patch(&docs, Uuid::nil(), &dimensions)?;

        let now = self.now();
        let doc = Document {
            uuid: Uuid::new_v4(),
            title,
            body: String::new(),
            created_at: now,
            updated_at: now,
            dimensions,
        };
        let uuid = doc.uuid;

        let mut guard = self.documents.write().unwrap();
        let mut next = guard.clone();
        next.push(doc);
        self.persist(&next)?;
        *guard = next;
        drop(guard);

        tracing::debug!(%uuid, "added document");
        Ok(uuid)
    }

    pub fn update(&self, id: &str, patch: Patch) -> Result<()> {
        let mut guard = self.documents.write().unwrap();
        let docs = guard.clone();
        let uuid = self.resolve_id(id, &docs)?;

        let resolved_dimensions = self.validate_patch(&docs, uuid, &patch.dimensions)?;

        let mut next = docs;
        let doc = next
            .iter_mut()
            .find(|d| d.uuid == uuid)
            .ok_or_else(|| Error::not_found(id))?;

        if let Some(title) = patch.title {
            doc.title = title;
        }
        if let Some(body) = patch.body {
            doc.body = body;
        }
        for (k, v) in resolved_dimensions {
            doc.dimensions.insert(k, v);
        }
        doc.updated_at = self.now();

        self.persist(&next)?;
        *guard = next;
        tracing::debug!(%uuid, "updated document");
        Ok(())
    }

    fn descendants(&self, docs: &[Document], root: Uuid) -> HashSet<Uuid> {
        let mut out = HashSet::new();
        let mut frontier = vec![root];
        while let Some(current) = frontier.pop() {
            for doc in docs {
                if doc.uuid == current {
                    continue;
                }
                let is_child = self
                    .dims
                    .ref_fields()
                    .any(|f| doc.ref_value(f) == Some(current.to_string().as_str()));
                if is_child && out.insert(doc.uuid) {
                    frontier.push(doc.uuid);
                }
            }
        }
        out
    }

    pub fn delete(&self, id: &str, cascade: bool) -> Result<()> {
        let mut guard = self.documents.write().unwrap();
        let docs = guard.clone();
        let uuid = self.resolve_id(id, &docs)?;

        let descendants = self.descendants(&docs, uuid);

        if !cascade && !descendants.is_empty() {
            return Err(Error::constraint(format!(
                "document '{id}' is referenced by {} other document(s); delete with cascade or remove references first",
                descendants.len()
            )));
        }

        let mut to_remove: HashSet<Uuid> = descendants;
        to_remove.insert(uuid);

        let next: Vec<Document> = docs.into_iter().filter(|d| !to_remove.contains(&d.uuid)).collect();
        self.persist(&next)?;
        *guard = next;
        tracing::debug!(%uuid, removed = to_remove.len(), "deleted document(s)");
        Ok(())
    }

    /// List documents matching `options`, with SimpleIDs computed from the
    /// full snapshot so partition membership is unaffected by the filter
    ///.
    pub fn list(&self, mut options: ListOptions) -> Result<Vec<DocumentView>> {
        let docs = self.snapshot();
        options.filter.resolve_refs(&self.dims, &docs);

        let ids = crate::simpleid::assign_all(&self.dims, &docs);

        let mut matched: Vec<&Document> = docs.iter().filter(|d| options.filter.matches(&self.dims, d)).collect();

        for clause in options.order_by.iter().rev() {
            matched.sort_by(|a, b| crate::filter::compare(&self.dims, a, b, clause));
        }

        let offset = options.offset.filter(|o| *o >= 0).unwrap_or(0) as usize;
        let limit = options.limit.filter(|l| *l >= 0).map(|l| l as usize);

        let page: Vec<&Document> = match limit {
            Some(limit) => matched.into_iter().skip(offset).take(limit).collect(),
            None => matched.into_iter().skip(offset).collect(),
        };

        Ok(page
            .into_iter()
            .map(|d| DocumentView {
                simple_id: ids.get(&d.uuid).cloned().unwrap_or_default(),
                document: d.clone(),
            })
            .collect())
    }

    pub fn resolve_uuid(&self, id: &str) -> Result<Uuid> {
        let docs = self.snapshot();
        self.resolve_id(id, &docs)
    }

    /// Fetch a single document by UUID or SimpleID.
    pub fn get(&self, id: &str) -> Result<DocumentView> {
        let docs = self.snapshot();
        let uuid = self.resolve_id(id, &docs)?;
        let ids = crate::simpleid::assign_all(&self.dims, &docs);
        docs.iter()
            .find(|d| d.uuid == uuid)
            .map(|d| DocumentView {
                simple_id: ids.get(&d.uuid).cloned().unwrap_or_default(),
                document: d.clone(),
            })
            .ok_or_else(|| Error::not_found(id))
    }

    fn bulk_update(&self, targets: impl Fn(&Document) -> bool, patch: &Patch) -> Result<usize> {
        let mut guard = self.documents.write().unwrap();
        let docs = guard.clone();

        let mut next = docs.clone();
        let mut count = 0usize;
        let now = self.now();

        for doc in next.iter_mut() {
            if !targets(doc) {
                continue;
            }
            let resolved_dimensions = self.validate_patch(&docs, doc.uuid, &patch.dimensions)?;
            if let Some(title) = &patch.title {
                doc.title = title.clone();
            }
            if let Some(body) = &patch.body {
                doc.body = body.clone();
            }
            for (k, v) in resolved_dimensions {
                doc.dimensions.insert(k, v);
            }
            doc.updated_at = now;
            count += 1;
        }

        if count > 0 {
            self.persist(&next)?;
            *guard = next;
        }
        tracing::debug!(count, "bulk update applied");
        Ok(count)
    }

    pub fn update_by_dimension(&self, filter: &FilterSet, patch: Patch) -> Result<usize> {
        let docs = self.snapshot();
        let mut resolved = filter.clone();
        resolved.resolve_refs(&self.dims, &docs);
        let dims = &self.dims;
        self.bulk_update(|d| resolved.matches(dims, d), &patch)
    }

    pub fn update_by_uuids(&self, uuids: &HashSet<Uuid>, patch: Patch) -> Result<usize> {
        self.bulk_update(|d| uuids.contains(&d.uuid), &patch)
    }

    /// No predicate DSL is implemented. Kept as a named method for API
    /// compatibility; always fails loudly rather than silently matching
    /// everything.
    pub fn update_where(&self, _sql_fragment: &str, _args: &[Value], _patch: Patch) -> Result<usize> {
        Err(Error::Unsupported(
            "update_where has no predicate DSL implementation; use update_by_dimension or update_by_uuids".into(),
        ))
    }

    fn bulk_delete(&self, targets: impl Fn(&Document) -> bool) -> Result<usize> {
        let mut guard = self.documents.write().unwrap();
        let docs = guard.clone();

        let doomed: HashSet<Uuid> = docs.iter().filter(|d| targets(d)).map(|d| d.uuid).collect();
        for uuid in &doomed {
            let referenced = docs.iter().any(|d| {
                !doomed.contains(&d.uuid) && self.dims.ref_fields().any(|f| d.ref_value(f) == Some(uuid.to_string().as_str()))
            });
            if referenced {
                return Err(Error::constraint(format!(
                    "document '{uuid}' is referenced by a document outside the delete set"
                )));
            }
        }

        let next: Vec<Document> = docs.into_iter().filter(|d| !doomed.contains(&d.uuid)).collect();
        if !doomed.is_empty() {
            self.persist(&next)?;
            *guard = next;
        }
        tracing::debug!(count = doomed.len(), "bulk delete applied");
        Ok(doomed.len())
    }

    pub fn delete_by_dimension(&self, filter: &FilterSet) -> Result<usize> {
        let docs = self.snapshot();
        let mut resolved = filter.clone();
        resolved.resolve_refs(&self.dims, &docs);
        let dims = &self.dims;
        self.bulk_delete(|d| resolved.matches(dims, d))
    }

    pub fn delete_by_uuids(&self, uuids: &HashSet<Uuid>) -> Result<usize> {
        self.bulk_delete(|d| uuids.contains(&d.uuid))
    }

    /// Mirrors `update_where`: no predicate DSL, always fails.
    pub fn delete_where(&self, _sql_fragment: &str, _args: &[Value]) -> Result<usize> {
        Err(Error::Unsupported(
            "delete_where has no predicate DSL implementation; use delete_by_dimension or delete_by_uuids".into(),
        ))
    }

    /// Store-level debug summary. `data_fields` comes from the
    /// bound record type; the untyped store has no data-field inventory of
    /// its own.
    pub fn debug_info(&self, data_fields: &[&'static str]) -> DebugInfo {
        introspect::debug_info(&self.dims, &self.snapshot(), data_fields)
    }

    pub fn field_stats(&self, data_fields: &[&'static str]) -> Vec<FieldStats> {
        introspect::field_stats(&self.snapshot(), data_fields)
    }

    pub fn integrity_report(&self, data_fields: &[&'static str]) -> IntegrityReport {
        introspect::integrity_report(&self.dims, &self.snapshot(), data_fields)
    }
}

pub(crate) fn data_entry(field: &str, value: impl Into<Value>) -> (String, Value) {
    (data_key(field), value.into())
}
