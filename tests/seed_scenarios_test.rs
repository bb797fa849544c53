//! End-to-end tests for the seed scenarios in the testable-properties section
//! of the design: SimpleID assignment/re-assignment, hierarchy, prefix
//! collisions, cascade delete, and the bulk-update clearing asymmetry.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use nanostore::clock::Clock;
use nanostore::{Dimension, DimensionSet, Error, Patch, PrefixMap, Store, Value};
use tempfile::TempDir;

/// A clock that hands out strictly increasing instants on each call, so
/// `created_at` ordering is deterministic across a test run.
struct StepClock {
    next: std::sync::Mutex<DateTime<Utc>>,
}

impl StepClock {
    fn new() -> Self {
        Self { next: std::sync::Mutex::new(Utc::now()) }
    }
}

impl Clock for StepClock {
    fn now(&self) -> DateTime<Utc> {
        let mut guard = self.next.lock().unwrap();
        let current = *guard;
        *guard = current + Duration::seconds(1);
        current
    }
}

fn status_store(dir: &TempDir) -> Store {
    let dims = DimensionSet::new(vec![Dimension::enumerated(
        "status",
        vec!["pending".into(), "done".into()],
        PrefixMap::from([("done".to_string(), "c".to_string())]),
        Some("pending".into()),
    )])
    .unwrap();
    let store = Store::open(dir.path().join("store.json"), dims).unwrap();
    store.set_clock(Arc::new(StepClock::new()));
    store
}

fn simple_ids(store: &Store) -> HashMap<String, String> {
    store
        .list(Default::default())
        .unwrap()
        .into_iter()
        .map(|v| (v.document.title.clone(), v.simple_id))
        .collect()
}

#[test]
fn s1_and_s2_simple_id_reassignment_on_dimension_flip() {
    let dir = TempDir::new().unwrap();
    let store = status_store(&dir);

    store.add("A", HashMap::new()).unwrap();
    store.add("B", HashMap::new()).unwrap();
    let mut done = HashMap::new();
    done.insert("status".to_string(), Value::String("done".into()));
    store.add("C", done).unwrap();

    let ids = simple_ids(&store);
    assert_eq!(ids["A"], "1");
    assert_eq!(ids["B"], "2");
    assert_eq!(ids["C"], "c1");

    let a_uuid = store.resolve_uuid("1").unwrap();
    let mut patch = Patch::default();
    patch.dimensions.insert("status".to_string(), Value::String("done".into()));
    store.update(&a_uuid.to_string(), patch).unwrap();

    let ids = simple_ids(&store);
    assert_eq!(ids["B"], "1");
    assert_eq!(ids["A"], "c1");
    assert_eq!(ids["C"], "c2");
}

#[test]
fn s3_hierarchy_produces_dotted_paths_and_resolves_back() {
    let dir = TempDir::new().unwrap();
    let dims = DimensionSet::new(vec![
        Dimension::enumerated(
            "status",
            vec!["pending".into(), "done".into()],
            PrefixMap::from([("done".to_string(), "c".to_string())]),
            Some("pending".into()),
        ),
        Dimension::hierarchical("parent", "parent_id"),
    ])
    .unwrap();
    let store = Store::open(dir.path().join("store.json"), dims).unwrap();
    store.set_clock(Arc::new(StepClock::new()));

    let root = store.add("R", HashMap::new()).unwrap();
    let mut x_dims = HashMap::new();
    x_dims.insert("parent_id".to_string(), Value::String(root.to_string()));
    store.add("X", x_dims).unwrap();

    let mut y_dims = HashMap::new();
    y_dims.insert("parent_id".to_string(), Value::String(root.to_string()));
    y_dims.insert("status".to_string(), Value::String("done".into()));
    let y = store.add("Y", y_dims).unwrap();

    let ids = simple_ids(&store);
    assert_eq!(ids["R"], "1");
    assert_eq!(ids["X"], "1.1");
    assert_eq!(ids["Y"], "1.c1");

    assert_eq!(store.resolve_uuid("1.c1").unwrap(), y);
}

#[test]
fn updating_a_hierarchical_reference_by_simple_id_resolves_it() {
    let dir = TempDir::new().unwrap();
    let dims = DimensionSet::new(vec![Dimension::hierarchical("parent", "parent_id")]).unwrap();
    let store = Store::open(dir.path().join("store.json"), dims).unwrap();

    let root = store.add("R", HashMap::new()).unwrap();
    let other_root = store.add("S", HashMap::new()).unwrap();
    let child = store.add("X", HashMap::new()).unwrap();

    assert_eq!(store.resolve_uuid("1").unwrap(), root);

    let mut patch = Patch::default();
    patch.dimensions.insert("parent_id".to_string(), Value::String("1".to_string()));
    store.update(&child.to_string(), patch).unwrap();

    let view = store.get(&child.to_string()).unwrap();
    assert_eq!(view.document.ref_value("parent_id"), Some(root.to_string().as_str()));
    assert_ne!(view.document.ref_value("parent_id"), Some(other_root.to_string().as_str()));
}

#[test]
fn s4_colliding_prefix_letters_name_both_dimensions_in_the_error() {
    let status = Dimension::enumerated(
        "status",
        vec!["pending".into(), "done".into()],
        PrefixMap::from([("done".to_string(), "h".to_string())]),
        Some("pending".into()),
    );
    let priority = Dimension::enumerated(
        "priority",
        vec!["low".into(), "high".into()],
        PrefixMap::from([("high".to_string(), "h".to_string())]),
        None,
    );

    let err = DimensionSet::new(vec![status, priority]).unwrap_err();
    let msg = err.to_string();
    assert!(msg.contains('h'));
    assert!(msg.contains("status"));
    assert!(msg.contains("priority"));
}

#[test]
fn s5_cascade_delete_semantics() {
    let dir = TempDir::new().unwrap();
    let dims = DimensionSet::new(vec![
        Dimension::enumerated("status", vec!["pending".into()], PrefixMap::new(), Some("pending".into())),
        Dimension::hierarchical("parent", "parent_id"),
    ])
    .unwrap();
    let store = Store::open(dir.path().join("store.json"), dims).unwrap();

    let root = store.add("R", HashMap::new()).unwrap();
    let mut x_dims = HashMap::new();
    x_dims.insert("parent_id".to_string(), Value::String(root.to_string()));
    store.add("X", x_dims).unwrap();

    let err = store.delete(&root.to_string(), false).unwrap_err();
    assert!(matches!(err, Error::Constraint(_)));

    store.delete(&root.to_string(), true).unwrap();
    assert!(store.list(Default::default()).unwrap().is_empty());
}

#[test]
fn s6_bulk_update_by_uuids_clears_but_empty_patch_leaves_untouched() {
    let dir = TempDir::new().unwrap();
    let store = status_store(&dir);

    let mut dims = HashMap::new();
    dims.insert(nanostore::document::data_key("assignee"), Value::String("alice".into()));
    let u = store.add("A", dims).unwrap();

    store.update(&u.to_string(), Patch::default()).unwrap();
    let view = store.get(&u.to_string()).unwrap();
    assert_eq!(view.data_value("assignee"), Some(&Value::String("alice".into())));

    let mut patch = Patch::default();
    patch.dimensions.insert(nanostore::document::data_key("assignee"), Value::String(String::new()));
    let mut targets = HashSet::new();
    targets.insert(u);
    store.update_by_uuids(&targets, patch).unwrap();

    let view = store.get(&u.to_string()).unwrap();
    assert_eq!(view.data_value("assignee"), Some(&Value::String(String::new())));
}
