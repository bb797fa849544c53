//! Exercises the single-file persistence boundary: atomic write-then-rename,
//! reopening a store with no on-disk file yet, and reopening with a
//! dimension set that has since evolved.

use std::collections::HashMap;

use nanostore::{Dimension, DimensionSet, PrefixMap, Store, Value};
use tempfile::TempDir;

fn status_dims() -> DimensionSet {
    DimensionSet::new(vec![Dimension::enumerated(
        "status",
        vec!["pending".into(), "done".into()],
        PrefixMap::from([("done".to_string(), "c".to_string())]),
        Some("pending".into()),
    )])
    .unwrap()
}

#[test]
fn opening_a_missing_path_creates_an_empty_store() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested").join("store.json");
    assert!(!path.exists());

    let store = Store::open(&path, status_dims()).unwrap();
    assert!(store.list(Default::default()).unwrap().is_empty());
    assert!(path.exists());
}

#[test]
fn writes_are_visible_after_reopening_the_same_path() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("store.json");

    let uuid = {
        let store = Store::open(&path, status_dims()).unwrap();
        store.add("A", HashMap::new()).unwrap()
    };

    let reopened = Store::open(&path, status_dims()).unwrap();
    let view = reopened.get(&uuid.to_string()).unwrap();
    assert_eq!(view.title, "A");
}

#[test]
fn no_stray_temp_file_is_left_after_a_write() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("store.json");
    let store = Store::open(&path, status_dims()).unwrap();
    store.add("A", HashMap::new()).unwrap();

    let tmp_path = dir.path().join(".store.json.tmp");
    assert!(!tmp_path.exists());
}

#[test]
fn reopening_with_an_evolved_dimension_set_does_not_fail_hard() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("store.json");

    {
        let store = Store::open(&path, status_dims()).unwrap();
        store.add("A", HashMap::new()).unwrap();
    }

    let evolved = DimensionSet::new(vec![Dimension::enumerated(
        "status",
        vec!["pending".into(), "done".into(), "archived".into()],
        PrefixMap::from([("done".to_string(), "c".to_string()), ("archived".to_string(), "a".to_string())]),
        Some("pending".into()),
    )])
    .unwrap();

    // Opening with a differing (but compatible) dimension set logs a
    // warning rather than failing; documents from before the change remain
    // readable.
    let reopened = Store::open(&path, evolved).unwrap();
    let views = reopened.list(Default::default()).unwrap();
    assert_eq!(views.len(), 1);
    assert_eq!(views[0].title, "A");
}

#[test]
fn rejects_a_file_with_an_unsupported_format_version() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("store.json");
    std::fs::write(
        &path,
        serde_json::json!({
            "header": {"format_version": 999, "dimensions": []},
            "documents": []
        })
        .to_string(),
    )
    .unwrap();

    let err = Store::open(&path, status_dims()).unwrap_err();
    assert!(err.to_string().contains("format version"));
}

#[test]
fn value_round_trips_through_persistence_for_every_scalar_kind() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("store.json");
    let store = Store::open(&path, status_dims()).unwrap();

    let mut dims = HashMap::new();
    dims.insert(nanostore::document::data_key("count"), Value::Int(7));
    dims.insert(nanostore::document::data_key("score"), Value::Float(4.5));
    dims.insert(nanostore::document::data_key("flagged"), Value::Bool(true));
    let uuid = store.add("A", dims).unwrap();

    let reopened = Store::open(&path, status_dims()).unwrap();
    let view = reopened.get(&uuid.to_string()).unwrap();
    assert_eq!(view.data_value("count"), Some(&Value::Int(7)));
    assert_eq!(view.data_value("score"), Some(&Value::Float(4.5)));
    assert_eq!(view.data_value("flagged"), Some(&Value::Bool(true)));
}
