//! Integration tests for nanostore
//!
//! These exercise the typed-handle surface end to end: schema binding,
//! create/query/update/delete, and persistence across a reopen.

use std::collections::HashMap;
use std::collections::HashSet;

use nanostore::document::data_key;
use nanostore::schema::{emit_data, emit_enumerated, emit_hierarchical, MarshalMode, SchemaBuilder};
use nanostore::store::Patch;
use nanostore::{Document, DimensionSet, Recordable, TypedStore, Value};
use tempfile::TempDir;

struct Issue {
    title: String,
    status: String,
    priority: String,
    parent: String,
    assignee: String,
}

impl Recordable for Issue {
    fn dimension_schema() -> nanostore::Result<DimensionSet> {
        SchemaBuilder::new()
            .enumerated("status", ["open", "in_progress", "closed"], [("closed", "c")], Some("open"))
            .enumerated("priority", ["low", "high"], [("high", "h")], Some("low"))
            .hierarchical("epic", "parent_id")
            .build()
    }

    fn data_fields() -> &'static [&'static str] {
        &["assignee"]
    }

    fn title(&self) -> String {
        self.title.clone()
    }

    fn body(&self) -> String {
        String::new()
    }

    fn to_dimensions(&self, mode: MarshalMode) -> nanostore::Result<HashMap<String, Value>> {
        let dims = Self::dimension_schema()?;
        let mut out = HashMap::new();
        emit_enumerated(&mut out, &dims, "status", &self.status, mode);
        emit_enumerated(&mut out, &dims, "priority", &self.priority, mode);
        emit_hierarchical(&mut out, "parent_id", Some(&self.parent));
        emit_data(&mut out, "assignee", Value::String(self.assignee.clone()), mode);
        Ok(out)
    }

    fn from_document(doc: &Document) -> nanostore::Result<Self> {
        let dims = Self::dimension_schema()?;
        Ok(Self {
            title: doc.title.clone(),
            status: doc.dimension_value(&dims, "status").unwrap_or_default().to_string(),
            priority: doc.dimension_value(&dims, "priority").unwrap_or_default().to_string(),
            parent: doc.ref_value("parent_id").unwrap_or_default().to_string(),
            assignee: doc.data_value("assignee").and_then(Value::as_str).unwrap_or_default().to_string(),
        })
    }
}

#[test]
fn test_create_query_update_delete_workflow() {
    let dir = TempDir::new().unwrap();
    let store: TypedStore<Issue> = TypedStore::open(dir.path().join("issues.json")).unwrap();

    let epic = store
        .create(&Issue {
            title: "Launch".into(),
            status: String::new(),
            priority: "high".into(),
            parent: String::new(),
            assignee: "alice".into(),
        })
        .unwrap();

    let docs_issue = store
        .create(&Issue {
            title: "Write docs".into(),
            status: "in_progress".into(),
            priority: "low".into(),
            parent: epic.to_string(),
            assignee: "temp".into(),
        })
        .unwrap();

    store
        .create(&Issue {
            title: "Cut release".into(),
            status: "closed".into(),
            priority: "high".into(),
            parent: epic.to_string(),
            assignee: "bob".into(),
        })
        .unwrap();

    let high_priority = store.query().dimension("priority", "high").find().unwrap();
    assert_eq!(high_priority.len(), 2);

    // A bulk update that writes a data field's zero value clears it, unlike
    // creating with that zero value (which omits the key entirely) — so
    // querying for the cleared value only finds documents cleared this way.
    let mut cleared = HashSet::new();
    cleared.insert(docs_issue);
    let mut patch = Patch::default();
    patch.dimensions.insert(data_key("assignee"), Value::String(String::new()));
    store.update_by_uuids(&cleared, patch).unwrap();

    let unassigned = store.query().data("assignee", "").unwrap().find().unwrap();
    assert_eq!(unassigned.len(), 1);
    assert_eq!(unassigned[0].title, "Write docs");

    let children = store.query().reference("parent_id", epic.to_string()).find().unwrap();
    assert_eq!(children.len(), 2);

    let count = store.query().dimension("status", "closed").count().unwrap();
    assert_eq!(count, 1);

    let release = store.query().dimension("status", "closed").get().unwrap();
    assert_eq!(release.title, "Cut release");

    store.delete(&epic.to_string(), true).unwrap();
    assert_eq!(store.list_all().unwrap().len(), 0);
}

#[test]
fn test_order_by_data_field() {
    let dir = TempDir::new().unwrap();
    let store: TypedStore<Issue> = TypedStore::open(dir.path().join("issues.json")).unwrap();

    for (title, assignee) in [("A", "carol"), ("B", "alice"), ("C", "bob")] {
        store
            .create(&Issue {
                title: title.into(),
                status: String::new(),
                priority: String::new(),
                parent: String::new(),
                assignee: assignee.into(),
            })
            .unwrap();
    }

    let ordered = store.query().order_by_data("assignee").unwrap().find().unwrap();
    let assignees: Vec<&str> = ordered.iter().map(|i| i.assignee.as_str()).collect();
    assert_eq!(assignees, vec!["alice", "bob", "carol"]);
}

#[test]
fn test_store_reopens_and_keeps_documents_and_simple_ids() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("issues.json");

    let first_uuid = {
        let store: TypedStore<Issue> = TypedStore::open(&path).unwrap();
        store
            .create(&Issue {
                title: "Persisted".into(),
                status: String::new(),
                priority: String::new(),
                parent: String::new(),
                assignee: String::new(),
            })
            .unwrap()
    };

    let store: TypedStore<Issue> = TypedStore::open(&path).unwrap();
    let fetched = store.get(&first_uuid.to_string()).unwrap();
    assert_eq!(fetched.title, "Persisted");

    let views = store.store().list(Default::default()).unwrap();
    assert_eq!(views[0].simple_id, "1");
}

#[test]
fn test_data_field_query_rejects_unknown_field() {
    let dir = TempDir::new().unwrap();
    let store: TypedStore<Issue> = TypedStore::open(dir.path().join("issues.json")).unwrap();
    let err = store.query().data("not_a_real_field", "x").unwrap_err();
    assert!(err.to_string().contains("unknown data field"));
}

#[test]
fn test_integrity_report_is_clean_for_well_formed_store() {
    let dir = TempDir::new().unwrap();
    let store: TypedStore<Issue> = TypedStore::open(dir.path().join("issues.json")).unwrap();
    store
        .create(&Issue {
            title: "A".into(),
            status: String::new(),
            priority: String::new(),
            parent: String::new(),
            assignee: String::new(),
        })
        .unwrap();

    let report = store.integrity_report();
    assert!(report.is_clean());
}
