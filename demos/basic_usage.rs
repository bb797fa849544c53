//! Basic usage example for nanostore

use std::collections::HashMap;

use nanostore::{
    schema::{emit_data, emit_enumerated, emit_hierarchical, MarshalMode, SchemaBuilder},
    Document, DimensionSet, Error, Recordable, TypedStore, Value,
};

struct Task {
    title: String,
    status: String,
    parent: String,
    assignee: String,
}

impl Recordable for Task {
    fn dimension_schema() -> nanostore::Result<DimensionSet> {
        SchemaBuilder::new()
            .enumerated("status", ["pending", "active", "done"], [("done", "c")], Some("pending"))
            .hierarchical("parent", "parent_id")
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
        emit_hierarchical(&mut out, "parent_id", Some(&self.parent));
        emit_data(&mut out, "assignee", Value::String(self.assignee.clone()), mode);
        Ok(out)
    }

    fn from_document(doc: &Document) -> nanostore::Result<Self> {
        let dims = Self::dimension_schema()?;
        Ok(Self {
            title: doc.title.clone(),
            status: doc.dimension_value(&dims, "status").unwrap_or_default().to_string(),
            parent: doc.ref_value("parent_id").unwrap_or_default().to_string(),
            assignee: doc.data_value("assignee").and_then(Value::as_str).unwrap_or_default().to_string(),
        })
    }
}

fn main() -> nanostore::Result<()> {
    tracing_subscriber::fmt::init();

    println!("=== nanostore basic usage ===\n");

    let temp_dir = tempfile::tempdir().unwrap();
    let path = temp_dir.path().join("tasks.json");
    println!("Opening store at: {:?}", path);

    let store: TypedStore<Task> = TypedStore::open(&path)?;

    println!("Creating tasks...");
    let epic = store.create(&Task {
        title: "Ship nanostore".into(),
        status: String::new(),
        parent: String::new(),
        assignee: "alice".into(),
    })?;

    store.create(&Task {
        title: "Write the canonicalizer".into(),
        status: "active".into(),
        parent: epic.to_string(),
        assignee: "bob".into(),
    })?;

    store.create(&Task {
        title: "Write the schema binder".into(),
        status: "done".into(),
        parent: epic.to_string(),
        assignee: String::new(),
    })?;

    println!("✓ Created 3 tasks\n");

    println!("Listing all tasks with their SimpleIDs:");
    for view in store.store().list(Default::default())? {
        println!("  {} - {} [{}]", view.simple_id, view.document.title, view.document.uuid);
    }
    println!();

    println!("Querying active tasks assigned to bob:");
    let bobs_active = store
        .query()
        .dimension("status", "active")
        .data("assignee", "bob")?
        .find()?;
    for task in &bobs_active {
        println!("  {}", task.title);
    }
    println!();

    println!("Resolving epic's children by SimpleID path '1.*':");
    let epic_id = store.store().resolve_uuid(&epic.to_string())?;
    for task in store.query().reference("parent_id", epic_id.to_string()).find()? {
        println!("  child: {}", task.title);
    }

    match store.store().delete_where("status = 'done'", &[]) {
        Err(Error::Unsupported(msg)) => println!("\n(delete_where is intentionally unsupported: {msg})"),
        _ => unreachable!("delete_where always returns Unsupported"),
    }

    println!("\n✓ Example completed successfully!");
    Ok(())
}
