//! nanostore - an embedded, single-file document store with deterministic,
//! human-friendly Smart IDs.
//!
//! Every document gets a stable `uuid` and a derived `SimpleID` (e.g. `1`,
//! `c2`, `1.2.c3`) computed from its position in a partition induced by the
//! store's enumerated and hierarchical dimensions. SimpleIDs are never
//! persisted; they are recomputed from the full document snapshot on every
//! read so they stay correct as documents are added, moved, or deleted.
//!
//! Typical use binds a record type once via [`schema::Recordable`] (built
//! with [`schema::SchemaBuilder`]) and opens a [`schema::TypedStore`] against
//! it; [`store::Store`] is the untyped kernel underneath for callers who
//! prefer to manage dimension maps directly.

pub mod clock;
pub mod dimension;
pub mod document;
pub mod error;
pub mod filter;
pub mod introspect;
pub mod persist;
pub mod query;
pub mod schema;
pub mod simpleid;
pub mod store;
pub mod value;

pub use clock::{Clock, SystemClock};
pub use dimension::{Dimension, DimensionKind, DimensionSet, PrefixMap};
pub use document::{Document, DocumentView};
pub use error::{Error, Result};
pub use filter::{Clause, FilterSet, OneOrMany, OrderClause, OrderColumn};
pub use introspect::{DebugInfo, DimensionStats, FieldStats, IntegrityReport};
pub use persist::{export_schema, load_config, ExportedSchema};
pub use query::QueryBuilder;
pub use schema::{MarshalMode, Recordable, SchemaBuilder, TypedStore};
pub use store::{ListOptions, Patch, Store};
pub use value::Value;
