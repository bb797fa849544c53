//! The schema binder
//!
//! Rust has no runtime field reflection to derive a dimension set from
//! automatically, so binding a record type is explicit: a `SchemaBuilder`
//! the caller calls once per record type, producing a `DimensionSet` that is
//! validated once (by `DimensionSet::new`, see `dimension.rs`) and then
//! cached on the typed handle (`TypedStore`) for the lifetime of the store;
//! never recomputed per call.
//!
//! A type opts in by implementing `Recordable`, either by hand against
//! `SchemaBuilder` (see the `Task` test below) or via the `nanostore_record!`
//! declarative macro for the common all-`String`-fields case. The free
//! `emit_*` helpers
//! below encode the create-vs-update marshalling asymmetry in
//! exactly one place, so every `Recordable` impl gets it for free instead of
//! re-deriving the subtlety by hand:
//!
//! - enumerated dimension field at zero value: create mode substitutes the
//!   declared default (or emits empty, to be rejected by validation);
//!   update mode omits the key entirely, so "didn't set it" means "leave it
//!   alone".
//! - hierarchical field at zero value (no parent): always omitted.
//! - data field at zero value: create mode omits it; update mode emits it,
//!   which is what lets a bulk update *clear* a data field by setting it to
//!   its zero value. This asymmetry is load-bearing;
//!   don't "fix" it into symmetry.

use std::collections::{HashMap, HashSet};
use std::marker::PhantomData;
use std::path::Path;

use uuid::Uuid;

use crate::dimension::{Dimension, DimensionSet, PrefixMap};
use crate::document::{data_key, Document};
use crate::error::Result;
use crate::query::QueryBuilder;
use crate::store::{ListOptions, Patch, Store};
use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarshalMode {
    Create,
    Update,
}

/// A record type that can be bound to a nanostore dimension set. Implement
/// this once per type; `TypedStore<T>` caches the result of
/// `dimension_schema()` for the store's whole lifetime.
pub trait Recordable: Sized {
    fn dimension_schema() -> Result<DimensionSet>;

    /// Canonical (snake_case) names of every `_data.` field this type
    /// declares; used by `QueryBuilder` to validate `data_*` filter/order
    /// calls and to build the "valid data fields" suggestion list.
    fn data_fields() -> &'static [&'static str];

    fn title(&self) -> String;
    fn body(&self) -> String;

    /// Marshal dimension/data fields per `mode`.
    fn to_dimensions(&self, mode: MarshalMode) -> Result<HashMap<String, Value>>;

    /// Populate an instance from a stored document: present document values
    /// win, then the declared default, then the type's own zero value.
    fn from_document(doc: &Document) -> Result<Self>;
}

/// Fluent constructor for a `DimensionSet` when compile-time derivation
/// isn't available. Field order is declaration order, matching the
/// canonicalizer's prefix-concatenation rule.
#[derive(Debug, Default)]
pub struct SchemaBuilder {
    dimensions: Vec<Dimension>,
}

impl SchemaBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enumerated(
        mut self,
        name: impl Into<String>,
        values: impl IntoIterator<Item = impl Into<String>>,
        prefixes: impl IntoIterator<Item = (impl Into<String>, impl Into<String>)>,
        default: Option<impl Into<String>>,
    ) -> Self {
        let values = values.into_iter().map(Into::into).collect();
        let prefixes: PrefixMap = prefixes.into_iter().map(|(v, p)| (v.into(), p.into())).collect();
        self.dimensions.push(Dimension::enumerated(name, values, prefixes, default.map(Into::into)));
        self
    }

    pub fn hierarchical(mut self, name: impl Into<String>, ref_field: impl Into<String>) -> Self {
        self.dimensions.push(Dimension::hierarchical(name, ref_field));
        self
    }

    pub fn build(self) -> Result<DimensionSet> {
        DimensionSet::new(self.dimensions)
    }
}

/// Emit an enumerated dimension field, applying the create-vs-update
/// asymmetry described above.
pub fn emit_enumerated(out: &mut HashMap<String, Value>, dims: &DimensionSet, field: &str, value: &str, mode: MarshalMode) {
    if !value.is_empty() {
        out.insert(field.to_string(), Value::String(value.to_string()));
        return;
    }
    if mode == MarshalMode::Update {
        return; // absent means "do not change"
    }
    let substituted = dims.find(field).and_then(|d| d.default_value()).unwrap_or("");
    out.insert(field.to_string(), Value::String(substituted.to_string()));
}

/// Emit a hierarchical reference field: always omitted at its zero value
/// (empty/no parent), in both modes.
pub fn emit_hierarchical(out: &mut HashMap<String, Value>, ref_field: &str, value: Option<&str>) {
    if let Some(v) = value {
        if !v.is_empty() {
            out.insert(ref_field.to_string(), Value::String(v.to_string()));
        }
    }
}

/// Emit a data field. Create mode drops zero values (so later defaults
/// apply); update mode always emits, which is what makes clearing
/// possible.
pub fn emit_data(out: &mut HashMap<String, Value>, field: &str, value: Value, mode: MarshalMode) {
    if mode == MarshalMode::Create && value.is_zero() {
        return;
    }
    out.insert(data_key(field), value);
}

/// A store handle parameterized by a `Recordable` type, caching its
/// dimension schema once at construction instead of recomputing it on every call.
pub struct TypedStore<T: Recordable> {
    store: Store,
    _marker: PhantomData<T>,
}

impl<T: Recordable> TypedStore<T> {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let dims = T::dimension_schema()?;
        let store = Store::open(path, dims)?;
        Ok(Self { store, _marker: PhantomData })
    }

    /// Escape hatch onto the untyped store, for operations `TypedStore`
    /// doesn't wrap (e.g. `set_clock` in tests).
    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn create(&self, record: &T) -> Result<Uuid> {
        let dimensions = record.to_dimensions(MarshalMode::Create)?;
        self.store.add(record.title(), dimensions)
    }

    pub fn get(&self, id: &str) -> Result<T> {
        let view = self.store.get(id)?;
        T::from_document(&view.document)
    }

    pub fn update(&self, id: &str, patch: Patch) -> Result<()> {
        self.store.update(id, patch)
    }

    /// Replace a record's dimension/data fields wholesale from a fresh
    /// instance, using update-mode marshalling so zero values clear their
    /// field rather than being dropped.
    pub fn replace(&self, id: &str, record: &T) -> Result<()> {
        let dimensions = record.to_dimensions(MarshalMode::Update)?;
        self.store.update(
            id,
            Patch {
                title: Some(record.title()),
                body: Some(record.body()),
                dimensions,
            },
        )
    }

    pub fn delete(&self, id: &str, cascade: bool) -> Result<()> {
        self.store.delete(id, cascade)
    }

    pub fn resolve_uuid(&self, id: &str) -> Result<Uuid> {
        self.store.resolve_uuid(id)
    }

    pub fn query(&self) -> QueryBuilder<'_, T> {
        QueryBuilder::new(&self.store)
    }

    pub fn list_all(&self) -> Result<Vec<T>> {
        self.store
            .list(ListOptions::default())?
            .iter()
            .map(|view| T::from_document(&view.document))
            .collect()
    }

    pub fn update_by_uuids(&self, uuids: &HashSet<Uuid>, patch: Patch) -> Result<usize> {
        self.store.update_by_uuids(uuids, patch)
    }

    pub fn delete_by_uuids(&self, uuids: &HashSet<Uuid>) -> Result<usize> {
        self.store.delete_by_uuids(uuids)
    }

    pub fn close(self) -> Result<()> {
        self.store.close()
    }

    pub fn debug_info(&self) -> crate::introspect::DebugInfo {
        self.store.debug_info(T::data_fields())
    }

    pub fn field_stats(&self) -> Vec<crate::introspect::FieldStats> {
        self.store.field_stats(T::data_fields())
    }

    pub fn integrity_report(&self) -> crate::introspect::IntegrityReport {
        self.store.integrity_report(T::data_fields())
    }
}

/// Generate a `Recordable` impl for a struct whose enumerated and data
/// fields are all plain `String`s (the common case). Hand-write the impl
/// instead for richer field types, as the `Task` example in the tests below
/// does with `SchemaBuilder` directly.
///
/// ```ignore
/// struct Issue {
///     title: String,
///     body: String,
///     status: String,
///     parent_id: Option<String>,
///     assignee: String,
/// }
///
/// nanostore_record! {
///     Issue {
///         title: title,
///         body: body,
///         enumerated: [
///             status { values: ["open", "done"], prefixes: ["done" => "c"], default: "open" },
///         ],
///         hierarchical: [
///             parent_id via "parent_id",
///         ],
///         data: [assignee],
///     }
/// }
/// ```
#[macro_export]
macro_rules! nanostore_record {
    (
        $name:ident {
            title: $title_field:ident,
            body: $body_field:ident,
            enumerated: [
                $( $e_field:ident { values: [$($e_val:literal),+ $(,)?], prefixes: [$($e_pval:literal => $e_prefix:literal),* $(,)?], default: $e_default:literal } ),* $(,)?
            ],
            hierarchical: [
                $( $h_field:ident via $h_ref:literal ),* $(,)?
            ],
            data: [
                $( $d_field:ident ),* $(,)?
            ] $(,)?
        }
    ) => {
        impl $crate::schema::Recordable for $name {
            fn dimension_schema() -> $crate::error::Result<$crate::dimension::DimensionSet> {
                $crate::schema::SchemaBuilder::new()
                    $(
                        .enumerated(
                            stringify!($e_field),
                            [$($e_val),+],
                            [$(($e_pval, $e_prefix)),*],
                            Some($e_default),
                        )
                    )*
                    $(
                        .hierarchical(stringify!($h_field), $h_ref)
                    )*
                    .build()
            }

            fn data_fields() -> &'static [&'static str] {
                &[$(stringify!($d_field)),*]
            }

            fn title(&self) -> String {
                self.$title_field.clone()
            }

            fn body(&self) -> String {
                self.$body_field.clone()
            }

            fn to_dimensions(&self, mode: $crate::schema::MarshalMode) -> $crate::error::Result<std::collections::HashMap<String, $crate::value::Value>> {
                let dims = Self::dimension_schema()?;
                let mut out = std::collections::HashMap::new();
                $(
                    $crate::schema::emit_enumerated(&mut out, &dims, stringify!($e_field), &self.$e_field, mode);
                )*
                $(
                    $crate::schema::emit_hierarchical(&mut out, $h_ref, self.$h_field.as_deref());
                )*
                $(
                    $crate::schema::emit_data(&mut out, stringify!($d_field), $crate::value::Value::String(self.$d_field.clone()), mode);
                )*
                Ok(out)
            }

            fn from_document(doc: &$crate::document::Document) -> $crate::error::Result<Self> {
                let dims = Self::dimension_schema()?;
                Ok(Self {
                    $title_field: doc.title.clone(),
                    $body_field: doc.body.clone(),
                    $(
                        $e_field: doc.dimension_value(&dims, stringify!($e_field)).unwrap_or_default().to_string(),
                    )*
                    $(
                        $h_field: doc.ref_value($h_ref).map(|s| s.to_string()),
                    )*
                    $(
                        $d_field: doc.data_value(stringify!($d_field)).and_then($crate::value::Value::as_str).unwrap_or_default().to_string(),
                    )*
                })
            }
        }
    };
}
