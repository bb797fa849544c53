//! The fluent query builder
//!
//! An immutable-by-append accumulator: every helper returns `Self` (or
//! `Result<Self>` when the call can fail validation), appending to one of
//! `filter`/`order_by`/`limit`/`offset`/`free_text`. Nothing executes until
//! a terminal method runs, and running one never mutates the builder it was
//! called on (it's consumed by value).
//!
//! There is no `Call("xxx")` dynamic dispatch surface here: this is a closed
//! vocabulary of typed methods plus `with_filter` as the deliberate escape
//! hatch for anything the closed vocabulary doesn't name.

use std::collections::HashSet;
use std::marker::PhantomData;

use uuid::Uuid;

use crate::dimension::DimensionSet;
use crate::document::strip_data_prefix;
use crate::error::{Error, Result};
use crate::filter::{Clause, FilterSet, OneOrMany, OrderClause, OrderColumn};
use crate::schema::Recordable;
use crate::store::{ListOptions, Store};
use crate::value::Value;

pub struct QueryBuilder<'a, T: Recordable> {
    store: &'a Store,
    filter: FilterSet,
    order_by: Vec<OrderClause>,
    limit: Option<i64>,
    offset: Option<i64>,
    _marker: PhantomData<T>,
}

impl<'a, T: Recordable> QueryBuilder<'a, T> {
    pub(crate) fn new(store: &'a Store) -> Self {
        Self {
            store,
            filter: FilterSet::default(),
            order_by: Vec::new(),
            limit: None,
            offset: None,
            _marker: PhantomData,
        }
    }

    fn dims(&self) -> &DimensionSet {
        self.store.dimensions()
    }

    fn canonical_data_field(&self, input: &str) -> Result<String> {
        canonical_data_field(T::data_fields(), input)
    }

    /// Raw escape hatch: add an arbitrary dimension-equality filter by key,
    /// bypassing the closed-vocabulary helpers below, without resurrecting
    /// sentinel-key hacks for it.
    pub fn with_filter(mut self, dimension: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filter.clauses.push(Clause::Dimension {
            name: dimension.into(),
            values: OneOrMany::One(value.into().display()),
        });
        self
    }

    pub fn dimension(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.filter.clauses.push(Clause::Dimension {
            name: name.into(),
            values: OneOrMany::One(value.into()),
        });
        self
    }

    pub fn dimension_in(mut self, name: impl Into<String>, values: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.filter.clauses.push(Clause::Dimension {
            name: name.into(),
            values: OneOrMany::Many(values.into_iter().map(Into::into).collect()),
        });
        self
    }

    /// `<Dim>Not(v)`: compiles to membership over the complement of `v`,
    /// derived from the dimension set rather than hardcoded.
    pub fn dimension_not(mut self, name: &str, value: &str) -> Result<Self> {
        let dim = self
            .dims()
            .find(name)
            .ok_or_else(|| Error::InvalidValue(format!("unknown dimension '{name}'")))?;
        let complement = dim.complement_of(value);
        self.filter.clauses.push(Clause::Dimension {
            name: name.to_string(),
            values: OneOrMany::Many(complement),
        });
        Ok(self)
    }

    pub fn uuid(mut self, uuid: Uuid) -> Self {
        self.filter.clauses.push(Clause::Uuid(OneOrMany::One(uuid)));
        self
    }

    pub fn uuid_in(mut self, uuids: impl IntoIterator<Item = Uuid>) -> Self {
        self.filter.clauses.push(Clause::Uuid(OneOrMany::Many(uuids.into_iter().collect())));
        self
    }

    /// `<Ref>(id)`: `id` may be a SimpleID or UUID, resolved during
    /// execution against the live snapshot.
    pub fn reference(mut self, ref_field: impl Into<String>, id: impl Into<String>) -> Self {
        self.filter.clauses.push(Clause::Ref {
            field: ref_field.into(),
            value: id.into(),
        });
        self
    }

    pub fn reference_not_exists(mut self, ref_field: impl Into<String>) -> Self {
        self.filter.clauses.push(Clause::RefNotExists { field: ref_field.into() });
        self
    }

    pub fn data(mut self, field: &str, value: impl Into<Value>) -> Result<Self> {
        let field = self.canonical_data_field(field)?;
        self.filter.clauses.push(Clause::Data {
            field,
            values: OneOrMany::One(value.into()),
        });
        Ok(self)
    }

    pub fn data_in(mut self, field: &str, values: impl IntoIterator<Item = impl Into<Value>>) -> Result<Self> {
        let field = self.canonical_data_field(field)?;
        self.filter.clauses.push(Clause::Data {
            field,
            values: OneOrMany::Many(values.into_iter().map(Into::into).collect()),
        });
        Ok(self)
    }

    pub fn data_not(mut self, field: &str, value: impl Into<Value>) -> Result<Self> {
        let field = self.canonical_data_field(field)?;
        self.filter.clauses.push(Clause::DataNot { field, value: value.into() });
        Ok(self)
    }

    pub fn data_not_in(mut self, field: &str, values: impl IntoIterator<Item = impl Into<Value>>) -> Result<Self> {
        let field = self.canonical_data_field(field)?;
        self.filter.clauses.push(Clause::DataNotIn {
            field,
            values: values.into_iter().map(Into::into).collect(),
        });
        Ok(self)
    }

    pub fn text(mut self, query: impl Into<String>) -> Self {
        self.filter.free_text = Some(query.into());
        self
    }

    pub fn order_by(mut self, column: &str, descending: bool) -> Result<Self> {
        let column = parse_order_column(self.dims(), T::data_fields(), column)?;
        self.order_by.push(OrderClause { column, descending });
        Ok(self)
    }

    pub fn order_by_data(self, field: &str) -> Result<Self> {
        self.order_by(&format!("_data.{field}"), false)
    }

    pub fn order_by_data_desc(self, field: &str) -> Result<Self> {
        self.order_by(&format!("_data.{field}"), true)
    }

    pub fn limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: i64) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Kept for API compatibility; never matches anything.
    pub fn where_raw(self, _sql_fragment: &str, _args: &[Value]) -> Result<Self> {
        Err(Error::Unsupported(
            "where_raw has no predicate DSL implementation; use the typed filter helpers".into(),
        ))
    }

    fn options(&self) -> ListOptions {
        ListOptions {
            filter: self.filter.clone(),
            order_by: self.order_by.clone(),
            limit: self.limit,
            offset: self.offset,
        }
    }

    pub fn find(&self) -> Result<Vec<T>> {
        self.store
            .list(self.options())?
            .iter()
            .map(|view| T::from_document(&view.document))
            .collect()
    }

    pub fn first(&self) -> Result<Option<T>> {
        let mut opts = self.options();
        opts.limit = Some(1);
        let mut views = self.store.list(opts)?;
        match views.pop() {
            Some(view) => Ok(Some(T::from_document(&view.document)?)),
            None => Ok(None),
        }
    }

    /// Expects exactly one match; fails otherwise.
    pub fn get(&self) -> Result<T> {
        let views = self.store.list(self.options())?;
        match views.len() {
            1 => T::from_document(&views[0].document),
            0 => Err(Error::not_found("query matched no documents")),
            n => Err(Error::InvalidValue(format!("query matched {n} documents, expected exactly one"))),
        }
    }

    pub fn count(&self) -> Result<usize> {
        Ok(self.store.list(self.options())?.len())
    }

    pub fn exists(&self) -> Result<bool> {
        Ok(self.count()? > 0)
    }
}

fn canonical_data_field(fields: &[&'static str], input: &str) -> Result<String> {
    if fields.contains(&input) {
        return Ok(input.to_string());
    }
    if let Some(found) = fields.iter().find(|f| f.eq_ignore_ascii_case(input)) {
        tracing::warn!(
            requested = input,
            canonical = *found,
            "data field name is not canonical snake_case; auto-correcting (deprecated, prefer snake_case)"
        );
        return Ok(found.to_string());
    }
    Err(Error::InvalidValue(format!(
        "unknown data field '{input}': valid data fields are [{}]",
        fields.join(", ")
    )))
}

fn parse_order_column(dims: &DimensionSet, data_fields: &[&'static str], column: &str) -> Result<OrderColumn> {
    match column {
        "title" => return Ok(OrderColumn::Title),
        "created_at" => return Ok(OrderColumn::CreatedAt),
        "updated_at" => return Ok(OrderColumn::UpdatedAt),
        _ => {}
    }
    if let Some(field) = strip_data_prefix(column) {
        let canonical = canonical_data_field(data_fields, field)?;
        return Ok(OrderColumn::Data(canonical));
    }
    if dims.contains(column) {
        return Ok(OrderColumn::Dimension(column.to_string()));
    }
    Err(Error::InvalidValue(format!(
        "unknown order-by column '{column}': expected a dimension name, 'title', 'created_at', 'updated_at', or '_data.<field>'"
    )))
}

/// Convenience alias so callers doing ad-hoc UUID-set bulk operations don't
/// need to spell out `HashSet` themselves.
pub type UuidSet = HashSet<Uuid>;
