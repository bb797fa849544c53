//! The typed filter AST
//!
//! Every filter kind is a first-class enum variant rather than a sentinel
//! string key smuggled into a generic map (`__parent_not_exists__`,
//! `__data_not__<field>`, and the like never existed here). Every `Clause`
//! in a `FilterSet` is ANDed together; there is no OR between clauses,
//! only within a single clause's membership list (distinct clauses combine
//! by conjunction; a single clause's list value is a disjunction).

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::dimension::DimensionSet;
use crate::document::Document;
use crate::value::{partial_cmp, Value};

/// A scalar-or-list value: a filter column accepts either a single scalar or
/// a list of scalars to match against.
#[derive(Debug, Clone)]
pub enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> OneOrMany<T> {
    pub fn iter(&self) -> Box<dyn Iterator<Item = &T> + '_> {
        match self {
            OneOrMany::One(v) => Box::new(std::iter::once(v)),
            OneOrMany::Many(vs) => Box::new(vs.iter()),
        }
    }
}

impl<T> From<T> for OneOrMany<T> {
    fn from(v: T) -> Self {
        OneOrMany::One(v)
    }
}

impl<T> From<Vec<T>> for OneOrMany<T> {
    fn from(v: Vec<T>) -> Self {
        OneOrMany::Many(v)
    }
}

#[derive(Debug, Clone)]
pub enum Clause {
    /// `<dimension> = scalar` or `<dimension> IN (...)`.
    Dimension { name: String, values: OneOrMany<String> },
    /// `uuid = scalar` or `uuid IN (...)`; the identity filter.
    Uuid(OneOrMany<Uuid>),
    /// A hierarchical reference field filter. `value` may be a SimpleID or a
    /// UUID; it is resolved against a live snapshot via `resolve_refs`
    /// before evaluation.
    Ref { field: String, value: String },
    /// A reference field with no value at all; a first-class variant
    /// instead of a `__parent_not_exists__` sentinel key.
    RefNotExists { field: String },
    /// `_data.<field>` equality/membership.
    Data { field: String, values: OneOrMany<Value> },
    /// Negated data-field equality; replaces `__data_not__<field>`.
    DataNot { field: String, value: Value },
    /// Negated data-field membership; replaces `__data_not_in__<field>`.
    DataNotIn { field: String, values: Vec<Value> },
    /// `created_at`/`updated_at` equality (scalar or list of instants).
    Temporal { field: String, values: OneOrMany<DateTime<Utc>> },
}

impl Clause {
    /// Resolve any reference value that looks like a SimpleID into the
    /// matching UUID, using the live document snapshot. Unresolvable values
    /// are left as given.
    pub fn resolve_refs(self, dims: &DimensionSet, docs: &[Document]) -> Clause {
        match self {
            Clause::Ref { field, value } => {
                let resolved = crate::simpleid::resolve(dims, docs, &value)
                    .map(|u| u.to_string())
                    .unwrap_or(value);
                Clause::Ref { field, value: resolved }
            }
            other => other,
        }
    }

    pub fn matches(&self, dims: &DimensionSet, doc: &Document) -> bool {
        match self {
            Clause::Dimension { name, values } => match doc.dimension_value(dims, name) {
                Some(actual) => values.iter().any(|v| v == actual),
                None => false,
            },
            Clause::Uuid(values) => values.iter().any(|u| *u == doc.uuid),
            Clause::Ref { field, value } => doc.ref_value(field) == Some(value.as_str()),
            Clause::RefNotExists { field } => doc.ref_value(field).is_none(),
            Clause::Data { field, values } => match doc.data_value(field) {
                Some(actual) => values.iter().any(|v| v == actual),
                None => false,
            },
            Clause::DataNot { field, value } => doc.data_value(field) != Some(value),
            Clause::DataNotIn { field, values } => match doc.data_value(field) {
                Some(actual) => !values.contains(actual),
                None => true,
            },
            Clause::Temporal { field, values } => {
                let actual = match field.as_str() {
                    "created_at" => doc.created_at,
                    "updated_at" => doc.updated_at,
                    _ => return false,
                };
                values.iter().any(|v| *v == actual)
            }
        }
    }
}

/// An ANDed collection of clauses plus an optional substring text search.
#[derive(Debug, Clone, Default)]
pub struct FilterSet {
    pub clauses: Vec<Clause>,
    pub free_text: Option<String>,
}

impl FilterSet {
    pub fn matches(&self, dims: &DimensionSet, doc: &Document) -> bool {
        if !self.clauses.iter().all(|c| c.matches(dims, doc)) {
            return false;
        }
        if let Some(q) = &self.free_text {
            let q = q.to_lowercase();
            if !doc.title.to_lowercase().contains(&q) && !doc.body.to_lowercase().contains(&q) {
                return false;
            }
        }
        true
    }

    pub fn resolve_refs(&mut self, dims: &DimensionSet, docs: &[Document]) {
        let clauses = std::mem::take(&mut self.clauses);
        self.clauses = clauses.into_iter().map(|c| c.resolve_refs(dims, docs)).collect();
    }
}

/// An ordering clause: the column to sort by and whether it is descending.
#[derive(Debug, Clone)]
pub enum OrderColumn {
    Dimension(String),
    Title,
    CreatedAt,
    UpdatedAt,
    Data(String),
}

#[derive(Debug, Clone)]
pub struct OrderClause {
    pub column: OrderColumn,
    pub descending: bool,
}

/// Compare two documents on one ordering column. `None` means the column is
/// absent on one or both sides; both-absent compares equal, one-sided
/// absence sorts the absent side last regardless of direction.
pub fn compare(dims: &DimensionSet, a: &Document, b: &Document, clause: &OrderClause) -> std::cmp::Ordering {
    use std::cmp::Ordering;

    let ord = match &clause.column {
        OrderColumn::Title => Some(a.title.cmp(&b.title)),
        OrderColumn::CreatedAt => Some(a.created_at.cmp(&b.created_at)),
        OrderColumn::UpdatedAt => Some(a.updated_at.cmp(&b.updated_at)),
        OrderColumn::Dimension(name) => {
            let av = a.dimension_value(dims, name);
            let bv = b.dimension_value(dims, name);
            match (av, bv) {
                (Some(av), Some(bv)) => Some(av.cmp(bv)),
                (None, None) => Some(Ordering::Equal),
                (None, Some(_)) => Some(Ordering::Greater),
                (Some(_), None) => Some(Ordering::Less),
            }
        }
        OrderColumn::Data(field) => {
            let av = a.data_value(field);
            let bv = b.data_value(field);
            match (av, bv) {
                (Some(av), Some(bv)) => partial_cmp(av, bv),
                (None, None) => Some(Ordering::Equal),
                (None, Some(_)) => Some(Ordering::Greater),
                (Some(_), None) => Some(Ordering::Less),
            }
        }
    }
    .unwrap_or(Ordering::Equal);

    if clause.descending {
        ord.reverse()
    } else {
        ord
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dimension::{Dimension, DimensionSet, PrefixMap};
    use std::collections::HashMap;

    fn dims() -> DimensionSet {
        DimensionSet::new(vec![Dimension::enumerated(
            "status",
            vec!["pending".into(), "done".into()],
            PrefixMap::new(),
            Some("pending".into()),
        )])
        .unwrap()
    }

    fn doc(status: &str) -> Document {
        let mut dimensions = HashMap::new();
        dimensions.insert("status".to_string(), Value::String(status.to_string()));
        Document {
            uuid: Uuid::new_v4(),
            title: "t".into(),
            body: "b".into(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
            dimensions,
        }
    }

    #[test]
    fn dimension_equality() {
        let dims = dims();
        let clause = Clause::Dimension {
            name: "status".into(),
            values: OneOrMany::One("done".into()),
        };
        assert!(clause.matches(&dims, &doc("done")));
        assert!(!clause.matches(&dims, &doc("pending")));
    }

    #[test]
    fn data_not_in_absent_field_matches() {
        let dims = dims();
        let clause = Clause::DataNotIn {
            field: "assignee".into(),
            values: vec![Value::String("bob".into())],
        };
        assert!(clause.matches(&dims, &doc("pending")));
    }
}
