//! Filters and updates understood by every [`DocumentStore`](crate::DocumentStore).

use docmodel_types::Document;
use serde_json::Value;
use std::cmp::Ordering;

/// A document predicate.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// Matches every document.
    All,
    Eq(String, Value),
    In(String, Vec<Value>),
    NotIn(String, Vec<Value>),
    Gte(String, Value),
    Lt(String, Value),
    And(Vec<Filter>),
}

impl Filter {
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Eq(field.into(), value.into())
    }

    pub fn is_in<V: Into<Value>>(field: impl Into<String>, values: impl IntoIterator<Item = V>) -> Self {
        Self::In(field.into(), values.into_iter().map(Into::into).collect())
    }

    pub fn not_in<V: Into<Value>>(field: impl Into<String>, values: impl IntoIterator<Item = V>) -> Self {
        Self::NotIn(field.into(), values.into_iter().map(Into::into).collect())
    }

    pub fn gte(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Gte(field.into(), value.into())
    }

    pub fn lt(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Lt(field.into(), value.into())
    }

    /// Conjunction; nested `And`s are flattened.
    pub fn and(self, other: Filter) -> Self {
        match (self, other) {
            (Self::All, f) | (f, Self::All) => f,
            (Self::And(mut a), Self::And(b)) => {
                a.extend(b);
                Self::And(a)
            }
            (Self::And(mut a), f) => {
                a.push(f);
                Self::And(a)
            }
            (f, Self::And(mut b)) => {
                b.insert(0, f);
                Self::And(b)
            }
            (a, b) => Self::And(vec![a, b]),
        }
    }

    pub fn matches(&self, doc: &Document) -> bool {
        match self {
            Self::All => true,
            Self::Eq(field, value) => doc.get(field).is_some_and(|v| values_equal(v, value)),
            Self::In(field, values) => doc
                .get(field)
                .is_some_and(|v| values.iter().any(|candidate| values_equal(v, candidate))),
            Self::NotIn(field, values) => match doc.get(field) {
                Some(v) => !values.iter().any(|candidate| values_equal(v, candidate)),
                None => true,
            },
            Self::Gte(field, bound) => doc
                .get(field)
                .and_then(|v| compare_values(v, bound))
                .is_some_and(|ord| ord != Ordering::Less),
            Self::Lt(field, bound) => doc
                .get(field)
                .and_then(|v| compare_values(v, bound))
                .is_some_and(|ord| ord == Ordering::Less),
            Self::And(filters) => filters.iter().all(|f| f.matches(doc)),
        }
    }

    /// The equality conditions of this filter as a document. Query
    /// middleware receives this as its in-progress document.
    pub fn conditions(&self) -> Document {
        let mut doc = Document::new();
        self.collect_conditions(&mut doc);
        doc
    }

    fn collect_conditions(&self, doc: &mut Document) {
        match self {
            Self::Eq(field, value) => {
                doc.set(field.clone(), value.clone());
            }
            Self::And(filters) => filters.iter().for_each(|f| f.collect_conditions(doc)),
            _ => {}
        }
    }
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_i64(), y.as_i64()) {
            (Some(x), Some(y)) => Some(x.cmp(&y)),
            _ => x.as_f64()?.partial_cmp(&y.as_f64()?),
        },
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

/// Field assignments applied by an update.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Update {
    set: Document,
}

impl Update {
    pub fn set(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::default().and_set(field, value)
    }

    pub fn and_set(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set.set(field, value);
        self
    }

    pub fn apply(&self, doc: &mut Document) {
        for (field, value) in self.set.iter() {
            doc.set(field.clone(), value.clone());
        }
    }

    pub fn is_empty(&self) -> bool {
        self.set.is_empty()
    }
}

/// Replaces a reference field with the referenced document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Populate {
    /// The reference field to expand.
    pub path: String,
    /// Fields of the referenced document to keep. `None` keeps all; the
    /// referenced primary key is always kept.
    pub select: Option<Vec<String>>,
}

impl Populate {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            select: None,
        }
    }

    pub fn select(mut self, fields: Option<Vec<String>>) -> Self {
        self.select = fields;
        self
    }
}

/// Options for `find_one_and_update`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateOptions {
    /// Return the document after the update instead of before.
    pub return_new: bool,
    pub populate: Option<Populate>,
}

impl Default for UpdateOptions {
    fn default() -> Self {
        Self {
            return_new: true,
            populate: None,
        }
    }
}
