use std::fmt;

use futures::future::BoxFuture;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::errors::MeetlyError;

pub mod memory;

/// The fields of a document, keyed by name.
pub type Document = Map<String, Value>;

/// The named collections the core reads and writes.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub enum Collection {
    /// Profiles, keyed by uid.
    Users,
    /// Meetings, keyed by store-assigned id.
    Posts,
}

impl Collection {
    pub fn name(self) -> &'static str {
        match self {
            Collection::Users => "users",
            Collection::Posts => "posts",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A document together with its id.
#[derive(Clone, Debug, PartialEq)]
pub struct StoredDocument {
    pub id: String,
    pub fields: Document,
}

/// A filter on a single (possibly dotted) field path.
#[derive(Clone, Debug, PartialEq)]
pub enum Predicate {
    /// Numeric field within `[min, max]`.
    Range { field: String, min: f64, max: f64 },
    /// Field equal to `value`.
    Equals { field: String, value: Value },
    /// Array field sharing at least one element with `values`.
    ArrayContainsAny { field: String, values: Vec<Value> },
}

impl Predicate {
    pub fn range(field: impl Into<String>, min: f64, max: f64) -> Self {
        Predicate::Range {
            field: field.into(),
            min,
            max,
        }
    }

    pub fn equals(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Predicate::Equals {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn array_contains_any(field: impl Into<String>, values: Vec<Value>) -> Self {
        Predicate::ArrayContainsAny {
            field: field.into(),
            values,
        }
    }

    /// Evaluates the predicate against a document. Missing fields never
    /// match.
    pub fn matches(&self, document: &Document) -> bool {
        match self {
            Predicate::Range { field, min, max } => lookup(document, field)
                .and_then(Value::as_f64)
                .map_or(false, |v| v >= *min && v <= *max),
            Predicate::Equals { field, value } => lookup(document, field) == Some(value),
            Predicate::ArrayContainsAny { field, values } => lookup(document, field)
                .and_then(Value::as_array)
                .map_or(false, |elements| elements.iter().any(|e| values.contains(e))),
        }
    }
}

/// A single-field mutation applied by `DocumentStore::update`.
#[derive(Clone, Debug, PartialEq)]
pub enum FieldOp {
    Set { field: String, value: Value },
    /// Appends each value not already present.
    ArrayUnion { field: String, values: Vec<Value> },
    /// Removes every occurrence of each value.
    ArrayRemove { field: String, values: Vec<Value> },
}

impl FieldOp {
    pub fn set(field: impl Into<String>, value: impl Into<Value>) -> Self {
        FieldOp::Set {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn union(field: impl Into<String>, value: impl Into<Value>) -> Self {
        FieldOp::ArrayUnion {
            field: field.into(),
            values: vec![value.into()],
        }
    }

    pub fn remove(field: impl Into<String>, value: impl Into<Value>) -> Self {
        FieldOp::ArrayRemove {
            field: field.into(),
            values: vec![value.into()],
        }
    }
}

/// A document database without cross-document transactions. Each call
/// is atomic for the single document it touches.
pub trait DocumentStore: Send + Sync {
    /// Fetches a document, or `None` if it does not exist.
    fn get(
        &self,
        collection: Collection,
        id: &str,
    ) -> BoxFuture<Result<Option<StoredDocument>, MeetlyError>>;

    /// Returns the documents matching every predicate.
    fn query(
        &self,
        collection: Collection,
        predicates: Vec<Predicate>,
    ) -> BoxFuture<Result<Vec<StoredDocument>, MeetlyError>>;

    /// Creates or replaces the document under `id`.
    fn set(
        &self,
        collection: Collection,
        id: &str,
        fields: Document,
    ) -> BoxFuture<Result<(), MeetlyError>>;

    /// Creates a document under a store-assigned id and returns the id.
    fn add(&self, collection: Collection, fields: Document) -> BoxFuture<Result<String, MeetlyError>>;

    /// Applies field operations to an existing document.
    fn update(
        &self,
        collection: Collection,
        id: &str,
        ops: Vec<FieldOp>,
    ) -> BoxFuture<Result<(), MeetlyError>>;

    /// Deletes an existing document.
    fn delete(&self, collection: Collection, id: &str) -> BoxFuture<Result<(), MeetlyError>>;

    /// Whether `query` understands `Predicate::ArrayContainsAny`. When it
    /// does not, callers filter on the client after fetching.
    fn supports_array_contains_any(&self) -> bool {
        true
    }
}

/// Serializes a typed entity into document fields.
pub fn to_document<T: Serialize>(value: &T) -> Result<Document, MeetlyError> {
    match serde_json::to_value(value)? {
        Value::Object(fields) => Ok(fields),
        other => Err(MeetlyError::invalid(format!(
            "expected an object, got {}",
            other
        ))),
    }
}

/// Decodes document fields into a typed entity.
pub fn from_document<T: DeserializeOwned>(fields: Document) -> Result<T, MeetlyError> {
    Ok(serde_json::from_value(Value::Object(fields))?)
}

/// Follows a dotted path such as `location.latitude`.
pub fn lookup<'a>(document: &'a Document, path: &str) -> Option<&'a Value> {
    let mut segments = path.split('.');
    let mut current = document.get(segments.next()?)?;

    for segment in segments {
        current = current.as_object()?.get(segment)?;
    }

    Some(current)
}

/// Applies `ops` in order. Array operations on a missing field treat it
/// as empty; on a non-array field they fail.
pub fn apply(document: &mut Document, ops: &[FieldOp]) -> Result<(), MeetlyError> {
    for op in ops {
        match op {
            FieldOp::Set { field, value } => {
                *slot(document, field)? = value.clone();
            }
            FieldOp::ArrayUnion { field, values } => {
                let elements = array_slot(document, field)?;

                for value in values {
                    if !elements.contains(value) {
                        elements.push(value.clone());
                    }
                }
            }
            FieldOp::ArrayRemove { field, values } => {
                let elements = array_slot(document, field)?;
                elements.retain(|e| !values.contains(e));
            }
        }
    }

    Ok(())
}

fn slot<'a>(document: &'a mut Document, path: &str) -> Result<&'a mut Value, MeetlyError> {
    let mut segments = path.split('.').peekable();
    let mut current = document;

    loop {
        let segment = segments
            .next()
            .ok_or_else(|| MeetlyError::invalid("empty field path"))?;

        if segments.peek().is_none() {
            return Ok(current.entry(segment).or_insert(Value::Null));
        }

        let next = current
            .entry(segment)
            .or_insert_with(|| Value::Object(Map::new()));

        current = next
            .as_object_mut()
            .ok_or_else(|| MeetlyError::invalid(format!("{} is not an object", segment)))?;
    }
}

fn array_slot<'a>(document: &'a mut Document, path: &str) -> Result<&'a mut Vec<Value>, MeetlyError> {
    let value = slot(document, path)?;

    if value.is_null() {
        *value = Value::Array(vec![]);
    }

    value
        .as_array_mut()
        .ok_or_else(|| MeetlyError::invalid(format!("{} is not an array", path)))
}
