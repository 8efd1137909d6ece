//! Capability contract for the remote document/blob store.
//!
//! The console never talks to the backing store directly; every read and
//! write goes through [`RecordStore`]. Implementations carry no business
//! logic, and no operation is assumed atomic across calls.

use std::cmp::Ordering;
use std::fmt;

use async_trait::async_trait;
use serde_json::{Map, Value};

/// Logical collections the console reads from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Collection {
    Agents,
    Users,
}

impl Collection {
    pub const fn name(self) -> &'static str {
        match self {
            Collection::Agents => "agents",
            Collection::Users => "users",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Raw document as returned by the store.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub id: String,
    pub fields: Map<String, Value>,
}

impl Record {
    pub fn new(id: impl Into<String>, fields: Map<String, Value>) -> Self {
        Self {
            id: id.into(),
            fields,
        }
    }
}

/// Single `field == value` test.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldEquals {
    pub field: String,
    pub value: Value,
}

/// Conjunction of field-equality tests. An empty filter matches every record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    clauses: Vec<FieldEquals>,
}

impl Filter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn field_eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::all().and_eq(field, value)
    }

    pub fn and_eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.clauses.push(FieldEquals {
            field: field.into(),
            value: value.into(),
        });
        self
    }

    pub fn clauses(&self) -> &[FieldEquals] {
        &self.clauses
    }

    /// Missing fields never compare equal, mirroring document-store semantics.
    pub fn matches(&self, fields: &Map<String, Value>) -> bool {
        self.clauses
            .iter()
            .all(|clause| fields.get(&clause.field) == Some(&clause.value))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

/// Single-field ordering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    pub field: String,
    pub direction: Direction,
}

impl OrderBy {
    pub fn ascending(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: Direction::Ascending,
        }
    }

    pub fn descending(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: Direction::Descending,
        }
    }

    /// Compares two documents on the ordering field. Documents lacking the
    /// field sort last in either direction; incomparable values tie.
    pub fn compare(&self, left: &Map<String, Value>, right: &Map<String, Value>) -> Ordering {
        let present = |fields: &Map<String, Value>| {
            fields
                .get(&self.field)
                .filter(|value| !value.is_null())
                .cloned()
        };
        match (present(left), present(right)) {
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Greater,
            (Some(_), None) => Ordering::Less,
            (Some(a), Some(b)) => {
                let ordering = compare_values(&a, &b);
                match self.direction {
                    Direction::Ascending => ordering,
                    Direction::Descending => ordering.reverse(),
                }
            }
        }
    }
}

fn compare_values(left: &Value, right: &Value) -> Ordering {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => match (a.as_f64(), b.as_f64()) {
            (Some(a), Some(b)) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
            _ => Ordering::Equal,
        },
        (Value::String(a), Value::String(b)) => a.cmp(b),
        (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
        _ => Ordering::Equal,
    }
}

/// Partial update; untouched fields are preserved by the store.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldPatch {
    fields: Map<String, Value>,
}

impl FieldPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(field.into(), value.into());
        self
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Failures surfaced by a store adapter.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("{collection}/{id} not found")]
    NotFound { collection: &'static str, id: String },
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("permission denied: {0}")]
    PermissionDenied(String),
}

impl StoreError {
    pub fn not_found(collection: Collection, id: impl Into<String>) -> Self {
        StoreError::NotFound {
            collection: collection.name(),
            id: id.into(),
        }
    }
}

/// Minimal capability set the console needs from the remote store.
///
/// Every call is a suspension point and may fail with a transport or
/// permission error. Callers attempt each call at most once per action.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn get_by_id(&self, collection: Collection, id: &str) -> Result<Record, StoreError>;

    async fn list_where(
        &self,
        collection: Collection,
        filter: &Filter,
        order_by: Option<&OrderBy>,
    ) -> Result<Vec<Record>, StoreError>;

    async fn update_fields(
        &self,
        collection: Collection,
        id: &str,
        patch: &FieldPatch,
    ) -> Result<(), StoreError>;

    /// Set-difference removal of `value` from an array field.
    async fn remove_from_array_field(
        &self,
        collection: Collection,
        id: &str,
        field: &str,
        value: &Value,
    ) -> Result<(), StoreError>;

    async fn delete_blob(&self, path: &str) -> Result<(), StoreError>;
}
