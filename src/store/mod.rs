//! Document store capability: collection-scoped CRUD over schemaless JSON documents.
//! `PgDocumentStore` keeps documents as JSONB in PostgreSQL; `MemoryDocumentStore` keeps them in process.

mod memory;
mod postgres;

pub use memory::MemoryDocumentStore;
pub use postgres::{ensure_database_exists, PgDocumentStore};
pub(crate) use postgres::quote_ident;

use crate::error::AppError;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// A schemaless document body. Key order is preserved.
pub type Document = Map<String, Value>;

/// Store-generated document identity. Round-trips through its string form.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct DocId(uuid::Uuid);

impl DocId {
    pub fn generate() -> Self {
        DocId(uuid::Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &uuid::Uuid {
        &self.0
    }
}

impl From<uuid::Uuid> for DocId {
    fn from(u: uuid::Uuid) -> Self {
        DocId(u)
    }
}

impl FromStr for DocId {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        uuid::Uuid::parse_str(s.trim())
            .map(DocId)
            .map_err(|_| AppError::Validation(format!("invalid document id '{}'", s)))
    }
}

impl fmt::Display for DocId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Names a collection. A plain value: it does not hold a connection and the collection need not exist.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CollectionHandle {
    name: String,
}

impl CollectionHandle {
    pub fn new(name: &str) -> Result<Self, AppError> {
        if name.is_empty() {
            return Err(AppError::Validation("collection name must not be empty".into()));
        }
        if name.contains('$') || name.chars().any(char::is_control) {
            return Err(AppError::Validation(format!(
                "collection name '{}' contains a forbidden character",
                name.escape_default()
            )));
        }
        Ok(CollectionHandle { name: name.to_string() })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Names under `system.` belong to the store and cannot receive documents.
    pub fn is_reserved(&self) -> bool {
        self.name.starts_with("system.")
    }

    pub(crate) fn check_writable(&self) -> Result<(), AppError> {
        if self.is_reserved() {
            return Err(AppError::Store(format!("collection '{}' is reserved", self.name)));
        }
        Ok(())
    }
}

/// Document selector. Field equality applies to top-level keys only.
#[derive(Clone, Debug, PartialEq)]
pub enum Filter {
    All,
    Id(DocId),
    Field { name: String, value: Value },
}

impl Filter {
    pub fn field(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::Field {
            name: name.into(),
            value: value.into(),
        }
    }

    pub fn matches(&self, id: &DocId, body: &Document) -> bool {
        match self {
            Filter::All => true,
            Filter::Id(want) => want == id,
            Filter::Field { name, value } => body.get(name) == Some(value),
        }
    }
}

/// A document together with its id. The id is never part of `body`.
#[derive(Clone, Debug, PartialEq)]
pub struct StoredDocument {
    pub id: DocId,
    pub body: Document,
}

impl StoredDocument {
    /// Body with the stringified id under `_id`, first in key order.
    pub fn to_json_with_id(&self) -> Value {
        let mut out = Map::with_capacity(self.body.len() + 1);
        out.insert(ID_KEY.to_string(), Value::String(self.id.to_string()));
        for (k, v) in &self.body {
            if k != ID_KEY {
                out.insert(k.clone(), v.clone());
            }
        }
        Value::Object(out)
    }
}

/// Key under which ids are exposed to views and forms.
pub const ID_KEY: &str = "_id";

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Cheap connectivity check.
    async fn ping(&self) -> Result<(), AppError>;

    async fn list_collections(&self) -> Result<Vec<String>, AppError>;

    /// Matching documents in insertion order.
    async fn find(&self, coll: &CollectionHandle, filter: &Filter) -> Result<Vec<StoredDocument>, AppError>;

    async fn find_one(&self, coll: &CollectionHandle, filter: &Filter) -> Result<Option<StoredDocument>, AppError>;

    /// Insert, creating the collection if needed. Returns the generated id.
    async fn insert_one(&self, coll: &CollectionHandle, doc: Document) -> Result<DocId, AppError>;

    /// Merge: set the given keys, keep every other key. Returns false when no document matched.
    async fn update_one(&self, coll: &CollectionHandle, id: &DocId, set: Document) -> Result<bool, AppError>;

    /// Remove the given keys. Returns false when no document matched.
    async fn unset_fields(&self, coll: &CollectionHandle, id: &DocId, keys: &[String]) -> Result<bool, AppError>;

    /// Full replace: the stored body becomes exactly `doc`. Returns false when no document matched.
    async fn replace_one(&self, coll: &CollectionHandle, id: &DocId, doc: Document) -> Result<bool, AppError>;

    async fn delete_one(&self, coll: &CollectionHandle, id: &DocId) -> Result<bool, AppError>;

    /// Drop the collection and all its documents. Returns false when it did not exist.
    async fn drop_collection(&self, coll: &CollectionHandle) -> Result<bool, AppError>;
}
