//! Collection-name-based CRUD over any `DocumentStore`, plus schema metadata in `_meta`.

use crate::error::AppError;
use crate::schema::SchemaRecord;
use crate::store::{CollectionHandle, DocId, Document, DocumentStore, Filter, StoredDocument};
use serde_json::Value;
use std::sync::Arc;

/// Collection holding one `SchemaRecord` per described collection.
pub const META_COLLECTION: &str = "_meta";

const SELF_CHECK_COLLECTION: &str = "__test_collection";

#[derive(Clone)]
pub struct Gateway {
    store: Arc<dyn DocumentStore>,
}

impl Gateway {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Gateway { store }
    }

    pub fn collection(&self, name: &str) -> Result<CollectionHandle, AppError> {
        CollectionHandle::new(name)
    }

    pub fn parse_id(&self, id: &str) -> Result<DocId, AppError> {
        id.parse()
    }

    pub async fn ping(&self) -> Result<(), AppError> {
        self.store.ping().await
    }

    pub async fn list_collections(&self) -> Result<Vec<String>, AppError> {
        self.store.list_collections().await
    }

    pub async fn find(&self, coll: &str, filter: &Filter) -> Result<Vec<StoredDocument>, AppError> {
        self.store.find(&self.collection(coll)?, filter).await
    }

    pub async fn find_one(&self, coll: &str, filter: &Filter) -> Result<Option<StoredDocument>, AppError> {
        self.store.find_one(&self.collection(coll)?, filter).await
    }

    /// Fetch by id or fail with `NotFound`.
    pub async fn get(&self, coll: &str, id: &DocId) -> Result<StoredDocument, AppError> {
        self.find_one(coll, &Filter::Id(*id))
            .await?
            .ok_or_else(|| AppError::NotFound(format!("{}/{}", coll, id)))
    }

    pub async fn insert_one(&self, coll: &str, doc: Document) -> Result<DocId, AppError> {
        let handle = self.collection(coll)?;
        let id = self.store.insert_one(&handle, doc).await?;
        tracing::info!(collection = coll, id = %id, "document inserted");
        Ok(id)
    }

    /// Merge `set` into the document. Keys not in `set` are untouched.
    pub async fn update_one(&self, coll: &str, id: &DocId, set: Document) -> Result<(), AppError> {
        let handle = self.collection(coll)?;
        if !self.store.update_one(&handle, id, set).await? {
            return Err(AppError::NotFound(format!("{}/{}", coll, id)));
        }
        tracing::info!(collection = coll, id = %id, "document updated");
        Ok(())
    }

    pub async fn unset_fields(&self, coll: &str, id: &DocId, keys: &[String]) -> Result<(), AppError> {
        let handle = self.collection(coll)?;
        if !self.store.unset_fields(&handle, id, keys).await? {
            return Err(AppError::NotFound(format!("{}/{}", coll, id)));
        }
        Ok(())
    }

    /// Make the stored document exactly `doc`. Keys not in `doc` are dropped.
    pub async fn replace_one(&self, coll: &str, id: &DocId, doc: Document) -> Result<(), AppError> {
        let handle = self.collection(coll)?;
        if !self.store.replace_one(&handle, id, doc).await? {
            return Err(AppError::NotFound(format!("{}/{}", coll, id)));
        }
        tracing::info!(collection = coll, id = %id, "document replaced");
        Ok(())
    }

    pub async fn delete_one(&self, coll: &str, id: &DocId) -> Result<bool, AppError> {
        let deleted = self.store.delete_one(&self.collection(coll)?, id).await?;
        if deleted {
            tracing::info!(collection = coll, id = %id, "document deleted");
        }
        Ok(deleted)
    }

    pub async fn drop_collection(&self, coll: &str) -> Result<bool, AppError> {
        let dropped = self.store.drop_collection(&self.collection(coll)?).await?;
        tracing::info!(collection = coll, dropped, "collection dropped");
        Ok(dropped)
    }

    /// Make sure `coll` exists without leaving data in it. No-op when it already exists.
    /// Insert and delete are separate operations: a crash in between leaves one empty document behind.
    pub async fn touch_collection(&self, coll: &str) -> Result<bool, AppError> {
        if self.list_collections().await?.iter().any(|c| c == coll) {
            return Ok(false);
        }
        let handle = self.collection(coll)?;
        let id = self.store.insert_one(&handle, Document::new()).await?;
        self.store.delete_one(&handle, &id).await?;
        tracing::info!(collection = coll, "collection created");
        Ok(true)
    }

    pub async fn get_schema(&self, coll: &str) -> Result<Option<SchemaRecord>, AppError> {
        let found = self
            .find_one(META_COLLECTION, &Filter::field("name", coll))
            .await?;
        found
            .map(|d| {
                serde_json::from_value::<SchemaRecord>(Value::Object(d.body))
                    .map_err(|e| AppError::Store(format!("malformed schema record for '{}': {}", coll, e)))
            })
            .transpose()
    }

    /// Replace the schema record for `coll` if one exists, else insert it.
    pub async fn upsert_schema(&self, coll: &str, schema_text: &str) -> Result<(), AppError> {
        let record = SchemaRecord::new(coll, schema_text);
        let body = match serde_json::to_value(&record) {
            Ok(Value::Object(m)) => m,
            _ => return Err(AppError::Store("schema record did not serialize to an object".into())),
        };
        let existing = self
            .find_one(META_COLLECTION, &Filter::field("name", coll))
            .await?;
        match existing {
            Some(doc) => self.replace_one(META_COLLECTION, &doc.id, body).await?,
            None => {
                self.insert_one(META_COLLECTION, body).await?;
            }
        }
        tracing::info!(collection = coll, "schema saved");
        Ok(())
    }

    /// Round trip through the store: create a scratch collection, see it listed, drop it.
    pub async fn self_check(&self) -> Result<(), AppError> {
        self.insert_one(SELF_CHECK_COLLECTION, Document::new()).await?;
        let listed = self
            .list_collections()
            .await?
            .iter()
            .any(|c| c == SELF_CHECK_COLLECTION);
        self.drop_collection(SELF_CHECK_COLLECTION).await?;
        if !listed {
            return Err(AppError::Store(format!(
                "'{}' not listed after insert",
                SELF_CHECK_COLLECTION
            )));
        }
        Ok(())
    }
}
