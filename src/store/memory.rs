//! In-process document store. Used when no database is configured and by the test suite.

use super::{CollectionHandle, DocId, Document, DocumentStore, Filter, StoredDocument};
use crate::error::AppError;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

type Collections = BTreeMap<String, Vec<StoredDocument>>;

#[derive(Default)]
pub struct MemoryDocumentStore {
    collections: RwLock<Collections>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Collections>, AppError> {
        self.collections
            .read()
            .map_err(|_| AppError::Store("memory store lock poisoned".into()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Collections>, AppError> {
        self.collections
            .write()
            .map_err(|_| AppError::Store("memory store lock poisoned".into()))
    }

    /// Apply `f` to the document with `id`, if any. Returns whether it was found.
    fn modify<F>(&self, coll: &CollectionHandle, id: &DocId, f: F) -> Result<bool, AppError>
    where
        F: FnOnce(&mut Document),
    {
        let mut guard = self.write()?;
        let doc = guard
            .get_mut(coll.name())
            .and_then(|docs| docs.iter_mut().find(|d| d.id == *id));
        match doc {
            Some(doc) => {
                f(&mut doc.body);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn ping(&self) -> Result<(), AppError> {
        self.read().map(|_| ())
    }

    async fn list_collections(&self) -> Result<Vec<String>, AppError> {
        Ok(self.read()?.keys().cloned().collect())
    }

    async fn find(&self, coll: &CollectionHandle, filter: &Filter) -> Result<Vec<StoredDocument>, AppError> {
        let guard = self.read()?;
        Ok(guard
            .get(coll.name())
            .map(|docs| {
                docs.iter()
                    .filter(|d| filter.matches(&d.id, &d.body))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn find_one(&self, coll: &CollectionHandle, filter: &Filter) -> Result<Option<StoredDocument>, AppError> {
        let guard = self.read()?;
        Ok(guard
            .get(coll.name())
            .and_then(|docs| docs.iter().find(|d| filter.matches(&d.id, &d.body)))
            .cloned())
    }

    async fn insert_one(&self, coll: &CollectionHandle, doc: Document) -> Result<DocId, AppError> {
        coll.check_writable()?;
        let id = DocId::generate();
        self.write()?
            .entry(coll.name().to_string())
            .or_default()
            .push(StoredDocument { id, body: doc });
        Ok(id)
    }

    async fn update_one(&self, coll: &CollectionHandle, id: &DocId, set: Document) -> Result<bool, AppError> {
        self.modify(coll, id, |body| {
            for (k, v) in set {
                body.insert(k, v);
            }
        })
    }

    async fn unset_fields(&self, coll: &CollectionHandle, id: &DocId, keys: &[String]) -> Result<bool, AppError> {
        self.modify(coll, id, |body| {
            for k in keys {
                body.shift_remove(k);
            }
        })
    }

    async fn replace_one(&self, coll: &CollectionHandle, id: &DocId, doc: Document) -> Result<bool, AppError> {
        self.modify(coll, id, |body| *body = doc)
    }

    async fn delete_one(&self, coll: &CollectionHandle, id: &DocId) -> Result<bool, AppError> {
        let mut guard = self.write()?;
        let Some(docs) = guard.get_mut(coll.name()) else {
            return Ok(false);
        };
        let before = docs.len();
        docs.retain(|d| d.id != *id);
        Ok(docs.len() != before)
    }

    async fn drop_collection(&self, coll: &CollectionHandle) -> Result<bool, AppError> {
        Ok(self.write()?.remove(coll.name()).is_some())
    }
}
