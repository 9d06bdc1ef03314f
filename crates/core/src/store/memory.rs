use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;

use crate::error::StoreError;

use super::{Documents, RecordStore};

/// Process-local store. Clones share the same documents.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    documents: Arc<Mutex<Documents>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_documents(documents: Documents) -> Self {
        Self {
            documents: Arc::new(Mutex::new(documents)),
        }
    }

    pub fn snapshot(&self) -> Documents {
        self.documents.lock().clone()
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn list(&self, collection: &str) -> Result<Value, StoreError> {
        Ok(self.documents.lock().list(collection))
    }

    async fn list_where(
        &self,
        collection: &str,
        field: &str,
        value: &str,
    ) -> Result<Value, StoreError> {
        Ok(self.documents.lock().list_where(collection, field, value))
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Value, StoreError> {
        self.documents.lock().get(collection, id)
    }

    async fn insert(&self, collection: &str, record: Value) -> Result<Value, StoreError> {
        self.documents.lock().insert(collection, record)
    }

    async fn replace(
        &self,
        collection: &str,
        id: &str,
        record: Value,
    ) -> Result<Value, StoreError> {
        self.documents.lock().replace(collection, id, record)
    }

    async fn patch(&self, collection: &str, id: &str, fields: Value) -> Result<Value, StoreError> {
        self.documents.lock().patch(collection, id, fields)
    }

    async fn remove(&self, collection: &str, id: &str) -> Result<Value, StoreError> {
        self.documents.lock().remove(collection, id)
    }
}
