//! Persistence backends the store client talks to.
//!
//! Backends deal in untyped JSON documents grouped into named collections, the
//! way a json-server style service does. Typing and shape checks happen one
//! layer up in [`crate::client::StoreClient`].

mod documents;
#[cfg(test)]
pub(crate) mod flaky;
mod json_file;
mod memory;
mod sqlite;

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::config::{AppConfig, Backend};
use crate::error::StoreError;

pub use documents::Documents;
pub use json_file::JsonFileStore;
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Every record of the collection, in insertion order, as a JSON array.
    async fn list(&self, collection: &str) -> Result<Value, StoreError>;

    /// Records whose top-level `field` equals `value`.
    async fn list_where(
        &self,
        collection: &str,
        field: &str,
        value: &str,
    ) -> Result<Value, StoreError>;

    async fn get(&self, collection: &str, id: &str) -> Result<Value, StoreError>;

    /// Persist a new record. The store assigns the id and returns the stored
    /// document.
    async fn insert(&self, collection: &str, record: Value) -> Result<Value, StoreError>;

    async fn replace(&self, collection: &str, id: &str, record: Value)
        -> Result<Value, StoreError>;

    /// Shallow-merge `fields` into an existing record.
    async fn patch(&self, collection: &str, id: &str, fields: Value) -> Result<Value, StoreError>;

    /// Delete a record, returning what was removed.
    async fn remove(&self, collection: &str, id: &str) -> Result<Value, StoreError>;
}

/// Open the backend `config` selects. The SQLite file and its schema are
/// created on first use; the JSON file is created on first write.
pub fn open(config: &AppConfig) -> Result<Arc<dyn RecordStore>> {
    debug!(backend = %config.backend(), dir = %config.data_dir().display(), "opening store");
    let store: Arc<dyn RecordStore> = match config.backend() {
        Backend::Json => Arc::new(JsonFileStore::new(config.json_path())),
        Backend::Sqlite => Arc::new(SqliteStore::open(config.sqlite_path())?),
    };
    Ok(store)
}

/// Lets a runtime-selected `Arc<dyn RecordStore>` stand in for a concrete backend.
#[async_trait]
impl<S: RecordStore + ?Sized> RecordStore for Arc<S> {
    async fn list(&self, collection: &str) -> Result<Value, StoreError> {
        (**self).list(collection).await
    }

    async fn list_where(
        &self,
        collection: &str,
        field: &str,
        value: &str,
    ) -> Result<Value, StoreError> {
        (**self).list_where(collection, field, value).await
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Value, StoreError> {
        (**self).get(collection, id).await
    }

    async fn insert(&self, collection: &str, record: Value) -> Result<Value, StoreError> {
        (**self).insert(collection, record).await
    }

    async fn replace(
        &self,
        collection: &str,
        id: &str,
        record: Value,
    ) -> Result<Value, StoreError> {
        (**self).replace(collection, id, record).await
    }

    async fn patch(&self, collection: &str, id: &str, fields: Value) -> Result<Value, StoreError> {
        (**self).patch(collection, id, fields).await
    }

    async fn remove(&self, collection: &str, id: &str) -> Result<Value, StoreError> {
        (**self).remove(collection, id).await
    }
}

/// Extract a record id, accepting both string and numeric ids.
pub(crate) fn record_id(record: &Value) -> Option<String> {
    match record.get("id")? {
        Value::String(id) => Some(id.clone()),
        Value::Number(id) => Some(id.to_string()),
        _ => None,
    }
}

/// Loose equality used for `list_where`, so `"3"` matches both `"3"` and `3`.
pub(crate) fn field_matches(record: &Value, field: &str, value: &str) -> bool {
    match record.get(field) {
        Some(Value::String(actual)) => actual == value,
        Some(Value::Number(actual)) => actual.to_string() == value,
        Some(Value::Bool(actual)) => actual.to_string() == value,
        _ => false,
    }
}

pub(crate) fn not_found(collection: &str, id: &str) -> StoreError {
    StoreError::NotFound {
        collection: collection.to_string(),
        id: id.to_string(),
    }
}
