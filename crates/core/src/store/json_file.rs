use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex;

use crate::error::StoreError;

use super::{Documents, RecordStore};

/// Flat `db.json` file holding every collection. Each mutation re-reads the
/// file and writes it back through a temp file + rename.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<Documents, StoreError> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Documents::new()),
            Err(err) => {
                return Err(StoreError::Unavailable(format!(
                    "failed to read {}: {}",
                    self.path.display(),
                    err
                )))
            }
        };
        if raw.trim().is_empty() {
            return Ok(Documents::new());
        }
        serde_json::from_str(&raw).map_err(|err| {
            StoreError::Malformed(format!("failed to parse {}: {}", self.path.display(), err))
        })
    }

    async fn save(&self, documents: &Documents) -> Result<(), StoreError> {
        let data = serde_json::to_string_pretty(documents)
            .map_err(|err| StoreError::Malformed(err.to_string()))?;
        let tmp = self.path.with_extension("json.tmp");
        let unavailable =
            |err: std::io::Error| StoreError::Unavailable(format!("failed to write {}: {}", self.path.display(), err));
        tokio::fs::write(&tmp, data.as_bytes())
            .await
            .map_err(unavailable)?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(unavailable)?;
        Ok(())
    }

    async fn read<F>(&self, f: F) -> Result<Value, StoreError>
    where
        F: FnOnce(&Documents) -> Result<Value, StoreError>,
    {
        let _guard = self.lock.lock().await;
        let documents = self.load().await?;
        f(&documents)
    }

    async fn mutate<F>(&self, f: F) -> Result<Value, StoreError>
    where
        F: FnOnce(&mut Documents) -> Result<Value, StoreError>,
    {
        let _guard = self.lock.lock().await;
        let mut documents = self.load().await?;
        let result = f(&mut documents)?;
        self.save(&documents).await?;
        Ok(result)
    }
}

#[async_trait]
impl RecordStore for JsonFileStore {
    async fn list(&self, collection: &str) -> Result<Value, StoreError> {
        self.read(|docs| Ok(docs.list(collection))).await
    }

    async fn list_where(
        &self,
        collection: &str,
        field: &str,
        value: &str,
    ) -> Result<Value, StoreError> {
        self.read(|docs| Ok(docs.list_where(collection, field, value)))
            .await
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Value, StoreError> {
        self.read(|docs| docs.get(collection, id)).await
    }

    async fn insert(&self, collection: &str, record: Value) -> Result<Value, StoreError> {
        self.mutate(|docs| docs.insert(collection, record)).await
    }

    async fn replace(
        &self,
        collection: &str,
        id: &str,
        record: Value,
    ) -> Result<Value, StoreError> {
        self.mutate(|docs| docs.replace(collection, id, record))
            .await
    }

    async fn patch(&self, collection: &str, id: &str, fields: Value) -> Result<Value, StoreError> {
        self.mutate(|docs| docs.patch(collection, id, fields)).await
    }

    async fn remove(&self, collection: &str, id: &str) -> Result<Value, StoreError> {
        self.mutate(|docs| docs.remove(collection, id)).await
    }
}
