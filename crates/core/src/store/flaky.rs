//! Test double that wraps [`MemoryStore`] and injects outages.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use serde_json::Value;

use crate::error::StoreError;

use super::{Documents, MemoryStore, RecordStore};

#[derive(Debug, Default)]
pub(crate) struct FlakyStore {
    inner: MemoryStore,
    offline: AtomicBool,
    failing_patches: AtomicUsize,
    failing_lists: AtomicUsize,
    patch_calls: AtomicUsize,
}

impl FlakyStore {
    pub(crate) fn new(documents: Documents) -> Self {
        Self {
            inner: MemoryStore::from_documents(documents),
            ..Self::default()
        }
    }

    pub(crate) fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub(crate) fn fail_next_patches(&self, count: usize) {
        self.failing_patches.store(count, Ordering::SeqCst);
    }

    pub(crate) fn fail_next_lists(&self, count: usize) {
        self.failing_lists.store(count, Ordering::SeqCst);
    }

    pub(crate) fn patch_calls(&self) -> usize {
        self.patch_calls.load(Ordering::SeqCst)
    }

    fn check_online(&self) -> Result<(), StoreError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("connection refused".into()));
        }
        Ok(())
    }

    fn take_failure(counter: &AtomicUsize) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl RecordStore for FlakyStore {
    async fn list(&self, collection: &str) -> Result<Value, StoreError> {
        self.check_online()?;
        if Self::take_failure(&self.failing_lists) {
            return Err(StoreError::Unavailable("list timed out".into()));
        }
        self.inner.list(collection).await
    }

    async fn list_where(
        &self,
        collection: &str,
        field: &str,
        value: &str,
    ) -> Result<Value, StoreError> {
        self.check_online()?;
        self.inner.list_where(collection, field, value).await
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Value, StoreError> {
        self.check_online()?;
        self.inner.get(collection, id).await
    }

    async fn insert(&self, collection: &str, record: Value) -> Result<Value, StoreError> {
        self.check_online()?;
        self.inner.insert(collection, record).await
    }

    async fn replace(
        &self,
        collection: &str,
        id: &str,
        record: Value,
    ) -> Result<Value, StoreError> {
        self.check_online()?;
        self.inner.replace(collection, id, record).await
    }

    async fn patch(&self, collection: &str, id: &str, fields: Value) -> Result<Value, StoreError> {
        self.patch_calls.fetch_add(1, Ordering::SeqCst);
        self.check_online()?;
        if Self::take_failure(&self.failing_patches) {
            return Err(StoreError::Unavailable("patch rejected upstream".into()));
        }
        self.inner.patch(collection, id, fields).await
    }

    async fn remove(&self, collection: &str, id: &str) -> Result<Value, StoreError> {
        self.check_online()?;
        self.inner.remove(collection, id).await
    }
}
