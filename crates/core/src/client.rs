//! Typed accessor over a [`RecordStore`].
//!
//! The store hands back untyped documents; every response is checked against
//! the record schema here, and anything that does not decode is reported as
//! [`RemoteFailure::MalformedResponse`]. No retries happen at this layer.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::debug;

use crate::error::{Error, RemoteFailure, Result, StoreError};
use crate::model::{Project, RecordKind, Task, TaskDraft, TaskStatus};
use crate::store::{record_id, RecordStore};

#[derive(Debug, Clone)]
pub struct StoreClient<S> {
    store: S,
}

impl<S: RecordStore> StoreClient<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// All records of `kind`, in store order.
    pub async fn list<T: DeserializeOwned>(&self, kind: RecordKind) -> Result<Vec<T>> {
        let response = self
            .store
            .list(kind.collection())
            .await
            .map_err(|err| map_store_error(kind, "", err))?;
        let records = decode_list(kind, response)?;
        debug!(kind = %kind, count = records.len(), "listed records");
        Ok(records)
    }

    pub async fn get<T: DeserializeOwned>(&self, kind: RecordKind, id: &str) -> Result<T> {
        let response = self
            .store
            .get(kind.collection(), id)
            .await
            .map_err(|err| map_store_error(kind, id, err))?;
        decode_record(kind, response)
    }

    pub async fn list_tasks(&self) -> Result<Vec<Task>> {
        self.list(RecordKind::Task).await
    }

    pub async fn list_projects(&self) -> Result<Vec<Project>> {
        self.list(RecordKind::Project).await
    }

    pub async fn get_task(&self, id: &str) -> Result<Task> {
        self.get(RecordKind::Task, id).await
    }

    pub async fn get_project(&self, id: &str) -> Result<Project> {
        self.get(RecordKind::Project, id).await
    }

    pub async fn tasks_for_project(&self, project_id: &str) -> Result<Vec<Task>> {
        let kind = RecordKind::Task;
        let response = self
            .store
            .list_where(kind.collection(), "projectId", project_id)
            .await
            .map_err(|err| map_store_error(kind, "", err))?;
        decode_list(kind, response)
    }

    /// Persist a new task; the store assigns its id.
    pub async fn create_task(&self, draft: &TaskDraft) -> Result<Task> {
        let kind = RecordKind::Task;
        let stored = self
            .store
            .insert(kind.collection(), encode(draft)?)
            .await
            .map_err(|err| map_store_error(kind, "", err))?;
        let task: Task = decode_record(kind, stored)?;
        debug!(task_id = task.id.as_str(), "created task");
        Ok(task)
    }

    /// Full overwrite of an existing task.
    pub async fn replace_task(&self, id: &str, draft: &TaskDraft) -> Result<Task> {
        let kind = RecordKind::Task;
        let stored = self
            .store
            .replace(kind.collection(), id, encode(draft)?)
            .await
            .map_err(|err| map_store_error(kind, id, err))?;
        debug!(task_id = id, "replaced task");
        decode_record(kind, stored)
    }

    /// Update only the status field.
    pub async fn patch_status(&self, id: &str, status: TaskStatus) -> Result<Task> {
        let kind = RecordKind::Task;
        let stored = self
            .store
            .patch(kind.collection(), id, json!({ "status": status }))
            .await
            .map_err(|err| map_store_error(kind, id, err))?;
        debug!(task_id = id, status = status.as_str(), "patched task status");
        decode_record(kind, stored)
    }

    pub async fn remove_task(&self, id: &str) -> Result<Task> {
        let kind = RecordKind::Task;
        let removed = self
            .store
            .remove(kind.collection(), id)
            .await
            .map_err(|err| map_store_error(kind, id, err))?;
        debug!(task_id = id, "removed task");
        decode_record(kind, removed)
    }

    /// Persist a new project. Any id on the input is replaced by the store.
    pub async fn create_project(&self, project: &Project) -> Result<Project> {
        let kind = RecordKind::Project;
        let stored = self
            .store
            .insert(kind.collection(), encode(project)?)
            .await
            .map_err(|err| map_store_error(kind, "", err))?;
        decode_record(kind, stored)
    }
}

fn map_store_error(kind: RecordKind, id: &str, err: StoreError) -> Error {
    match err {
        StoreError::NotFound { id: missing, .. } => {
            let id = if missing.is_empty() { id.to_string() } else { missing };
            Error::NotFound { kind, id }
        }
        StoreError::Unavailable(message) => RemoteFailure::Unavailable(message).into(),
        StoreError::Malformed(message) => RemoteFailure::MalformedResponse(message).into(),
    }
}

fn encode<T: Serialize>(value: &T) -> Result<Value> {
    serde_json::to_value(value)
        .map_err(|err| RemoteFailure::MalformedResponse(format!("failed to encode: {}", err)).into())
}

fn decode_list<T: DeserializeOwned>(kind: RecordKind, response: Value) -> Result<Vec<T>> {
    match response {
        Value::Array(items) => items
            .into_iter()
            .map(|item| decode_record(kind, item))
            .collect(),
        other => Err(malformed(format!(
            "expected a list of {}, got {}",
            kind.collection(),
            short(&other)
        ))),
    }
}

fn decode_record<T: DeserializeOwned>(kind: RecordKind, mut record: Value) -> Result<T> {
    let Some(id) = record_id(&record) else {
        return Err(malformed(format!(
            "{} record without an id: {}",
            kind,
            short(&record)
        )));
    };
    // Numeric ids are normalised so every record id is a string.
    if let Value::Object(object) = &mut record {
        object.insert("id".into(), Value::String(id.clone()));
    }
    serde_json::from_value(record)
        .map_err(|err| malformed(format!("{} '{}' does not match schema: {}", kind, id, err)))
}

fn malformed(message: String) -> Error {
    RemoteFailure::MalformedResponse(message).into()
}

fn short(value: &Value) -> String {
    let rendered = value.to_string();
    if rendered.chars().count() <= 60 {
        rendered
    } else {
        let mut cut: String = rendered.chars().take(59).collect();
        cut.push('…');
        cut
    }
}
