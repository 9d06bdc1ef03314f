use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use rusqlite::{named_params, Connection, OptionalExtension};
use serde_json::{Map, Value};

use crate::error::StoreError;
use crate::model::new_record_id;

use super::{not_found, RecordStore};

/// SQLite-backed document store. Each record is one row holding the JSON body;
/// `position` preserves insertion order.
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database at {}", path.display()))?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")
            .context("Failed to configure SQLite WAL mode")?;
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory database")?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        apply_migrations(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    async fn run<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T, StoreError> + Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let guard = conn.lock();
            f(&guard)
        })
        .await
        .map_err(|err| StoreError::Unavailable(format!("blocking task failed: {}", err)))?
    }
}

#[async_trait]
impl RecordStore for SqliteStore {
    async fn list(&self, collection: &str) -> Result<Value, StoreError> {
        let collection = collection.to_string();
        self.run(move |conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT body FROM records WHERE collection = :collection ORDER BY position ASC",
                )
                .map_err(unavailable)?;
            let rows = stmt
                .query_map(named_params![":collection": collection], |row| {
                    row.get::<_, String>(0)
                })
                .map_err(unavailable)?;
            collect_bodies(rows)
        })
        .await
    }

    async fn list_where(
        &self,
        collection: &str,
        field: &str,
        value: &str,
    ) -> Result<Value, StoreError> {
        let collection = collection.to_string();
        let path = format!("$.{}", field);
        let value = value.to_string();
        self.run(move |conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT body FROM records \
                     WHERE collection = :collection \
                       AND CAST(json_extract(body, :path) AS TEXT) = :value \
                     ORDER BY position ASC",
                )
                .map_err(unavailable)?;
            let rows = stmt
                .query_map(
                    named_params![":collection": collection, ":path": path, ":value": value],
                    |row| row.get::<_, String>(0),
                )
                .map_err(unavailable)?;
            collect_bodies(rows)
        })
        .await
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Value, StoreError> {
        let collection = collection.to_string();
        let id = id.to_string();
        self.run(move |conn| fetch_body(conn, &collection, &id)).await
    }

    async fn insert(&self, collection: &str, record: Value) -> Result<Value, StoreError> {
        let collection = collection.to_string();
        self.run(move |conn| {
            let mut object = into_object(record)?;
            let id = new_record_id();
            object.insert("id".into(), Value::String(id.clone()));
            let stored = Value::Object(object);
            conn.execute(
                "INSERT INTO records (collection, id, body, position) VALUES (
                    :collection, :id, :body,
                    (SELECT COALESCE(MAX(position), 0) + 1 FROM records WHERE collection = :collection)
                 )",
                named_params![
                    ":collection": collection,
                    ":id": id,
                    ":body": stored.to_string(),
                ],
            )
            .map_err(unavailable)?;
            Ok(stored)
        })
        .await
    }

    async fn replace(
        &self,
        collection: &str,
        id: &str,
        record: Value,
    ) -> Result<Value, StoreError> {
        let collection = collection.to_string();
        let id = id.to_string();
        self.run(move |conn| {
            let mut object = into_object(record)?;
            object.insert("id".into(), Value::String(id.clone()));
            let stored = Value::Object(object);
            write_body(conn, &collection, &id, &stored)?;
            Ok(stored)
        })
        .await
    }

    async fn patch(&self, collection: &str, id: &str, fields: Value) -> Result<Value, StoreError> {
        let collection = collection.to_string();
        let id = id.to_string();
        self.run(move |conn| {
            let fields = into_object(fields)?;
            let mut existing = fetch_body(conn, &collection, &id)?;
            if let Value::Object(object) = &mut existing {
                for (key, value) in fields {
                    if key != "id" {
                        object.insert(key, value);
                    }
                }
            }
            write_body(conn, &collection, &id, &existing)?;
            Ok(existing)
        })
        .await
    }

    async fn remove(&self, collection: &str, id: &str) -> Result<Value, StoreError> {
        let collection = collection.to_string();
        let id = id.to_string();
        self.run(move |conn| {
            let existing = fetch_body(conn, &collection, &id)?;
            conn.execute(
                "DELETE FROM records WHERE collection = :collection AND id = :id",
                named_params![":collection": collection, ":id": id],
            )
            .map_err(unavailable)?;
            Ok(existing)
        })
        .await
    }
}

fn apply_migrations(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS meta (key TEXT PRIMARY KEY, value TEXT);
         CREATE TABLE IF NOT EXISTS records (
            collection TEXT NOT NULL,
            id TEXT NOT NULL,
            body TEXT NOT NULL,
            position INTEGER NOT NULL,
            PRIMARY KEY (collection, id)
         );
         CREATE INDEX IF NOT EXISTS idx_records_position ON records(collection, position);
        ",
    )
    .context("Failed to apply database migrations")?;
    Ok(())
}

fn fetch_body(conn: &Connection, collection: &str, id: &str) -> Result<Value, StoreError> {
    let body: Option<String> = conn
        .query_row(
            "SELECT body FROM records WHERE collection = :collection AND id = :id LIMIT 1",
            named_params![":collection": collection, ":id": id],
            |row| row.get(0),
        )
        .optional()
        .map_err(unavailable)?;
    match body {
        Some(body) => parse_body(&body),
        None => Err(not_found(collection, id)),
    }
}

fn write_body(conn: &Connection, collection: &str, id: &str, body: &Value) -> Result<(), StoreError> {
    let updated = conn
        .execute(
            "UPDATE records SET body = :body WHERE collection = :collection AND id = :id",
            named_params![
                ":body": body.to_string(),
                ":collection": collection,
                ":id": id,
            ],
        )
        .map_err(unavailable)?;
    if updated == 0 {
        return Err(not_found(collection, id));
    }
    Ok(())
}

fn collect_bodies<I>(rows: I) -> Result<Value, StoreError>
where
    I: Iterator<Item = rusqlite::Result<String>>,
{
    let mut records = Vec::new();
    for row in rows {
        let body = row.map_err(unavailable)?;
        records.push(parse_body(&body)?);
    }
    Ok(Value::Array(records))
}

fn parse_body(body: &str) -> Result<Value, StoreError> {
    serde_json::from_str(body)
        .map_err(|err| StoreError::Malformed(format!("stored record is not JSON: {}", err)))
}

fn into_object(value: Value) -> Result<Map<String, Value>, StoreError> {
    match value {
        Value::Object(map) => Ok(map),
        _ => Err(StoreError::Malformed("expected a JSON object".into())),
    }
}

fn unavailable(err: rusqlite::Error) -> StoreError {
    StoreError::Unavailable(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use tempfile::TempDir;

    #[tokio::test]
    async fn insert_list_and_filter_preserve_order() {
        let store = SqliteStore::open_in_memory().unwrap();
        for (title, project) in [("Plan sprint", "p1"), ("Fix login", "p2"), ("Retro notes", "p1")] {
            store
                .insert("tasks", json!({ "title": title, "projectId": project }))
                .await
                .unwrap();
        }

        let all = store.list("tasks").await.unwrap();
        let titles: Vec<&str> = all
            .as_array()
            .unwrap()
            .iter()
            .map(|r| r["title"].as_str().unwrap())
            .collect();
        assert_eq!(titles, vec!["Plan sprint", "Fix login", "Retro notes"]);

        let p1 = store.list_where("tasks", "projectId", "p1").await.unwrap();
        assert_eq!(p1.as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn patch_replace_and_remove_report_missing_rows() {
        let store = SqliteStore::open_in_memory().unwrap();
        let stored = store
            .insert("tasks", json!({ "title": "Plan sprint", "status": "todo" }))
            .await
            .unwrap();
        let id = stored["id"].as_str().unwrap().to_string();

        let patched = store
            .patch("tasks", &id, json!({ "status": "done" }))
            .await
            .unwrap();
        assert_eq!(patched["status"], "done");
        assert_eq!(patched["title"], "Plan sprint");

        let replaced = store
            .replace("tasks", &id, json!({ "title": "Plan next sprint" }))
            .await
            .unwrap();
        assert_eq!(replaced, json!({ "id": id.clone(), "title": "Plan next sprint" }));

        store.remove("tasks", &id).await.unwrap();
        assert!(matches!(
            store.get("tasks", &id).await,
            Err(StoreError::NotFound { .. })
        ));
        assert!(matches!(
            store.patch("tasks", &id, json!({})).await,
            Err(StoreError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn file_backed_store_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("taskdeck.sqlite3");
        let id = {
            let store = SqliteStore::open(&path).unwrap();
            let stored = store
                .insert("projects", json!({ "name": "Website relaunch" }))
                .await
                .unwrap();
            stored["id"].as_str().unwrap().to_string()
        };

        let reopened = SqliteStore::open(&path).unwrap();
        let project = reopened.get("projects", &id).await.unwrap();
        assert_eq!(project["name"], "Website relaunch");
    }
}
