use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::StoreError;
use crate::model::new_record_id;

use super::{field_matches, not_found, record_id};

/// Collections of JSON documents keyed by collection name. This is the on-disk
/// shape of `db.json` and the working set of the in-memory store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Documents {
    collections: BTreeMap<String, Vec<Value>>,
}

impl Documents {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder used by seeding and tests.
    pub fn with_records(mut self, collection: &str, records: Vec<Value>) -> Self {
        self.collections
            .entry(collection.to_string())
            .or_default()
            .extend(records);
        self
    }

    pub fn list(&self, collection: &str) -> Value {
        Value::Array(self.collections.get(collection).cloned().unwrap_or_default())
    }

    pub fn list_where(&self, collection: &str, field: &str, value: &str) -> Value {
        let matches = self
            .collections
            .get(collection)
            .map(|records| {
                records
                    .iter()
                    .filter(|record| field_matches(record, field, value))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        Value::Array(matches)
    }

    pub fn get(&self, collection: &str, id: &str) -> Result<Value, StoreError> {
        self.collections
            .get(collection)
            .and_then(|records| records.iter().find(|r| record_id(r).as_deref() == Some(id)))
            .cloned()
            .ok_or_else(|| not_found(collection, id))
    }

    pub fn insert(&mut self, collection: &str, record: Value) -> Result<Value, StoreError> {
        let mut object = into_object(record)?;
        object.insert("id".into(), Value::String(new_record_id()));
        let stored = Value::Object(object);
        self.collections
            .entry(collection.to_string())
            .or_default()
            .push(stored.clone());
        Ok(stored)
    }

    pub fn replace(&mut self, collection: &str, id: &str, record: Value) -> Result<Value, StoreError> {
        let mut object = into_object(record)?;
        let slot = self.find_mut(collection, id)?;
        object.insert("id".into(), Value::String(id.to_string()));
        *slot = Value::Object(object);
        Ok(slot.clone())
    }

    pub fn patch(&mut self, collection: &str, id: &str, fields: Value) -> Result<Value, StoreError> {
        let fields = into_object(fields)?;
        let slot = self.find_mut(collection, id)?;
        if let Value::Object(existing) = slot {
            for (key, value) in fields {
                if key != "id" {
                    existing.insert(key, value);
                }
            }
        }
        Ok(slot.clone())
    }

    pub fn remove(&mut self, collection: &str, id: &str) -> Result<Value, StoreError> {
        let records = self
            .collections
            .get_mut(collection)
            .ok_or_else(|| not_found(collection, id))?;
        let position = records
            .iter()
            .position(|r| record_id(r).as_deref() == Some(id))
            .ok_or_else(|| not_found(collection, id))?;
        Ok(records.remove(position))
    }

    pub fn is_empty(&self) -> bool {
        self.collections.values().all(|records| records.is_empty())
    }

    fn find_mut(&mut self, collection: &str, id: &str) -> Result<&mut Value, StoreError> {
        self.collections
            .get_mut(collection)
            .and_then(|records| {
                records
                    .iter_mut()
                    .find(|r| record_id(r).as_deref() == Some(id))
            })
            .ok_or_else(|| not_found(collection, id))
    }
}

fn into_object(value: Value) -> Result<Map<String, Value>, StoreError> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(StoreError::Malformed(format!(
            "expected a JSON object, got {}",
            kind_of(&other)
        ))),
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
