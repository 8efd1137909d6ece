use std::collections::{BTreeSet, HashMap};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::debug;

use super::store::{Collection, FieldPatch, Filter, OrderBy, Record, RecordStore, StoreError};

/// Record store held entirely in memory. Insertion order is the natural order
/// returned by unordered listings.
#[derive(Debug, Default)]
pub struct InMemoryRecordStore {
    collections: Mutex<HashMap<Collection, Vec<Record>>>,
    blobs: Mutex<BTreeSet<String>>,
}

/// JSON layout accepted by [`InMemoryRecordStore::from_fixture`].
#[derive(Debug, Default, Deserialize)]
struct Fixture {
    #[serde(default)]
    agents: Vec<Map<String, Value>>,
    #[serde(default)]
    users: Vec<Map<String, Value>>,
    #[serde(default)]
    blobs: Vec<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum SeedError {
    #[error("unable to read fixture: {0}")]
    Io(#[from] std::io::Error),
    #[error("fixture is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("{collection} document #{index} has no string `id`")]
    MissingId {
        collection: &'static str,
        index: usize,
    },
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads `{ "agents": [...], "users": [...], "blobs": [...] }`. Every photo
    /// referenced by a user is registered as an existing blob.
    pub fn from_fixture<R: Read>(reader: R) -> Result<Self, SeedError> {
        let fixture: Fixture = serde_json::from_reader(reader)?;
        let store = Self::new();

        for (collection, documents) in [
            (Collection::Agents, fixture.agents),
            (Collection::Users, fixture.users),
        ] {
            for (index, mut fields) in documents.into_iter().enumerate() {
                let id = match fields.remove("id") {
                    Some(Value::String(id)) if !id.trim().is_empty() => id,
                    _ => {
                        return Err(SeedError::MissingId {
                            collection: collection.name(),
                            index,
                        })
                    }
                };
                if collection == Collection::Users {
                    for photo in photo_refs(&fields) {
                        store.put_blob(photo);
                    }
                }
                store.put(collection, Record::new(id, fields));
            }
        }

        for blob in fixture.blobs {
            store.put_blob(blob);
        }

        Ok(store)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, SeedError> {
        let file = File::open(path)?;
        Self::from_fixture(BufReader::new(file))
    }

    /// Inserts or replaces a document.
    pub fn put(&self, collection: Collection, record: Record) {
        let mut guard = self.collections.lock().expect("store mutex poisoned");
        let records = guard.entry(collection).or_default();
        match records.iter_mut().find(|existing| existing.id == record.id) {
            Some(existing) => *existing = record,
            None => records.push(record),
        }
    }

    pub fn put_blob(&self, path: impl Into<String>) {
        self.blobs
            .lock()
            .expect("blob mutex poisoned")
            .insert(path.into());
    }

    pub fn record(&self, collection: Collection, id: &str) -> Option<Record> {
        let guard = self.collections.lock().expect("store mutex poisoned");
        guard
            .get(&collection)
            .and_then(|records| records.iter().find(|record| record.id == id))
            .cloned()
    }

    pub fn has_blob(&self, path: &str) -> bool {
        self.blobs.lock().expect("blob mutex poisoned").contains(path)
    }

    pub fn blob_count(&self) -> usize {
        self.blobs.lock().expect("blob mutex poisoned").len()
    }

    fn with_record<T>(
        &self,
        collection: Collection,
        id: &str,
        apply: impl FnOnce(&mut Record) -> T,
    ) -> Result<T, StoreError> {
        let mut guard = self.collections.lock().expect("store mutex poisoned");
        let record = guard
            .get_mut(&collection)
            .and_then(|records| records.iter_mut().find(|record| record.id == id))
            .ok_or_else(|| StoreError::not_found(collection, id))?;
        Ok(apply(record))
    }
}

fn photo_refs(fields: &Map<String, Value>) -> Vec<String> {
    match fields.get("photos") {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| item.as_str().map(str::to_string))
            .collect(),
        _ => Vec::new(),
    }
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn get_by_id(&self, collection: Collection, id: &str) -> Result<Record, StoreError> {
        self.record(collection, id)
            .ok_or_else(|| StoreError::not_found(collection, id))
    }

    async fn list_where(
        &self,
        collection: Collection,
        filter: &Filter,
        order_by: Option<&OrderBy>,
    ) -> Result<Vec<Record>, StoreError> {
        let guard = self.collections.lock().expect("store mutex poisoned");
        let mut records: Vec<Record> = guard
            .get(&collection)
            .map(|records| {
                records
                    .iter()
                    .filter(|record| filter.matches(&record.fields))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        drop(guard);

        if let Some(order) = order_by {
            records.sort_by(|left, right| order.compare(&left.fields, &right.fields));
        }
        debug!(collection = %collection, matched = records.len(), "listed records");
        Ok(records)
    }

    async fn update_fields(
        &self,
        collection: Collection,
        id: &str,
        patch: &FieldPatch,
    ) -> Result<(), StoreError> {
        self.with_record(collection, id, |record| {
            for (field, value) in patch.fields() {
                record.fields.insert(field.clone(), value.clone());
            }
        })
    }

    async fn remove_from_array_field(
        &self,
        collection: Collection,
        id: &str,
        field: &str,
        value: &Value,
    ) -> Result<(), StoreError> {
        self.with_record(collection, id, |record| {
            if let Some(Value::Array(items)) = record.fields.get_mut(field) {
                items.retain(|item| item != value);
            }
        })
    }

    async fn delete_blob(&self, path: &str) -> Result<(), StoreError> {
        let removed = self
            .blobs
            .lock()
            .expect("blob mutex poisoned")
            .remove(path);
        if removed {
            Ok(())
        } else {
            Err(StoreError::NotFound {
                collection: "blobs",
                id: path.to_string(),
            })
        }
    }
}
