use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;
use uuid::Uuid;
use crate::core::{DataApi, DataError, GraphQlError, RecordKind};
use super::Filter;

/// In-process [`DataApi`] used for offline runs and tests.
#[derive(Default)]
pub struct MemoryDataApi {
    records: RwLock<HashMap<RecordKind, Vec<Value>>>,
    create_calls: AtomicUsize,
    fail_writes: AtomicBool,
}

impl MemoryDataApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `create` calls received, failed ones included.
    pub fn create_calls(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    /// Makes every following write fail until switched off again.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub async fn all(&self, kind: RecordKind) -> Vec<Value> {
        self.records.read().await.get(&kind).cloned().unwrap_or_default()
    }

    fn check_writable(&self) -> Result<(), DataError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(DataError::Transport(GraphQlError::Errors(vec![
                "Write rejected".to_string(),
            ])));
        }
        Ok(())
    }
}

#[async_trait]
impl DataApi for MemoryDataApi {
    async fn create(&self, kind: RecordKind, mut input: Value) -> Result<Value, DataError> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        self.check_writable()?;

        if let Some(object) = input.as_object_mut() {
            object
                .entry("id")
                .or_insert_with(|| Value::String(Uuid::new_v4().to_string()));
        }

        self.records.write().await.entry(kind).or_default().push(input.clone());
        Ok(input)
    }

    async fn get(&self, kind: RecordKind, id: &str) -> Result<Option<Value>, DataError> {
        let records = self.records.read().await;
        Ok(records
            .get(&kind)
            .and_then(|items| items.iter().find(|item| item["id"] == id))
            .cloned())
    }

    async fn list(&self, kind: RecordKind, filter: &Filter) -> Result<Vec<Value>, DataError> {
        let records = self.records.read().await;
        Ok(records
            .get(&kind)
            .map(|items| items.iter().filter(|item| filter.matches(item)).cloned().collect())
            .unwrap_or_default())
    }

    async fn update(&self, kind: RecordKind, id: &str, patch: Value) -> Result<Value, DataError> {
        self.check_writable()?;

        let mut records = self.records.write().await;
        let item = records
            .get_mut(&kind)
            .and_then(|items| items.iter_mut().find(|item| item["id"] == id))
            .ok_or_else(|| DataError::NotFound { kind, id: id.to_string() })?;

        if let (Some(target), Value::Object(changes)) = (item.as_object_mut(), patch) {
            for (field, value) in changes {
                target.insert(field, value);
            }
        }
        Ok(item.clone())
    }

    async fn delete(&self, kind: RecordKind, id: &str) -> Result<(), DataError> {
        self.check_writable()?;

        let mut records = self.records.write().await;
        let items = records.entry(kind).or_default();
        let before = items.len();
        items.retain(|item| item["id"] != id);

        if items.len() == before {
            return Err(DataError::NotFound { kind, id: id.to_string() });
        }
        Ok(())
    }
}
