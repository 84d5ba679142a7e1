//! Process-local parameter store used for development and tests.

use super::{ParameterKey, ParameterStore, ParameterStoreError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tracing::debug;

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    version: i64,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
pub struct InMemoryParameterStore {
    entries: DashMap<ParameterKey, Entry>,
}

impl InMemoryParameterStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn version(&self, key: &ParameterKey) -> Option<i64> {
        self.entries.get(key).map(|entry| entry.version)
    }

    pub fn updated_at(&self, key: &ParameterKey) -> Option<DateTime<Utc>> {
        self.entries.get(key).map(|entry| entry.updated_at)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl ParameterStore for InMemoryParameterStore {
    async fn put(&self, key: &ParameterKey, value: &str) -> Result<i64, ParameterStoreError> {
        let now = Utc::now();
        let version = self
            .entries
            .entry(key.clone())
            .and_modify(|entry| {
                entry.value = value.to_string();
                entry.version += 1;
                entry.updated_at = now;
            })
            .or_insert_with(|| Entry {
                value: value.to_string(),
                version: 1,
                updated_at: now,
            })
            .version;

        debug!(key = %key, version = version, "Parameter written");
        Ok(version)
    }

    async fn get(&self, key: &ParameterKey) -> Result<String, ParameterStoreError> {
        self.entries
            .get(key)
            .map(|entry| entry.value.clone())
            .ok_or_else(|| ParameterStoreError::NotFound {
                key: key.to_string(),
            })
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
