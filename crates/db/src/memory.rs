//! In-memory store implementations for tests and store-less deployments.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::Utc;

use crate::{
    CritiqueLogRow, CritiqueLogStore, NarrativeCache, StoreError, StoredCritiqueRow,
};

#[derive(Default)]
pub struct InMemoryNarrativeCache {
    entries: Mutex<HashMap<String, CacheEntry>>,
}

struct CacheEntry {
    payload: String,
    expires_at: Instant,
}

impl InMemoryNarrativeCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl NarrativeCache for InMemoryNarrativeCache {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut entries = self.entries.lock().expect("narrative cache lock poisoned");
        match entries.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => Ok(Some(entry.payload.clone())),
            Some(_) => {
                entries.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn put(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().expect("narrative cache lock poisoned");
        entries.insert(
            key.to_string(),
            CacheEntry { payload: value.to_string(), expires_at: Instant::now() + ttl },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        let mut entries = self.entries.lock().expect("narrative cache lock poisoned");
        Ok(entries.remove(key).is_some())
    }
}

#[derive(Default)]
pub struct InMemoryCritiqueLog {
    rows: Mutex<Vec<StoredCritiqueRow>>,
}

impl InMemoryCritiqueLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn all_rows(&self) -> Vec<StoredCritiqueRow> {
        self.rows.lock().expect("critique log lock poisoned").clone()
    }
}

#[async_trait]
impl CritiqueLogStore for InMemoryCritiqueLog {
    async fn append(&self, rows: &[CritiqueLogRow]) -> Result<(), StoreError> {
        let mut stored = self.rows.lock().expect("critique log lock poisoned");
        let next_id = stored.len() as i64 + 1;
        for (offset, row) in rows.iter().enumerate() {
            stored.push(StoredCritiqueRow {
                id: next_id + offset as i64,
                row: row.clone(),
                created_at: Utc::now(),
            });
        }
        Ok(())
    }

    async fn rows_for_startup(
        &self,
        startup_name: &str,
    ) -> Result<Vec<StoredCritiqueRow>, StoreError> {
        let stored = self.rows.lock().expect("critique log lock poisoned");
        Ok(stored.iter().filter(|row| row.row.startup_name == startup_name).cloned().collect())
    }
}

/// Store double that fails every operation; exercises the degrade-silently
/// paths in agent tests.
#[derive(Default)]
pub struct FailingNarrativeCache;

#[async_trait]
impl NarrativeCache for FailingNarrativeCache {
    async fn get(&self, _key: &str) -> Result<Option<String>, StoreError> {
        Err(StoreError::Decode("cache offline".to_string()))
    }

    async fn put(&self, _key: &str, _value: &str, _ttl: Duration) -> Result<(), StoreError> {
        Err(StoreError::Decode("cache offline".to_string()))
    }

    async fn delete(&self, _key: &str) -> Result<bool, StoreError> {
        Err(StoreError::Decode("cache offline".to_string()))
    }
}
