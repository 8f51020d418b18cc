//! Optional persistence for the evaluation pipeline.
//!
//! Two stores live here, both optional at runtime: the narrative cache
//! (key/value with TTL) and the append-only critique log. Each has a SQLite
//! implementation for configured deployments and an in-memory implementation
//! for tests and cache-less operation. Absence of either store is never
//! fatal; the owning agent degrades with a warning.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::time::Duration;
use thiserror::Error;

pub mod connection;
pub mod critique_log;
pub mod memory;
pub mod migrations;
pub mod narrative_cache;

pub use connection::{connect, connect_with_settings, DbPool};
pub use critique_log::SqlCritiqueLog;
pub use memory::{InMemoryCritiqueLog, InMemoryNarrativeCache};
pub use narrative_cache::SqlNarrativeCache;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

/// Key/value cache for rendered narratives. Entries expire after their TTL;
/// a `get` after expiry behaves as a miss.
#[async_trait]
pub trait NarrativeCache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    async fn put(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError>;
    /// Returns whether an entry existed.
    async fn delete(&self, key: &str) -> Result<bool, StoreError>;
}

/// One persisted red flag, denormalized with its evaluation's risk label
/// and summary.
#[derive(Clone, Debug, PartialEq)]
pub struct CritiqueLogRow {
    pub startup_name: String,
    pub red_flag: String,
    pub severity: String,
    pub explanation: String,
    pub category: String,
    pub overall_risk_label: String,
    pub summary: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct StoredCritiqueRow {
    pub id: i64,
    pub row: CritiqueLogRow,
    pub created_at: DateTime<Utc>,
}

/// Append-only record of identified red flags per evaluation.
#[async_trait]
pub trait CritiqueLogStore: Send + Sync {
    async fn append(&self, rows: &[CritiqueLogRow]) -> Result<(), StoreError>;
    async fn rows_for_startup(&self, startup_name: &str)
        -> Result<Vec<StoredCritiqueRow>, StoreError>;
}
