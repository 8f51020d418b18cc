use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;

use crate::{DbPool, NarrativeCache, StoreError};

/// SQLite-backed narrative cache. Expiry is checked on read; stale rows are
/// purged opportunistically.
pub struct SqlNarrativeCache {
    pool: DbPool,
}

impl SqlNarrativeCache {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl NarrativeCache for SqlNarrativeCache {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let now = Utc::now().to_rfc3339();

        sqlx::query("DELETE FROM narrative_cache WHERE expires_at <= ?")
            .bind(&now)
            .execute(&self.pool)
            .await?;

        let payload: Option<String> = sqlx::query_scalar(
            "SELECT payload FROM narrative_cache WHERE cache_key = ? AND expires_at > ?",
        )
        .bind(key)
        .bind(&now)
        .fetch_optional(&self.pool)
        .await?;

        Ok(payload)
    }

    async fn put(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError> {
        let expires_at = Utc::now()
            + chrono::Duration::from_std(ttl)
                .map_err(|e| StoreError::Decode(format!("ttl out of range: {e}")))?;

        sqlx::query(
            "INSERT INTO narrative_cache (cache_key, payload, expires_at) VALUES (?, ?, ?) \
             ON CONFLICT (cache_key) DO UPDATE SET payload = excluded.payload, \
             expires_at = excluded.expires_at",
        )
        .bind(key)
        .bind(value)
        .bind(expires_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM narrative_cache WHERE cache_key = ?")
            .bind(key)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
