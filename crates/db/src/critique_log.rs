use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqliteRow, Row};

use crate::{CritiqueLogRow, CritiqueLogStore, DbPool, StoreError, StoredCritiqueRow};

/// SQLite-backed append-only critique log: one row per red flag.
pub struct SqlCritiqueLog {
    pool: DbPool,
}

impl SqlCritiqueLog {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CritiqueLogStore for SqlCritiqueLog {
    async fn append(&self, rows: &[CritiqueLogRow]) -> Result<(), StoreError> {
        for row in rows {
            sqlx::query(
                "INSERT INTO startup_critique \
                 (startup_name, red_flag, severity, explanation, category, \
                  overall_risk_label, summary) \
                 VALUES (?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(&row.startup_name)
            .bind(&row.red_flag)
            .bind(&row.severity)
            .bind(&row.explanation)
            .bind(&row.category)
            .bind(&row.overall_risk_label)
            .bind(&row.summary)
            .execute(&self.pool)
            .await?;
        }

        Ok(())
    }

    async fn rows_for_startup(
        &self,
        startup_name: &str,
    ) -> Result<Vec<StoredCritiqueRow>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, startup_name, red_flag, severity, explanation, category, \
             overall_risk_label, summary, created_at \
             FROM startup_critique WHERE startup_name = ? ORDER BY id ASC",
        )
        .bind(startup_name)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(stored_row_from_row).collect()
    }
}

fn stored_row_from_row(row: &SqliteRow) -> Result<StoredCritiqueRow, StoreError> {
    let created_at: String = row.try_get("created_at")?;

    Ok(StoredCritiqueRow {
        id: row.try_get("id")?,
        row: CritiqueLogRow {
            startup_name: row.try_get("startup_name")?,
            red_flag: row.try_get("red_flag")?,
            severity: row.try_get("severity")?,
            explanation: row.try_get::<Option<String>, _>("explanation")?.unwrap_or_default(),
            category: row.try_get::<Option<String>, _>("category")?.unwrap_or_default(),
            overall_risk_label: row.try_get("overall_risk_label")?,
            summary: row.try_get::<Option<String>, _>("summary")?.unwrap_or_default(),
        },
        created_at: parse_timestamp(created_at)?,
    })
}

fn parse_timestamp(value: String) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(&value)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| StoreError::Decode(format!("invalid created_at timestamp: {e}")))
}
