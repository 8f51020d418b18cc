use sqlx::migrate::{MigrateError, Migrator};

use crate::DbPool;

/// One schema covers both optional stores (`narrative_cache` and
/// `startup_critique`). `CACHE_URL` and `CRITIQUE_LOG_URL` may point at the
/// same database or different ones; a database serving only one store just
/// carries an idle table for the other.
pub static MIGRATOR: Migrator = sqlx::migrate!("../../migrations");

/// Bring a store database up to the current schema. Runs on every
/// bootstrap; already-applied versions are skipped.
pub async fn run_pending(pool: &DbPool) -> Result<(), MigrateError> {
    MIGRATOR.run(pool).await
}
