use std::time::Duration;

use sqlx::sqlite::SqlitePoolOptions;

pub type DbPool = sqlx::SqlitePool;

// Store traffic is light: point-reads on the narrative cache and append-only
// critique rows. A handful of connections is plenty, and a slow acquire
// means the store is wedged, not busy.
const DEFAULT_MAX_CONNECTIONS: u32 = 4;
const DEFAULT_ACQUIRE_TIMEOUT_SECS: u64 = 10;

/// Open a pool for a `CACHE_URL` / `CRITIQUE_LOG_URL` store with the
/// default sizing.
pub async fn connect(store_url: &str) -> Result<DbPool, sqlx::Error> {
    connect_with_settings(store_url, DEFAULT_MAX_CONNECTIONS, DEFAULT_ACQUIRE_TIMEOUT_SECS).await
}

pub async fn connect_with_settings(
    store_url: &str,
    max_connections: u32,
    acquire_timeout_secs: u64,
) -> Result<DbPool, sqlx::Error> {
    SqlitePoolOptions::new()
        .max_connections(max_connections.max(1))
        .acquire_timeout(Duration::from_secs(acquire_timeout_secs.max(1)))
        .after_connect(|conn, _meta| {
            Box::pin(async move {
                // WAL so cache reads never queue behind a critique append
                // from a concurrent evaluation.
                sqlx::query("PRAGMA journal_mode = WAL").execute(&mut *conn).await?;
                sqlx::query("PRAGMA synchronous = NORMAL").execute(&mut *conn).await?;
                sqlx::query("PRAGMA busy_timeout = 5000").execute(&mut *conn).await?;
                Ok(())
            })
        })
        .connect(store_url)
        .await
}

#[cfg(test)]
mod tests {
    use sqlx::Row;

    use super::{connect, connect_with_settings};

    #[tokio::test]
    async fn connections_carry_the_busy_timeout_pragma() {
        let pool = connect("sqlite::memory:").await.expect("connect");

        let timeout = sqlx::query("PRAGMA busy_timeout")
            .fetch_one(&pool)
            .await
            .expect("read pragma")
            .get::<i64, _>(0);
        assert_eq!(timeout, 5000);

        pool.close().await;
    }

    #[tokio::test]
    async fn zero_settings_are_clamped_to_usable_minimums() {
        let pool = connect_with_settings("sqlite::memory:", 0, 0)
            .await
            .expect("connect with clamped settings");

        let one: i64 =
            sqlx::query_scalar("SELECT 1").fetch_one(&pool).await.expect("query");
        assert_eq!(one, 1);

        pool.close().await;
    }
}
