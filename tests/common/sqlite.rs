//! SQLite destination helpers.
//!
//! Each test gets its own database file in a temp directory.

use sqlx::any::AnyPoolOptions;
use sqlx::AnyPool;
use tempfile::TempDir;

/// A throwaway SQLite database with the destination tables created.
pub struct TestDb {
    // Removed on drop
    _dir: TempDir,
    pub pool: AnyPool,
}

impl TestDb {
    /// Create a database with both `kv` and `kv_log` tables.
    pub async fn new() -> Self {
        sqlx::any::install_default_drivers();

        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}?mode=rwc", dir.path().join("dest.db").display());
        let pool = AnyPoolOptions::new()
            .max_connections(2)
            .connect(&url)
            .await
            .unwrap();

        sqlx::query("CREATE TABLE kv (key BLOB PRIMARY KEY, value BLOB NOT NULL)")
            .execute(&pool)
            .await
            .unwrap();
        sqlx::query(
            "CREATE TABLE kv_log (key BLOB NOT NULL, event TEXT NOT NULL, value BLOB NOT NULL, revision INTEGER NOT NULL)",
        )
        .execute(&pool)
        .await
        .unwrap();

        Self { _dir: dir, pool }
    }

    /// Rows of the mutable table as text, ordered by key.
    pub async fn kv_rows(&self) -> Vec<(String, String)> {
        kv_rows(&self.pool).await
    }

    /// Rows of the log table as text, in insertion order.
    pub async fn log_rows(&self) -> Vec<(String, String, String, i64)> {
        log_rows(&self.pool, "rowid").await
    }
}

/// Rows of `kv` as text, ordered by key.
pub async fn kv_rows(pool: &AnyPool) -> Vec<(String, String)> {
    let rows: Vec<(Vec<u8>, Vec<u8>)> = sqlx::query_as("SELECT key, value FROM kv ORDER BY key")
        .fetch_all(pool)
        .await
        .unwrap();
    rows.into_iter()
        .map(|(k, v)| (lossy(k), lossy(v)))
        .collect()
}

/// Rows of `kv_log` as text, ordered by `order_by`.
pub async fn log_rows(pool: &AnyPool, order_by: &str) -> Vec<(String, String, String, i64)> {
    let sql = format!("SELECT key, event, value, revision FROM kv_log ORDER BY {}", order_by);
    let rows: Vec<(Vec<u8>, String, Vec<u8>, i64)> =
        sqlx::query_as(&sql).fetch_all(pool).await.unwrap();
    rows.into_iter()
        .map(|(k, event, v, revision)| (lossy(k), event, lossy(v), revision))
        .collect()
}

fn lossy(bytes: Vec<u8>) -> String {
    String::from_utf8_lossy(&bytes).into_owned()
}
