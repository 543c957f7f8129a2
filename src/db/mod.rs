/// SQLite storage
///
/// One database file holds accounts, patients, vitals, reports and the
/// patient id counter. Foreign keys are enforced on every connection.

use crate::error::{IcuError, IcuResult};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::{path::Path, time::Duration};

const MAX_CONNECTIONS: u32 = 10;
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Open the database at `path`, creating it if needed, and bring the schema
/// up to date.
pub async fn open(path: &Path) -> IcuResult<SqlitePool> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .foreign_keys(true)
        .busy_timeout(BUSY_TIMEOUT);

    let pool = SqlitePoolOptions::new()
        .max_connections(MAX_CONNECTIONS)
        .connect_with(options)
        .await?;

    migrate(&pool).await?;
    sqlx::query("SELECT 1").execute(&pool).await?;

    tracing::info!("Database ready at {}", path.display());
    Ok(pool)
}

/// Apply the schema files embedded from `./migrations`
pub async fn migrate(pool: &SqlitePool) -> IcuResult<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| IcuError::Internal(format!("Schema migration error: {}", e)))
}

/// Private in-memory database with the schema applied. A single connection
/// keeps every query on the same memory database.
#[cfg(test)]
pub async fn test_pool() -> SqlitePool {
    use std::str::FromStr;

    let options = SqliteConnectOptions::from_str("sqlite::memory:")
        .unwrap()
        .foreign_keys(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await
        .unwrap();

    migrate(&pool).await.unwrap();
    pool
}
