//! Durable store for jobq, backed by SQLite.
//!
//! Provides pool construction, embedded migrations, and the job table
//! operations, including the atomic claim used by concurrent workers.

pub mod error;
pub mod store;

pub use error::{StoreError, StoreResult};
pub use store::{JobStore, StatusSummary};

use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use std::path::Path;
use std::time::Duration;

/// Open (creating if missing) the database at `path` and return a pool.
///
/// WAL journal mode plus a busy timeout lets several worker processes
/// share one database file.
pub async fn create_pool(path: &str) -> StoreResult<SqlitePool> {
    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_secs(5));

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;
    Ok(pool)
}

/// Run database migrations.
pub async fn run_migrations(pool: &SqlitePool) -> StoreResult<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}
