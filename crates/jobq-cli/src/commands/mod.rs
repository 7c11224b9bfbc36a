//! CLI command implementations.

pub mod config;
pub mod jobs;
pub mod status;
pub mod worker;

use anyhow::Result;
use jobq_db::{JobStore, create_pool, run_migrations};

/// Open the job database, creating and migrating it if needed.
pub(crate) async fn open_store(db: &str) -> Result<JobStore> {
    let pool = create_pool(db).await?;
    run_migrations(&pool).await?;
    Ok(JobStore::new(pool))
}
