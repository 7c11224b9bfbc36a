//! Status summary: job counts and worker liveness.

use anyhow::Result;
use jobq_core::JobState;

use super::open_store;
use crate::pid;

pub async fn status(db: &str) -> Result<()> {
    let store = open_store(db).await?;
    let summary = store.status_summary().await?;

    println!("Job status:");
    for state in JobState::ALL {
        println!("  {:<12} {}", state.as_str(), summary.count(state));
    }
    println!("  {:<12} {}", "total", summary.total());

    println!();
    let pids = pid::read_pids()?;
    if pids.is_empty() {
        println!("No workers recorded.");
        return Ok(());
    }

    println!("Workers:");
    for p in pids {
        let liveness = if pid::is_alive(p) { "RUNNING" } else { "STOPPED" };
        println!("  {:<8} {}", p, liveness);
    }
    Ok(())
}
