//! Worker process management.

use anyhow::Result;
use jobq_config::ConfigProvider;
use jobq_core::RetryPolicy;
use jobq_executor::ShellExecutor;
use jobq_worker::{ExecutionCycle, Worker, install_shutdown_handler};
use std::process::{Command, Stdio};
use std::sync::Arc;
use tracing::info;

use super::open_store;
use crate::pid;

/// Spawn `count` detached copies of this binary running `worker run` and
/// record their PIDs.
pub fn start(db: &str, count: u32) -> Result<()> {
    let exe = std::env::current_exe()?;
    let mut pids = pid::read_pids()?;

    println!("Starting {count} worker(s)...");
    for i in 0..count {
        let child = Command::new(&exe)
            .arg("--db")
            .arg(db)
            .arg("worker")
            .arg("run")
            .stdin(Stdio::null())
            .spawn()?;
        println!("Worker #{} started (PID: {})", i + 1, child.id());
        pids.push(child.id());
    }

    pid::write_pids(&pids)?;
    println!("PIDs saved to {}", pid::pid_file().display());
    Ok(())
}

/// Send SIGTERM to every recorded worker and clear the PID file.
pub fn stop() -> Result<()> {
    let pids = pid::read_pids()?;
    if pids.is_empty() {
        println!("No workers recorded.");
        return Ok(());
    }

    println!("Stopping {} worker(s)...", pids.len());
    for p in &pids {
        if pid::terminate(*p) {
            println!("Worker (PID: {p}) signalled to stop");
        } else {
            println!("Could not signal PID {p} (already stopped?)");
        }
    }

    pid::write_pids(&[])?;
    println!("PID file cleared.");
    Ok(())
}

/// Run a worker loop in the foreground until SIGTERM/SIGINT.
pub async fn run(db: &str) -> Result<()> {
    let settings = ConfigProvider::new().load()?;
    let policy = RetryPolicy::new(settings.backoff_base, settings.max_backoff)?;
    let store = open_store(db).await?;

    let shutdown = install_shutdown_handler();
    let cycle = ExecutionCycle::new(store.clone(), Arc::new(ShellExecutor::new()), policy);
    let worker = Worker::new(
        Worker::default_id(),
        store,
        cycle,
        settings.poll_interval,
        settings.processing_timeout,
        shutdown,
    );

    worker.run().await;
    info!(worker_id = %worker.id(), "Worker exited");
    Ok(())
}
