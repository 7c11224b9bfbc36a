//! Worker that polls the store and processes jobs.

use chrono::{TimeDelta, Utc};
use jobq_db::JobStore;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::ExecutionCycle;

/// A worker: claims and executes jobs on a fixed poll interval until its
/// cancellation token fires.
///
/// One job at a time: a tick that claims a job runs the full execution
/// cycle, write-back included, before the next tick is taken. Parallelism
/// comes from running more worker processes against the same store.
pub struct Worker {
    id: String,
    store: JobStore,
    cycle: ExecutionCycle,
    poll_interval: Duration,
    /// When set, each tick first sweeps `processing` claims older than
    /// this back to pending. Disabled (`None`) by default.
    processing_timeout: Option<Duration>,
    shutdown: CancellationToken,
}

impl Worker {
    pub fn new(
        id: impl Into<String>,
        store: JobStore,
        cycle: ExecutionCycle,
        poll_interval: Duration,
        processing_timeout: Option<Duration>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            id: id.into(),
            store,
            cycle,
            poll_interval,
            processing_timeout,
            shutdown,
        }
    }

    /// Identity recorded as `claimed_by`, unique per worker process.
    pub fn default_id() -> String {
        format!("worker-{}-{}", std::process::id(), Uuid::new_v4().simple())
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Run the polling loop until the token is cancelled. Cancellation
    /// is observed at the tick boundary; an in-flight command finishes
    /// and its outcome is recorded first.
    pub async fn run(&self) {
        info!(
            worker_id = %self.id,
            executor = self.cycle.executor_name(),
            poll_interval_ms = self.poll_interval.as_millis() as u64,
            "Starting worker"
        );

        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            // Biased: the token is observed at the top of every tick,
            // never raced against an already-due poll.
            tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => {
                    info!(worker_id = %self.id, "Worker stopping");
                    break;
                }
                _ = ticker.tick() => {
                    self.tick().await;
                }
            }
        }
    }

    async fn tick(&self) {
        self.reclaim_orphans().await;

        match self.store.claim_next(&self.id).await {
            Ok(Some(job)) => {
                if let Err(e) = self.cycle.run(&job).await {
                    error!(job_id = %job.id, error = %e, "Failed to record job outcome");
                }
            }
            Ok(None) => {}
            Err(e) => {
                warn!(worker_id = %self.id, error = %e, "Failed to claim job");
            }
        }
    }

    async fn reclaim_orphans(&self) {
        let Some(timeout) = self.processing_timeout else {
            return;
        };
        let age = TimeDelta::from_std(timeout).unwrap_or(TimeDelta::MAX);
        let cutoff = Utc::now() - age;

        match self.store.reclaim_stale(cutoff).await {
            Ok(0) => {}
            Ok(count) => {
                warn!(worker_id = %self.id, count, "Reclaimed stale processing jobs");
            }
            Err(e) => {
                warn!(worker_id = %self.id, error = %e, "Failed to reclaim stale jobs");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jobq_core::{JobState, NewJob, RetryPolicy};
    use jobq_executor::ShellExecutor;
    use sqlx::sqlite::SqlitePoolOptions;
    use std::sync::Arc;

    async fn test_store() -> JobStore {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        jobq_db::run_migrations(&pool).await.unwrap();
        JobStore::new(pool)
    }

    fn test_worker(
        store: JobStore,
        processing_timeout: Option<Duration>,
        shutdown: CancellationToken,
    ) -> Worker {
        let cycle = ExecutionCycle::new(
            store.clone(),
            Arc::new(ShellExecutor::new()),
            RetryPolicy::default(),
        );
        Worker::new(
            "w-test",
            store,
            cycle,
            Duration::from_millis(10),
            processing_timeout,
            shutdown,
        )
    }

    #[tokio::test]
    async fn test_worker_processes_enqueued_job() {
        let store = test_store().await;
        store.enqueue(NewJob::new("a", "echo done"), 3).await.unwrap();

        let shutdown = CancellationToken::new();
        let worker = Arc::new(test_worker(store.clone(), None, shutdown.clone()));
        let handle = tokio::spawn({
            let worker = worker.clone();
            async move { worker.run().await }
        });

        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                if store.get("a").await.unwrap().state == JobState::Completed {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
        })
        .await
        .expect("job did not complete in time");

        let job = store.get("a").await.unwrap();
        assert_eq!(job.stdout.as_deref(), Some("done\n"));

        shutdown.cancel();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("worker did not stop after cancellation")
            .unwrap();
    }

    #[tokio::test]
    async fn test_cancelled_worker_stops_without_claiming() {
        let store = test_store().await;
        store.enqueue(NewJob::new("a", "echo hi"), 3).await.unwrap();

        let shutdown = CancellationToken::new();
        shutdown.cancel();

        let worker = test_worker(store.clone(), None, shutdown);
        // Already-cancelled token: run returns at the first boundary.
        tokio::time::timeout(Duration::from_secs(1), worker.run())
            .await
            .expect("worker did not observe cancellation");

        assert_eq!(store.get("a").await.unwrap().state, JobState::Pending);
    }

    #[tokio::test]
    async fn test_worker_reclaims_orphaned_claims() {
        let store = test_store().await;
        store.enqueue(NewJob::new("a", "echo hi"), 3).await.unwrap();

        // Simulate a crashed worker: claim and never write an outcome.
        store.claim_next("w-crashed").await.unwrap().unwrap();

        let shutdown = CancellationToken::new();
        let worker = Arc::new(test_worker(
            store.clone(),
            Some(Duration::from_millis(0)),
            shutdown.clone(),
        ));
        let handle = tokio::spawn({
            let worker = worker.clone();
            async move { worker.run().await }
        });

        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                if store.get("a").await.unwrap().state == JobState::Completed {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
        })
        .await
        .expect("orphaned job was not reclaimed and completed");

        shutdown.cancel();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("worker did not stop after cancellation")
            .unwrap();
    }
}
