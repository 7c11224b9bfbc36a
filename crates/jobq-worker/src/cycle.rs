//! The execution cycle: run one claimed job and write its outcome back.

use chrono::Utc;
use jobq_core::{ExecutionOutput, Executor, Job, RetryPolicy, is_exhausted};
use jobq_db::{JobStore, StoreResult};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{error, info, warn};

/// Attempts at writing a claimed job's outcome before giving up. The
/// worker owns the job after a claim, so a lost write-back leaves it
/// stuck in `processing`; it is never dropped silently.
const WRITE_BACK_ATTEMPTS: u32 = 3;
const WRITE_BACK_DELAY: Duration = Duration::from_millis(500);

enum Outcome {
    Success(ExecutionOutput),
    Failure {
        message: String,
        output: ExecutionOutput,
    },
}

/// Claim → execute → record, for a single job.
pub struct ExecutionCycle {
    store: JobStore,
    executor: Arc<dyn Executor>,
    policy: RetryPolicy,
}

impl ExecutionCycle {
    pub fn new(store: JobStore, executor: Arc<dyn Executor>, policy: RetryPolicy) -> Self {
        Self {
            store,
            executor,
            policy,
        }
    }

    pub fn executor_name(&self) -> &'static str {
        self.executor.name()
    }

    /// Run a claimed job's command and record the outcome. The caller
    /// holds the claim, so the write-back is a plain point update.
    pub async fn run(&self, job: &Job) -> StoreResult<Job> {
        info!(job_id = %job.id, command = %job.command, "Running job");

        let outcome = match self.executor.run(&job.command).await {
            Ok(output) if output.success() => Outcome::Success(output),
            Ok(output) => Outcome::Failure {
                message: output.failure_message(),
                output,
            },
            Err(e) => Outcome::Failure {
                message: e.to_string(),
                output: ExecutionOutput {
                    exit_code: None,
                    stdout: String::new(),
                    stderr: String::new(),
                },
            },
        };

        self.write_outcome(job, &outcome).await
    }

    async fn write_outcome(&self, job: &Job, outcome: &Outcome) -> StoreResult<Job> {
        let mut attempt = 1;
        loop {
            match self.write_once(job, outcome).await {
                Ok(updated) => return Ok(updated),
                Err(e) if attempt < WRITE_BACK_ATTEMPTS => {
                    warn!(
                        job_id = %job.id,
                        attempt,
                        error = %e,
                        "Failed to write job outcome, retrying"
                    );
                    attempt += 1;
                    sleep(WRITE_BACK_DELAY).await;
                }
                Err(e) => {
                    error!(
                        job_id = %job.id,
                        error = %e,
                        "Giving up on outcome write-back; job remains in processing"
                    );
                    return Err(e);
                }
            }
        }
    }

    async fn write_once(&self, job: &Job, outcome: &Outcome) -> StoreResult<Job> {
        match outcome {
            Outcome::Success(output) => {
                let updated = self
                    .store
                    .complete(&job.id, &output.stdout, &output.stderr)
                    .await?;
                info!(job_id = %job.id, "Job completed");
                Ok(updated)
            }
            Outcome::Failure { message, output } => {
                let attempts = job.attempts + 1;
                // Empty stderr falls back to the failure message, so a
                // dead job always carries a reason in both fields.
                let stderr = if output.stderr.is_empty() {
                    message.as_str()
                } else {
                    output.stderr.as_str()
                };

                if is_exhausted(attempts, job.max_retries) {
                    let updated = self
                        .store
                        .fail(&job.id, attempts, message, &output.stdout, stderr, None)
                        .await?;
                    warn!(job_id = %job.id, attempts, error = %message, "Job dead, retries exhausted");
                    Ok(updated)
                } else {
                    let retry_at = self.policy.next_eligible(Utc::now(), attempts);
                    let updated = self
                        .store
                        .fail(
                            &job.id,
                            attempts,
                            message,
                            &output.stdout,
                            stderr,
                            Some(retry_at),
                        )
                        .await?;
                    warn!(
                        job_id = %job.id,
                        attempts,
                        retry_at = %retry_at,
                        error = %message,
                        "Job failed, retry scheduled"
                    );
                    Ok(updated)
                }
            }
        }
    }
}
