//! The job table and its operations.

use chrono::{DateTime, TimeZone, Utc};
use jobq_core::{Job, JobState, NewJob};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::debug;

use crate::{StoreError, StoreResult};

/// A job row as persisted. Timestamps are epoch milliseconds; state is
/// the lowercase string form. Converted to [`Job`] at the crate boundary.
#[derive(Debug, sqlx::FromRow)]
struct JobRow {
    id: String,
    command: String,
    state: String,
    attempts: i64,
    max_retries: i64,
    next_run: Option<i64>,
    last_error: Option<String>,
    stdout: Option<String>,
    stderr: Option<String>,
    claimed_by: Option<String>,
    claimed_at: Option<i64>,
    created_at: i64,
    updated_at: i64,
}

impl JobRow {
    fn into_job(self) -> StoreResult<Job> {
        let state = self
            .state
            .parse::<JobState>()
            .map_err(|e| StoreError::Corrupt(e.to_string()))?;
        Ok(Job {
            id: self.id,
            command: self.command,
            state,
            attempts: self.attempts as u32,
            max_retries: self.max_retries as u32,
            next_run: self.next_run.map(millis_to_utc).transpose()?,
            last_error: self.last_error,
            stdout: self.stdout,
            stderr: self.stderr,
            claimed_by: self.claimed_by,
            claimed_at: self.claimed_at.map(millis_to_utc).transpose()?,
            created_at: millis_to_utc(self.created_at)?,
            updated_at: millis_to_utc(self.updated_at)?,
        })
    }
}

fn millis_to_utc(ms: i64) -> StoreResult<DateTime<Utc>> {
    Utc.timestamp_millis_opt(ms)
        .single()
        .ok_or_else(|| StoreError::Corrupt(format!("timestamp out of range: {ms}")))
}

fn to_millis(t: DateTime<Utc>) -> i64 {
    t.timestamp_millis()
}

fn or_null(s: &str) -> Option<&str> {
    (!s.is_empty()).then_some(s)
}

/// Per-state job counts. Every state is reported, zeros included.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusSummary {
    pub pending: u64,
    pub processing: u64,
    pub completed: u64,
    pub failed: u64,
    pub dead: u64,
}

impl StatusSummary {
    pub fn count(&self, state: JobState) -> u64 {
        match state {
            JobState::Pending => self.pending,
            JobState::Processing => self.processing,
            JobState::Completed => self.completed,
            JobState::Failed => self.failed,
            JobState::Dead => self.dead,
        }
    }

    pub fn total(&self) -> u64 {
        JobState::ALL.iter().map(|s| self.count(*s)).sum()
    }
}

/// Job table backed by SQLite.
#[derive(Debug, Clone)]
pub struct JobStore {
    pool: SqlitePool,
}

impl JobStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Enqueue a new pending job, immediately eligible (`next_run` at
    /// the epoch start). Fails with `DuplicateId` when the id is taken.
    pub async fn enqueue(&self, new: NewJob, default_max_retries: u32) -> StoreResult<Job> {
        new.validate()?;
        let max_retries = new.max_retries.unwrap_or(default_max_retries);
        let now = to_millis(Utc::now());

        let row = sqlx::query_as::<_, JobRow>(
            r#"
            INSERT INTO jobs (id, command, state, attempts, max_retries, next_run, created_at, updated_at)
            VALUES (?1, ?2, 'pending', 0, ?3, 0, ?4, ?4)
            RETURNING *
            "#,
        )
        .bind(&new.id)
        .bind(&new.command)
        .bind(max_retries as i64)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_unique_violation(e, &new.id))?;

        debug!(job_id = %new.id, max_retries, "Enqueued job");
        row.into_job()
    }

    /// Atomically claim the next eligible job for `worker_id`.
    ///
    /// One conditional update, not a read followed by a write: SQLite
    /// serialises writers, so when N workers race, each eligible job is
    /// handed to at most one of them. Oldest-created wins ties, then
    /// lowest `seq`. `None` means nothing is eligible.
    pub async fn claim_next(&self, worker_id: &str) -> StoreResult<Option<Job>> {
        let now = to_millis(Utc::now());

        let row = sqlx::query_as::<_, JobRow>(
            r#"
            UPDATE jobs
            SET state = 'processing', claimed_by = ?1, claimed_at = ?2, updated_at = ?2
            WHERE seq = (
                SELECT seq FROM jobs
                WHERE state = 'pending' AND next_run <= ?2
                ORDER BY created_at ASC, seq ASC
                LIMIT 1
            )
            RETURNING *
            "#,
        )
        .bind(worker_id)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        row.map(JobRow::into_job).transpose()
    }

    /// Record a successful execution.
    pub async fn complete(&self, id: &str, stdout: &str, stderr: &str) -> StoreResult<Job> {
        let now = to_millis(Utc::now());

        let row = sqlx::query_as::<_, JobRow>(
            r#"
            UPDATE jobs
            SET state = 'completed', stdout = ?2, stderr = ?3, last_error = NULL, updated_at = ?4
            WHERE id = ?1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(or_null(stdout))
        .bind(or_null(stderr))
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        row.ok_or_else(|| StoreError::NotFound(id.to_string()))?.into_job()
    }

    /// Record a failed attempt. `retry_at` present puts the job back in
    /// `pending` for that time; absent sends it to the dead-letter state
    /// with `next_run` cleared.
    pub async fn fail(
        &self,
        id: &str,
        attempts: u32,
        error: &str,
        stdout: &str,
        stderr: &str,
        retry_at: Option<DateTime<Utc>>,
    ) -> StoreResult<Job> {
        let now = to_millis(Utc::now());
        let (state, next_run) = match retry_at {
            Some(t) => ("pending", Some(to_millis(t))),
            None => ("dead", None),
        };

        let row = sqlx::query_as::<_, JobRow>(
            r#"
            UPDATE jobs
            SET state = ?2, attempts = ?3, last_error = ?4, stdout = ?5, stderr = ?6,
                next_run = ?7, updated_at = ?8
            WHERE id = ?1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(state)
        .bind(attempts as i64)
        .bind(error)
        .bind(or_null(stdout))
        .bind(or_null(stderr))
        .bind(next_run)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        row.ok_or_else(|| StoreError::NotFound(id.to_string()))?.into_job()
    }

    /// Dead-letter requeue: reset a dead job to pending, immediately
    /// eligible, with attempts and the last error cleared.
    ///
    /// Restricted to dead jobs. Requeueing a job in any live state would
    /// put a second eligible copy of work a worker may still own into
    /// the queue, so that is a `Conflict`.
    pub async fn requeue_dead(&self, id: &str) -> StoreResult<Job> {
        let now = to_millis(Utc::now());

        let row = sqlx::query_as::<_, JobRow>(
            r#"
            UPDATE jobs
            SET state = 'pending', attempts = 0, next_run = 0, last_error = NULL,
                claimed_by = NULL, claimed_at = NULL, updated_at = ?2
            WHERE id = ?1 AND state = 'dead'
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => row.into_job(),
            None => {
                let job = self.get(id).await?;
                Err(StoreError::Conflict(format!(
                    "job {} is {}, not dead",
                    id, job.state
                )))
            }
        }
    }

    /// Fetch one job by id.
    pub async fn get(&self, id: &str) -> StoreResult<Job> {
        let row = sqlx::query_as::<_, JobRow>("SELECT * FROM jobs WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.ok_or_else(|| StoreError::NotFound(id.to_string()))?.into_job()
    }

    /// Count jobs per state.
    pub async fn status_summary(&self) -> StoreResult<StatusSummary> {
        let rows: Vec<(String, i64)> =
            sqlx::query_as("SELECT state, COUNT(*) FROM jobs GROUP BY state")
                .fetch_all(&self.pool)
                .await?;

        let mut summary = StatusSummary::default();
        for (state, count) in rows {
            let state = state
                .parse::<JobState>()
                .map_err(|e| StoreError::Corrupt(e.to_string()))?;
            let count = count as u64;
            match state {
                JobState::Pending => summary.pending = count,
                JobState::Processing => summary.processing = count,
                JobState::Completed => summary.completed = count,
                JobState::Failed => summary.failed = count,
                JobState::Dead => summary.dead = count,
            }
        }
        Ok(summary)
    }

    /// List jobs, optionally filtered by state, newest-created first.
    pub async fn list(&self, state: Option<JobState>) -> StoreResult<Vec<Job>> {
        let rows = match state {
            Some(state) => {
                sqlx::query_as::<_, JobRow>(
                    "SELECT * FROM jobs WHERE state = ?1 ORDER BY created_at DESC, seq DESC",
                )
                .bind(state.as_str())
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, JobRow>("SELECT * FROM jobs ORDER BY created_at DESC, seq DESC")
                    .fetch_all(&self.pool)
                    .await?
            }
        };
        rows.into_iter().map(JobRow::into_job).collect()
    }

    /// Sweep `processing` jobs claimed at or before `cutoff` back to
    /// pending, immediately eligible, attempts untouched. Returns how
    /// many were reclaimed. Backs the optional orphaned-claim recovery.
    pub async fn reclaim_stale(&self, cutoff: DateTime<Utc>) -> StoreResult<u64> {
        let now = to_millis(Utc::now());

        let result = sqlx::query(
            r#"
            UPDATE jobs
            SET state = 'pending', next_run = 0, claimed_by = NULL, claimed_at = NULL,
                updated_at = ?2
            WHERE state = 'processing' AND claimed_at <= ?1
            "#,
        )
        .bind(to_millis(cutoff))
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}

fn map_unique_violation(e: sqlx::Error, id: &str) -> StoreError {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            StoreError::DuplicateId(id.to_string())
        }
        _ => StoreError::Database(e),
    }
}
