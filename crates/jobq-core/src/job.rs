//! Job records and the job state machine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::{Error, Result};

/// State of a job in its lifecycle.
///
/// `Failed` never rests in the store: a failed attempt either returns the
/// job to `Pending` with a fresh `next_run`, or advances it to `Dead` once
/// retries are exhausted. It stays in the vocabulary so status summaries
/// report all five states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Pending,
    Processing,
    Completed,
    Failed,
    Dead,
}

impl JobState {
    pub const ALL: [JobState; 5] = [
        JobState::Pending,
        JobState::Processing,
        JobState::Completed,
        JobState::Failed,
        JobState::Dead,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Pending => "pending",
            JobState::Processing => "processing",
            JobState::Completed => "completed",
            JobState::Failed => "failed",
            JobState::Dead => "dead",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Completed | JobState::Dead)
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobState {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(JobState::Pending),
            "processing" => Ok(JobState::Processing),
            "completed" => Ok(JobState::Completed),
            "failed" => Ok(JobState::Failed),
            "dead" => Ok(JobState::Dead),
            other => Err(Error::InvalidInput(format!("unknown job state: {other}"))),
        }
    }
}

/// A persisted unit of work.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    /// Caller-supplied unique identifier.
    pub id: String,
    /// Shell command to execute.
    pub command: String,
    pub state: JobState,
    /// Execution attempts so far.
    pub attempts: u32,
    /// Attempt ceiling before the job goes dead.
    pub max_retries: u32,
    /// When the job next becomes eligible for a claim. Only meaningful
    /// while `Pending`; cleared once the job is dead.
    pub next_run: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    /// Captured output of the most recent execution.
    pub stdout: Option<String>,
    pub stderr: Option<String>,
    /// Worker holding the job while `Processing`.
    pub claimed_by: Option<String>,
    pub claimed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    /// Whether a claim at `now` may select this job.
    pub fn is_eligible(&self, now: DateTime<Utc>) -> bool {
        self.state == JobState::Pending && self.next_run.is_none_or(|t| t <= now)
    }
}

/// Input for enqueueing a job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewJob {
    pub id: String,
    pub command: String,
    /// Attempt ceiling; the configured default applies when absent.
    pub max_retries: Option<u32>,
}

impl NewJob {
    pub fn new(id: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            command: command.into(),
            max_retries: None,
        }
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }

    /// Validate before any store mutation.
    pub fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(Error::InvalidInput("job id must not be empty".into()));
        }
        if self.command.trim().is_empty() {
            return Err(Error::InvalidInput("job command must not be empty".into()));
        }
        if self.max_retries == Some(0) {
            return Err(Error::InvalidInput(
                "max_retries must be a positive integer".into(),
            ));
        }
        Ok(())
    }
}
