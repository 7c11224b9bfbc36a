//! Executor trait and execution output types.
//!
//! Executors run a job's command on the host and report what happened.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::Result;

/// Captured result of running a job's command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionOutput {
    /// Exit code, if the process ran to completion and reported one.
    /// `None` means the process was terminated by a signal.
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ExecutionOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// Failure description recorded into the job's `last_error`.
    pub fn failure_message(&self) -> String {
        match self.exit_code {
            Some(code) => format!("command exited with status {code}"),
            None => "command terminated by signal".to_string(),
        }
    }
}

/// Trait for job command executors.
///
/// A non-zero exit is not an `Err`: it comes back as `ExecutionOutput`
/// data and drives the retry transition. `Err` means the command could
/// not be run at all (spawn failure).
#[async_trait]
pub trait Executor: Send + Sync {
    /// Name of this executor.
    fn name(&self) -> &'static str;

    /// Run a single command to completion, capturing its output.
    async fn run(&self, command: &str) -> Result<ExecutionOutput>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_requires_zero_exit() {
        let ok = ExecutionOutput {
            exit_code: Some(0),
            stdout: String::new(),
            stderr: String::new(),
        };
        let failed = ExecutionOutput {
            exit_code: Some(1),
            ..ok.clone()
        };
        let signalled = ExecutionOutput {
            exit_code: None,
            ..ok.clone()
        };

        assert!(ok.success());
        assert!(!failed.success());
        assert!(!signalled.success());
    }

    #[test]
    fn test_failure_message_names_exit_status() {
        let failed = ExecutionOutput {
            exit_code: Some(7),
            stdout: String::new(),
            stderr: String::new(),
        };
        assert_eq!(failed.failure_message(), "command exited with status 7");

        let signalled = ExecutionOutput {
            exit_code: None,
            ..failed
        };
        assert_eq!(signalled.failure_message(), "command terminated by signal");
    }
}
