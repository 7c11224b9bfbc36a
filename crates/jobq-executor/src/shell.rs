//! Shell command execution on the host.

use async_trait::async_trait;
use jobq_core::{Error, ExecutionOutput, Executor, Result};
use tokio::process::Command;
use tracing::debug;

/// Runs job commands under the system shell, capturing exit status and
/// both output streams.
///
/// No sandboxing and no timeout: the command can do anything the host
/// user can, and a hung command occupies its worker's single execution
/// slot until it exits.
#[derive(Debug, Clone, Copy, Default)]
pub struct ShellExecutor;

impl ShellExecutor {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Executor for ShellExecutor {
    fn name(&self) -> &'static str {
        "shell"
    }

    async fn run(&self, command: &str) -> Result<ExecutionOutput> {
        debug!(command, "Spawning shell command");

        let output = shell_command(command)
            .output()
            .await
            .map_err(|e| Error::ExecutionFailure(format!("failed to spawn command: {e}")))?;

        Ok(ExecutionOutput {
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

#[cfg(unix)]
fn shell_command(command: &str) -> Command {
    let mut cmd = Command::new("sh");
    cmd.arg("-c").arg(command);
    cmd
}

#[cfg(windows)]
fn shell_command(command: &str) -> Command {
    let mut cmd = Command::new("cmd");
    cmd.arg("/C").arg(command);
    cmd
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_zero_exit_captures_stdout() {
        let output = ShellExecutor::new().run("echo hello").await.unwrap();
        assert!(output.success());
        assert_eq!(output.exit_code, Some(0));
        assert_eq!(output.stdout.trim(), "hello");
        assert!(output.stderr.is_empty());
    }

    #[tokio::test]
    async fn test_nonzero_exit_is_data_not_error() {
        let output = ShellExecutor::new().run("exit 3").await.unwrap();
        assert!(!output.success());
        assert_eq!(output.exit_code, Some(3));
    }

    #[tokio::test]
    async fn test_stderr_is_captured_separately() {
        let output = ShellExecutor::new()
            .run("echo out && echo err 1>&2")
            .await
            .unwrap();
        assert_eq!(output.stdout.trim(), "out");
        assert_eq!(output.stderr.trim(), "err");
    }

    #[tokio::test]
    async fn test_unknown_command_fails_via_shell_exit() {
        // The shell spawns fine and reports the missing binary itself.
        let output = ShellExecutor::new()
            .run("definitely-not-a-real-binary-xyz")
            .await
            .unwrap();
        assert!(!output.success());
        assert!(!output.stderr.is_empty());
    }
}
