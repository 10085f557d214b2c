//! Shell command execution inside a working directory
//!
//! The batch executor applies [`ShellRunner::run`] once per command per
//! repository. Output is captured, never streamed.

use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

use crate::core::config::SHELL_COMMAND_TIMEOUT_SECS;
use crate::error::{RepoError, RepoResult};

/// Captured result of one command line
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ShellOutput {
    /// `None` when the process was terminated by a signal
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ShellOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// stdout and stderr joined, for human-readable reports
    pub fn combined(&self) -> String {
        match (self.stdout.trim(), self.stderr.trim()) {
            ("", "") => String::new(),
            (out, "") => out.to_string(),
            ("", err) => err.to_string(),
            (out, err) => format!("{out}\n{err}"),
        }
    }
}

#[async_trait]
pub trait ShellRunner: Send + Sync {
    /// Runs `command_line` with `cwd` as working directory.
    /// A non-zero exit is a normal `Ok` result; only spawn failures and
    /// timeouts are errors.
    async fn run(&self, cwd: &Path, command_line: &str) -> RepoResult<ShellOutput>;
}

/// [`ShellRunner`] backed by the platform shell (`sh -c` / `cmd /C`)
#[derive(Debug, Clone)]
pub struct SystemShell {
    timeout: Duration,
}

impl Default for SystemShell {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(SHELL_COMMAND_TIMEOUT_SECS),
        }
    }
}

impl SystemShell {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self { timeout }
    }

    fn command(command_line: &str) -> Command {
        if cfg!(windows) {
            let mut command = Command::new("cmd");
            command.args(["/C", command_line]);
            command
        } else {
            let mut command = Command::new("sh");
            command.args(["-c", command_line]);
            command
        }
    }
}

#[async_trait]
impl ShellRunner for SystemShell {
    async fn run(&self, cwd: &Path, command_line: &str) -> RepoResult<ShellOutput> {
        debug!(cwd = %cwd.display(), command = command_line, "running shell command");

        let mut command = Self::command(command_line);
        command
            .current_dir(cwd)
            .stdin(std::process::Stdio::null())
            .kill_on_drop(true);

        match tokio::time::timeout(self.timeout, command.output()).await {
            Ok(Ok(output)) => Ok(ShellOutput {
                exit_code: output.status.code(),
                stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            }),
            Ok(Err(e)) => Err(RepoError::failed(format!("failed to start '{command_line}': {e}"))),
            Err(_) => Err(RepoError::Timeout {
                operation: format!("'{command_line}'"),
                seconds: self.timeout.as_secs(),
            }),
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_captures_output_and_exit_code() {
        let dir = TempDir::new().expect("Failed to create temp directory");
        let output = SystemShell::new()
            .run(dir.path(), "echo hello; echo oops >&2; exit 3")
            .await
            .expect("shell should run");

        assert_eq!(output.exit_code, Some(3));
        assert!(!output.success());
        assert_eq!(output.stdout.trim(), "hello");
        assert_eq!(output.stderr.trim(), "oops");
        assert_eq!(output.combined(), "hello\noops");
    }

    #[tokio::test]
    async fn test_runs_in_working_directory() {
        let dir = TempDir::new().expect("Failed to create temp directory");
        std::fs::write(dir.path().join("marker.txt"), "x").expect("Failed to write");

        let output = SystemShell::new()
            .run(dir.path(), "ls")
            .await
            .expect("shell should run");
        assert!(output.success());
        assert!(output.stdout.contains("marker.txt"));
    }

    #[tokio::test]
    async fn test_timeout_is_reported() {
        let dir = TempDir::new().expect("Failed to create temp directory");
        let err = SystemShell::with_timeout(Duration::from_millis(100))
            .run(dir.path(), "sleep 5")
            .await
            .unwrap_err();
        assert!(matches!(err, RepoError::Timeout { .. }));
    }
}
