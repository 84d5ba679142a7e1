//! # Command Runner
//!
//! Executes shell-level build steps. The job runner environment is an external
//! collaborator; this adapter only spawns the command, injects the job variables as
//! environment variables and reports the exit status.

use crate::error::{ProvisioningError, Result};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tokio::time::timeout;
use tracing::debug;

const MAX_CAPTURED_BYTES: usize = 64 * 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub duration: Duration,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// Last non-empty line of stdout, trimmed.
    pub fn last_line(&self) -> Option<&str> {
        self.stdout
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .last()
    }
}

#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run `command`; a non-zero exit is reported in the output, not as `Err`.
    async fn run(&self, command: &str, env: &BTreeMap<String, String>) -> Result<CommandOutput>;
}

#[derive(Debug, Clone)]
pub struct ShellCommandRunner {
    shell: String,
    timeout: Option<Duration>,
    working_directory: Option<PathBuf>,
}

impl ShellCommandRunner {
    pub fn new(shell: impl Into<String>) -> Self {
        Self {
            shell: shell.into(),
            timeout: None,
            working_directory: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_working_directory(mut self, directory: Option<PathBuf>) -> Self {
        self.working_directory = directory;
        self
    }
}

impl Default for ShellCommandRunner {
    fn default() -> Self {
        Self::new("sh")
    }
}

#[async_trait]
impl CommandRunner for ShellCommandRunner {
    async fn run(&self, command: &str, env: &BTreeMap<String, String>) -> Result<CommandOutput> {
        let started = Instant::now();
        let mut process = Command::new(&self.shell);
        process
            .arg("-c")
            .arg(command)
            .envs(env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(directory) = &self.working_directory {
            process.current_dir(directory);
        }

        debug!(shell = %self.shell, command = %command, "Spawning shell command");

        let output = match self.timeout {
            Some(limit) => timeout(limit, process.output()).await.map_err(|_| {
                ProvisioningError::StepExecutionFailed {
                    step: command.to_string(),
                    exit_code: None,
                    reason: format!("timed out after {limit:?}"),
                }
            })?,
            None => process.output().await,
        }
        .map_err(|e| ProvisioningError::StepExecutionFailed {
            step: command.to_string(),
            exit_code: None,
            reason: format!("failed to spawn {}: {e}", self.shell),
        })?;

        Ok(CommandOutput {
            exit_code: output.status.code(),
            stdout: truncate_to_limit(&output.stdout),
            stderr: truncate_to_limit(&output.stderr),
            duration: started.elapsed(),
        })
    }
}

fn truncate_to_limit(bytes: &[u8]) -> String {
    let end = bytes.len().min(MAX_CAPTURED_BYTES);
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}

/// Single-quote `value` for safe interpolation into a shell command line.
pub fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_runs_command_with_injected_env() {
        let runner = ShellCommandRunner::default();
        let env = BTreeMap::from([("USER_NAME".to_string(), "alice.smith".to_string())]);
        let output = runner.run("echo \"user=$USER_NAME\"", &env).await.unwrap();
        assert!(output.success());
        assert_eq!(output.last_line(), Some("user=alice.smith"));
    }

    #[tokio::test]
    async fn test_non_zero_exit_is_reported() {
        let runner = ShellCommandRunner::default();
        let output = runner
            .run("echo oops >&2; exit 3", &BTreeMap::new())
            .await
            .unwrap();
        assert!(!output.success());
        assert_eq!(output.exit_code, Some(3));
        assert_eq!(output.stderr.trim(), "oops");
    }

    #[tokio::test]
    async fn test_timeout_is_a_step_failure() {
        let runner =
            ShellCommandRunner::default().with_timeout(Some(Duration::from_millis(100)));
        let result = runner.run("sleep 5", &BTreeMap::new()).await;
        assert!(matches!(
            result,
            Err(ProvisioningError::StepExecutionFailed { exit_code: None, .. })
        ));
    }

    #[test]
    fn test_shell_quote() {
        assert_eq!(shell_quote("alice"), "'alice'");
        assert_eq!(shell_quote("it's"), r"'it'\''s'");
    }
}
