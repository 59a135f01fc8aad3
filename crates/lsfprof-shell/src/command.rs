//! Command execution utilities for LSF tools.

use std::fmt;
use thiserror::Error;
use tokio::process::Command;

/// Error type for command execution.
#[derive(Error, Debug)]
pub enum CommandError {
    #[error("Failed to execute {command}: {error}")]
    Execution { command: String, error: String },
    #[error("Command {command} failed: {stderr}")]
    Failed {
        command: String,
        code: Option<i32>,
        stderr: String,
    },
}

/// A program and its arguments, run without an intermediate shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    program: String,
    args: Vec<String>,
}

impl CommandLine {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, A>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn get_args(&self) -> &[String] {
        &self.args
    }

    fn to_command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        cmd.kill_on_drop(true);
        cmd
    }
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// Captured output of a finished command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn new(stdout: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into(),
            stderr: stderr.into(),
        }
    }
}

async fn capture(line: &CommandLine) -> Result<std::process::Output, CommandError> {
    line.to_command()
        .output()
        .await
        .map_err(|e| CommandError::Execution {
            command: line.to_string(),
            error: e.to_string(),
        })
}

/// Execute a command and return its stdout and stderr.
///
/// A non-zero exit status is reported as [`CommandError::Failed`].
pub async fn run_command(line: &CommandLine) -> Result<CommandOutput, CommandError> {
    let output = capture(line).await?;

    if !output.status.success() {
        return Err(CommandError::Failed {
            command: line.to_string(),
            code: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        });
    }

    Ok(CommandOutput {
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    })
}

/// Execute a command and return its output, treating non-zero exit as OK.
///
/// Used where the exit status carries no information we act on (bkill).
pub async fn run_command_allow_failure(line: &CommandLine) -> Result<CommandOutput, CommandError> {
    let output = capture(line).await?;
    if !output.status.success() {
        tracing::debug!("{} exited with {}", line, output.status);
    }

    Ok(CommandOutput {
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_line_display() {
        let line = CommandLine::new("bjobs")
            .args(["-o", "stat", "-noheader"])
            .arg("123");
        assert_eq!(line.to_string(), "bjobs -o stat -noheader 123");
        assert_eq!(line.program(), "bjobs");
        assert_eq!(line.get_args().len(), 4);
    }

    #[tokio::test]
    async fn test_run_command_success() {
        let line = CommandLine::new("sh").args(["-c", "echo hello; echo oops >&2"]);
        let output = run_command(&line).await.unwrap();
        assert_eq!(output.stdout.trim(), "hello");
        assert_eq!(output.stderr.trim(), "oops");
    }

    #[tokio::test]
    async fn test_run_command_non_zero_exit() {
        let line = CommandLine::new("sh").args(["-c", "echo gone >&2; exit 255"]);
        let result = run_command(&line).await;
        match result {
            Err(CommandError::Failed { code, stderr, .. }) => {
                assert_eq!(code, Some(255));
                assert_eq!(stderr.trim(), "gone");
            }
            other => panic!("expected Failed, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_run_command_allow_failure() {
        let line = CommandLine::new("sh").args(["-c", "echo partial; exit 1"]);
        let output = run_command_allow_failure(&line).await.unwrap();
        assert_eq!(output.stdout.trim(), "partial");
    }

    #[tokio::test]
    async fn test_run_command_not_found() {
        let line = CommandLine::new("nonexistent_command_12345");
        let result = run_command(&line).await;
        assert!(matches!(result, Err(CommandError::Execution { .. })));
    }
}
