//! Operating-system boundary for the LSF profile tools.
//!
//! Everything that touches processes or the filesystem goes through the
//! [`Shell`] trait so the status logic can be exercised against recorded
//! responses instead of a live cluster.

pub mod command;
pub mod tail;

use camino::Utf8Path;
use std::future::Future;

pub use command::{
    run_command, run_command_allow_failure, CommandError, CommandLine, CommandOutput,
};
pub use tail::{tail_lines, TailError};

/// Process execution and file access used by the LSF wrappers.
pub trait Shell {
    /// Run a command, failing on a non-zero exit status.
    fn run(&self, line: &CommandLine) -> impl Future<Output = Result<CommandOutput, CommandError>>;

    /// Run a command whose exit status is irrelevant to the caller.
    fn run_allow_failure(
        &self,
        line: &CommandLine,
    ) -> impl Future<Output = Result<CommandOutput, CommandError>>;

    /// Read the last `num_lines` lines of a file.
    fn tail(&self, path: &Utf8Path, num_lines: usize) -> Result<Vec<String>, TailError>;
}

/// The real operating system.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemShell;

impl Shell for SystemShell {
    async fn run(&self, line: &CommandLine) -> Result<CommandOutput, CommandError> {
        tracing::debug!("Running {}", line);
        run_command(line).await
    }

    async fn run_allow_failure(&self, line: &CommandLine) -> Result<CommandOutput, CommandError> {
        tracing::debug!("Running {}", line);
        run_command_allow_failure(line).await
    }

    fn tail(&self, path: &Utf8Path, num_lines: usize) -> Result<Vec<String>, TailError> {
        tail_lines(path, num_lines)
    }
}
