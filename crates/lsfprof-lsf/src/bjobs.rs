//! Query the state of a single LSF job via bjobs.

use crate::types::{JobId, LsfJobState, UnrecognizedStatus};
use lsfprof_shell::{CommandError, CommandLine, Shell};
use thiserror::Error;

/// A bjobs query that produced no usable state. All variants are retryable.
#[derive(Error, Debug)]
pub enum QueryFailure {
    #[error("Error calling bjobs: {0}")]
    Command(#[from] CommandError),
    #[error("bjobs error. stdout is empty. stderr = {stderr}")]
    EmptyOutput { stderr: String },
    #[error(transparent)]
    Unrecognized(#[from] UnrecognizedStatus),
}

/// `bjobs -o stat -noheader <jobid>`
pub fn bjobs_query_command(jobid: JobId) -> CommandLine {
    CommandLine::new("bjobs")
        .args(["-o", "stat", "-noheader"])
        .arg(jobid.to_string())
}

/// Parse the STAT column printed by [`bjobs_query_command`].
///
/// bjobs sometimes prints nothing for jobs that do exist, so empty output is
/// kept apart from an unknown token.
pub fn parse_stat_output(stdout: &str, stderr: &str) -> Result<LsfJobState, QueryFailure> {
    let token = stdout.trim();
    if token.is_empty() {
        return Err(QueryFailure::EmptyOutput {
            stderr: stderr.trim().to_string(),
        });
    }
    Ok(token.parse()?)
}

/// Ask bjobs for the current state of `jobid`.
pub async fn query_job_state<S: Shell>(shell: &S, jobid: JobId) -> Result<LsfJobState, QueryFailure> {
    let output = shell.run(&bjobs_query_command(jobid)).await?;
    parse_stat_output(&output.stdout, &output.stderr)
}
