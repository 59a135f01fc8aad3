//! Job status from the LSF summary appended to a job's output log.
//!
//! When a job finishes, LSF appends a block like
//!
//! ```text
//! Successfully completed.
//!
//! Resource usage summary:
//! ```
//!
//! to its stdout file. The status sentence sits two lines above the marker.

use crate::types::JobStatus;
use thiserror::Error;

/// Enough lines to hold the whole completion summary.
pub const LOG_TAIL_LINES: usize = 30;

pub const RESOURCE_USAGE_MARKER: &str = "Resource usage summary:";
pub const SUCCESS_LINE: &str = "Successfully completed.";
pub const FAILURE_PREFIX: &str = "Exited with exit code";

/// The line above the resource summary is not one LSF writes.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unrecognized status line: {0:?}")]
pub struct UnknownStatusLine(pub String);

/// Classify a log tail. A tail without the summary marker means the job is
/// still running.
pub fn status_from_log_tail<S: AsRef<str>>(lines: &[S]) -> Result<JobStatus, UnknownStatusLine> {
    let Some(marker) = lines
        .iter()
        .position(|line| line.as_ref().trim() == RESOURCE_USAGE_MARKER)
    else {
        return Ok(JobStatus::Running);
    };

    let status_line = marker
        .checked_sub(2)
        .map(|idx| lines[idx].as_ref().trim())
        .ok_or_else(|| UnknownStatusLine(String::new()))?;

    if status_line == SUCCESS_LINE {
        Ok(JobStatus::Success)
    } else if status_line.starts_with(FAILURE_PREFIX) {
        Ok(JobStatus::Failed)
    } else {
        Err(UnknownStatusLine(status_line.to_string()))
    }
}
