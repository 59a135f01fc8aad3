//! Cancel LSF jobs via bkill.

use crate::types::JobId;
use lsfprof_shell::{CommandError, CommandLine, CommandOutput, Shell};

/// `bkill -r <jobid>`: remove the job even if its host is unreachable.
pub fn force_kill_command(jobid: JobId) -> CommandLine {
    CommandLine::new("bkill").arg("-r").arg(jobid.to_string())
}

/// `bkill <jobid>...`
pub fn kill_command(jobids: &[JobId]) -> CommandLine {
    CommandLine::new("bkill").args(jobids.iter().map(JobId::to_string))
}

/// Extract job ids from cancel arguments.
///
/// Workflow engines pass whatever the submit step printed, which may be
/// `"1234 logs/rule.out"` as one quoted argument. Only purely numeric tokens
/// are kept.
pub fn parse_cancel_args<I, A>(args: I) -> Vec<JobId>
where
    I: IntoIterator<Item = A>,
    A: AsRef<str>,
{
    args.into_iter()
        .flat_map(|arg| {
            arg.as_ref()
                .split_whitespace()
                .map(|token| token.trim_matches(|c| c == '"' || c == '\''))
                .filter_map(|token| token.parse::<JobId>().ok())
                .collect::<Vec<_>>()
        })
        .collect()
}

/// Kill the given jobs, ignoring bkill's exit status.
///
/// Returns `Ok(None)` without running anything when `jobids` is empty: a bare
/// `bkill` would kill the caller's most recent job.
pub async fn kill_jobs<S: Shell>(
    shell: &S,
    jobids: &[JobId],
) -> Result<Option<CommandOutput>, CommandError> {
    if jobids.is_empty() {
        return Ok(None);
    }
    let output = shell.run_allow_failure(&kill_command(jobids)).await?;
    Ok(Some(output))
}
