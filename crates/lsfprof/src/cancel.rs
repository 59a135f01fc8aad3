//! lsf-cancel - cancel LSF jobs on behalf of the workflow engine.

use clap::Parser;
use lsfprof_cli::{init_logging, CancelArgs};
use lsfprof_lsf::{kill_jobs, parse_cancel_args};
use lsfprof_shell::SystemShell;
use miette::{IntoDiagnostic, Result};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = CancelArgs::parse();
    init_logging(&args.log_level);

    let jobids = parse_cancel_args(&args.jobs);
    if jobids.is_empty() {
        tracing::error!("[cluster-cancel error] Did not get any valid jobids to cancel...");
        return Ok(());
    }

    if let Some(output) = kill_jobs(&SystemShell, &jobids).await.into_diagnostic()? {
        for line in output.stdout.lines().chain(output.stderr.lines()) {
            tracing::info!("{}", line);
        }
    }
    Ok(())
}
