//! lsf-status - report an LSF job's status to the workflow engine.
//!
//! Prints exactly one of `success`, `running` or `failed` on stdout.

use clap::Parser;
use lsfprof_cli::{init_logging, StatusArgs};
use lsfprof_lsf::StatusChecker;
use lsfprof_shell::SystemShell;
use miette::{IntoDiagnostic, Result};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = StatusArgs::parse();
    init_logging(&args.log_level);

    let (budget, policy) = args.settings().into_diagnostic()?;
    tracing::debug!(
        "Checking job {} (log {}, {:?}, {:?})",
        args.jobid,
        args.outlog,
        budget,
        policy
    );

    let checker = StatusChecker::new(SystemShell, args.jobid, args.outlog.clone())
        .with_retry_budget(budget)
        .with_policy(policy);
    let status = checker.get_status().await.into_diagnostic()?;

    println!("{}", status);
    Ok(())
}
