//! lsf-submit - submit a workflow jobscript to LSF.
//!
//! Prints `<jobid> <outlog>` on stdout; the workflow engine hands both to
//! lsf-status and lsf-cancel.

use clap::Parser;
use lsfprof_cli::{init_logging, SubmitArgs};
use lsfprof_lsf::{submit_job, BsubJob, JobProperties};
use lsfprof_shell::SystemShell;
use miette::{IntoDiagnostic, Result};
use uuid::Uuid;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = SubmitArgs::parse();
    init_logging(&args.log_level);

    let (defaults, cluster_config) = args.settings().into_diagnostic()?;
    let properties = JobProperties::from_jobscript(args.jobscript()).into_diagnostic()?;
    let job = BsubJob::new(
        args.jobscript(),
        args.cluster_args().to_vec(),
        properties,
        defaults,
        Uuid::new_v4().to_string(),
    )
    .with_cluster_config(&cluster_config);

    let jobid = submit_job(&SystemShell, &job).await.into_diagnostic()?;
    tracing::debug!("Submitted {} as job {}", job.jobname(), jobid);

    println!("{} {}", jobid, job.outlog());
    Ok(())
}
