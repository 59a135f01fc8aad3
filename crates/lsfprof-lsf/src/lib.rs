//! LSF integration for the workflow profile.
//!
//! Submit jobs via bsub, query job status via bjobs with a fallback to the
//! job's output log, and cancel jobs via bkill.

pub mod bjobs;
pub mod bkill;
pub mod bsub;
pub mod log;
pub mod memory;
pub mod status;
pub mod types;

pub use bjobs::{query_job_state, QueryFailure};
pub use bkill::{kill_jobs, parse_cancel_args};
pub use bsub::{
    parse_submitted_jobid, submit_job, BsubJob, ClusterConfig, JobProperties, SubmitDefaults,
    SubmitError,
};
pub use log::{status_from_log_tail, UnknownStatusLine};
pub use memory::{Memory, MemoryError, Unit};
pub use status::{RetryBudget, StatusChecker, StatusError, StatusPolicy};
pub use types::{
    JobId, JobIdError, JobStatus, LsfJobState, PolicyParseError, UnknownPolicy,
    UnrecognizedStatus, ZombiePolicy,
};
