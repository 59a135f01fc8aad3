//! Reconcile the status of one LSF job.
//!
//! bjobs is the preferred source, but it is rate limited and occasionally
//! prints nothing or garbage for jobs that exist. Each query is retried a
//! bounded number of times; if none succeeds the summary LSF writes to the
//! job's output log is used instead.

use crate::bjobs::{query_job_state, QueryFailure};
use crate::bkill::force_kill_command;
use crate::log::{status_from_log_tail, UnknownStatusLine, LOG_TAIL_LINES};
use crate::types::{JobId, JobStatus, LsfJobState, UnknownPolicy, ZombiePolicy};
use camino::{Utf8Path, Utf8PathBuf};
use lsfprof_shell::{Shell, TailError};
use std::time::Duration;
use thiserror::Error;

/// Errors that end a status check. Everything else is retried or falls back.
#[derive(Error, Debug)]
pub enum StatusError {
    #[error("{source} in {path}")]
    UnknownStatusLine {
        path: Utf8PathBuf,
        source: UnknownStatusLine,
    },
    #[error(transparent)]
    Log(TailError),
}

/// How many times to ask bjobs, and how long to wait in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryBudget {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for RetryBudget {
    fn default() -> Self {
        Self {
            max_attempts: 1,
            delay: Duration::from_millis(1),
        }
    }
}

/// Handling of the two states that say nothing definite about the job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatusPolicy {
    pub unknown: UnknownPolicy,
    pub zombie: ZombiePolicy,
}

impl StatusPolicy {
    /// Map an LSF state to a job status, and whether the job must be killed.
    pub fn resolve(&self, state: LsfJobState) -> (JobStatus, bool) {
        match state {
            LsfJobState::Unknown => match self.unknown {
                UnknownPolicy::Wait => (JobStatus::Running, false),
                UnknownPolicy::Kill => (JobStatus::Failed, true),
            },
            LsfJobState::Zombie => (JobStatus::Failed, self.zombie == ZombiePolicy::Kill),
            other => (other.job_status(), false),
        }
    }
}

/// Determines the status of a single job. Built fresh for every check.
pub struct StatusChecker<S> {
    shell: S,
    jobid: JobId,
    outlog: Utf8PathBuf,
    budget: RetryBudget,
    policy: StatusPolicy,
}

impl<S: Shell> StatusChecker<S> {
    pub fn new(shell: S, jobid: JobId, outlog: impl Into<Utf8PathBuf>) -> Self {
        Self {
            shell,
            jobid,
            outlog: outlog.into(),
            budget: RetryBudget::default(),
            policy: StatusPolicy::default(),
        }
    }

    pub fn with_retry_budget(mut self, budget: RetryBudget) -> Self {
        self.budget = budget;
        self
    }

    pub fn with_policy(mut self, policy: StatusPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn jobid(&self) -> JobId {
        self.jobid
    }

    pub fn outlog(&self) -> &Utf8Path {
        &self.outlog
    }

    pub fn shell(&self) -> &S {
        &self.shell
    }

    /// Current status of the job.
    ///
    /// Only a malformed completion summary in the log is an error; transient
    /// bjobs failures are retried and then resolved from the log.
    pub async fn get_status(&self) -> Result<JobStatus, StatusError> {
        let max = self.budget.max_attempts;
        for attempt in 1..=max {
            match self.query_status_using_bjobs().await {
                Ok(status) => return Ok(status),
                Err(e) => {
                    tracing::warn!(
                        "[Predicted exception] {} (job {}, attempt {}/{})",
                        e,
                        self.jobid,
                        attempt,
                        max
                    );
                    if attempt < max {
                        tracing::warn!("Resuming...");
                        tokio::time::sleep(self.budget.delay).await;
                    }
                }
            }
        }

        if max > 0 {
            tracing::warn!("bjobs failed {} times. Checking log...", max);
        }
        self.query_status_using_log()
    }

    /// One bjobs query, with UNKWN/ZOMBI handled by policy.
    pub async fn query_status_using_bjobs(&self) -> Result<JobStatus, QueryFailure> {
        let state = query_job_state(&self.shell, self.jobid).await?;
        let (status, kill) = self.policy.resolve(state);
        if kill {
            tracing::warn!(
                "[lsf profile warning] {} job status detected for {}. Killing job...",
                state,
                self.jobid
            );
            self.kill_job().await;
        }
        tracing::debug!("bjobs reports {} for job {}: {}", state, self.jobid, status);
        Ok(status)
    }

    /// Status from the completion summary at the end of the output log.
    pub fn query_status_using_log(&self) -> Result<JobStatus, StatusError> {
        let tail = match self.shell.tail(&self.outlog, LOG_TAIL_LINES) {
            Ok(tail) => tail,
            Err(TailError::NotFound(path)) => {
                tracing::info!("Log {} does not exist yet; assuming job is running", path);
                return Ok(JobStatus::Running);
            }
            Err(e) => return Err(StatusError::Log(e)),
        };

        status_from_log_tail(&tail).map_err(|source| StatusError::UnknownStatusLine {
            path: self.outlog.clone(),
            source,
        })
    }

    async fn kill_job(&self) {
        if let Err(e) = self.shell.run_allow_failure(&force_kill_command(self.jobid)).await {
            tracing::warn!("Failed to kill job {}: {}", self.jobid, e);
        }
    }
}
