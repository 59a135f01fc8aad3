//! LSF job types.

use serde::Deserialize;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// LSF job ID, assigned by the cluster at submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JobId(u64);

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid LSF job ID: {0:?}")]
pub struct JobIdError(pub String);

impl JobId {
    pub fn new(id: u64) -> Option<Self> {
        (id > 0).then_some(Self(id))
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl FromStr for JobId {
    type Err = JobIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
            return Err(JobIdError(s.to_string()));
        }
        trimmed
            .parse()
            .ok()
            .and_then(JobId::new)
            .ok_or_else(|| JobIdError(s.to_string()))
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Status reported back to the workflow engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobStatus {
    Success,
    Running,
    Failed,
}

impl JobStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Success => "success",
            JobStatus::Running => "running",
            JobStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// LSF job status, as printed in the bjobs `STAT` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LsfJobState {
    /// PEND - Job is pending
    Pending,
    /// RUN - Job is running
    Running,
    /// PSUSP - Job suspended by user while pending
    UserSuspendedPending,
    /// USUSP - Job suspended by user while running
    UserSuspended,
    /// SSUSP - Job suspended by system
    SystemSuspended,
    /// WAIT - Job is waiting for its chunk to start
    Waiting,
    /// DONE - Job completed successfully
    Done,
    /// POST_DONE - Post-processing completed successfully
    PostDone,
    /// EXIT - Job exited with non-zero status
    Exit,
    /// POST_ERR - Post-processing failed
    PostError,
    /// ZOMBI - Job was killed but its execution host is unreachable
    Zombie,
    /// UNKWN - mbatchd lost contact with the execution host
    Unknown,
}

/// A `STAT` token outside the LSF vocabulary.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown job status: {0:?}")]
pub struct UnrecognizedStatus(pub String);

impl LsfJobState {
    pub const ALL: [LsfJobState; 12] = [
        LsfJobState::Pending,
        LsfJobState::Running,
        LsfJobState::UserSuspendedPending,
        LsfJobState::UserSuspended,
        LsfJobState::SystemSuspended,
        LsfJobState::Waiting,
        LsfJobState::Done,
        LsfJobState::PostDone,
        LsfJobState::Exit,
        LsfJobState::PostError,
        LsfJobState::Zombie,
        LsfJobState::Unknown,
    ];

    pub fn token(self) -> &'static str {
        match self {
            LsfJobState::Pending => "PEND",
            LsfJobState::Running => "RUN",
            LsfJobState::UserSuspendedPending => "PSUSP",
            LsfJobState::UserSuspended => "USUSP",
            LsfJobState::SystemSuspended => "SSUSP",
            LsfJobState::Waiting => "WAIT",
            LsfJobState::Done => "DONE",
            LsfJobState::PostDone => "POST_DONE",
            LsfJobState::Exit => "EXIT",
            LsfJobState::PostError => "POST_ERR",
            LsfJobState::Zombie => "ZOMBI",
            LsfJobState::Unknown => "UNKWN",
        }
    }

    /// Fixed mapping from LSF state to workflow status.
    ///
    /// UNKWN and ZOMBI are normally resolved by policy before reaching this table.
    pub fn job_status(self) -> JobStatus {
        match self {
            LsfJobState::Pending
            | LsfJobState::Running
            | LsfJobState::UserSuspendedPending
            | LsfJobState::UserSuspended
            | LsfJobState::SystemSuspended
            | LsfJobState::Waiting
            | LsfJobState::Unknown => JobStatus::Running,
            LsfJobState::Done | LsfJobState::PostDone => JobStatus::Success,
            LsfJobState::Exit | LsfJobState::PostError | LsfJobState::Zombie => JobStatus::Failed,
        }
    }
}

impl FromStr for LsfJobState {
    type Err = UnrecognizedStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let token = s.trim();
        LsfJobState::ALL
            .into_iter()
            .find(|state| state.token() == token)
            .ok_or_else(|| UnrecognizedStatus(token.to_string()))
    }
}

impl fmt::Display for LsfJobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown value for {setting}: {value:?} (expected one of {expected})")]
pub struct PolicyParseError {
    setting: &'static str,
    value: String,
    expected: &'static str,
}

/// What to do when bjobs reports UNKWN.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(try_from = "String")]
pub enum UnknownPolicy {
    /// Keep reporting the job as running until LSF regains contact.
    #[default]
    Wait,
    /// Kill the job and report it as failed.
    Kill,
}

impl FromStr for UnknownPolicy {
    type Err = PolicyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "wait" => Ok(UnknownPolicy::Wait),
            "kill" => Ok(UnknownPolicy::Kill),
            _ => Err(PolicyParseError {
                setting: "UNKWN_behaviour",
                value: s.to_string(),
                expected: "wait, kill",
            }),
        }
    }
}

impl TryFrom<String> for UnknownPolicy {
    type Error = PolicyParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// What to do when bjobs reports ZOMBI. The job is failed either way.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(try_from = "String")]
pub enum ZombiePolicy {
    #[default]
    Ignore,
    Kill,
}

impl FromStr for ZombiePolicy {
    type Err = PolicyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "ignore" => Ok(ZombiePolicy::Ignore),
            "kill" => Ok(ZombiePolicy::Kill),
            _ => Err(PolicyParseError {
                setting: "ZOMBI_behaviour",
                value: s.to_string(),
                expected: "ignore, kill",
            }),
        }
    }
}

impl TryFrom<String> for ZombiePolicy {
    type Error = PolicyParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}
