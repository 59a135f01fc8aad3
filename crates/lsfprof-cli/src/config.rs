//! Profile settings shared by the LSF wrappers.

use camino::{Utf8Path, Utf8PathBuf};
use lsfprof_lsf::{
    ClusterConfig, RetryBudget, StatusPolicy, SubmitDefaults, Unit, UnknownPolicy, ZombiePolicy,
};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::fs;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {error}")]
    Io {
        path: Utf8PathBuf,
        error: std::io::Error,
    },
    #[error("Invalid config {path}: {error}")]
    Json {
        path: Utf8PathBuf,
        error: serde_json::Error,
    },
    #[error("wait_between_tries must be a non-negative number of seconds, got {0}")]
    InvalidWait(f64),
}

/// Profile configuration, stored as JSON.
///
/// Keys written by the profile template (`UNKWN_behaviour`, `ZOMBI_behaviour`,
/// `LSF_UNIT_FOR_LIMITS`) are accepted as aliases, and unrelated keys are
/// ignored.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ProfileConfig {
    /// Number of bjobs queries before falling back to the log
    pub max_status_checks: u32,

    /// Seconds to sleep between bjobs queries
    pub wait_between_tries: f64,

    #[serde(alias = "UNKWN_behaviour")]
    pub unknown_behaviour: UnknownPolicy,

    #[serde(alias = "ZOMBI_behaviour")]
    pub zombie_behaviour: ZombiePolicy,

    /// Memory in MB for jobs that request none
    pub default_mem_mb: f64,

    pub default_threads: u32,

    /// Root of the per-rule job log directories
    pub default_cluster_logdir: Utf8PathBuf,

    /// Queue for jobs that name none; empty leaves it to LSF
    pub default_queue: String,

    /// Project for every job; empty submits without `-P`
    pub default_project: String,

    /// Unit the cluster reads memory limits in
    #[serde(alias = "LSF_UNIT_FOR_LIMITS")]
    pub lsf_unit_for_limits: Unit,

    /// Per-rule bsub parameters (JSON)
    pub cluster_config: Option<Utf8PathBuf>,
}

impl Default for ProfileConfig {
    fn default() -> Self {
        let submit = SubmitDefaults::default();
        Self {
            max_status_checks: 1,
            wait_between_tries: 0.001,
            unknown_behaviour: UnknownPolicy::default(),
            zombie_behaviour: ZombiePolicy::default(),
            default_mem_mb: submit.mem_mb,
            default_threads: submit.threads,
            default_cluster_logdir: submit.logdir,
            default_queue: submit.queue,
            default_project: submit.project,
            lsf_unit_for_limits: submit.memory_unit,
            cluster_config: None,
        }
    }
}

impl ProfileConfig {
    /// Load a config file. A missing file is an error.
    pub fn load(path: &Utf8Path) -> Result<Self, ConfigError> {
        read_json(path)
    }

    /// Load `path` if given, otherwise use the defaults.
    pub fn load_or_default(path: Option<&Utf8Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    pub fn retry_budget(&self) -> Result<RetryBudget, ConfigError> {
        Ok(RetryBudget {
            max_attempts: self.max_status_checks,
            delay: seconds(self.wait_between_tries)?,
        })
    }

    pub fn status_policy(&self) -> StatusPolicy {
        StatusPolicy {
            unknown: self.unknown_behaviour,
            zombie: self.zombie_behaviour,
        }
    }

    pub fn submit_defaults(&self) -> SubmitDefaults {
        SubmitDefaults {
            mem_mb: self.default_mem_mb,
            threads: self.default_threads,
            logdir: self.default_cluster_logdir.clone(),
            queue: self.default_queue.clone(),
            project: self.default_project.clone(),
            memory_unit: self.lsf_unit_for_limits,
        }
    }

    /// The configured cluster config, or an empty one.
    pub fn load_cluster_config(&self) -> Result<ClusterConfig, ConfigError> {
        match &self.cluster_config {
            Some(path) => read_json(path),
            None => Ok(ClusterConfig::default()),
        }
    }
}

fn read_json<T: DeserializeOwned>(path: &Utf8Path) -> Result<T, ConfigError> {
    let content = fs::read_to_string(path).map_err(|error| ConfigError::Io {
        path: path.to_owned(),
        error,
    })?;
    serde_json::from_str(&content).map_err(|error| ConfigError::Json {
        path: path.to_owned(),
        error,
    })
}

fn seconds(secs: f64) -> Result<Duration, ConfigError> {
    Duration::try_from_secs_f64(secs).map_err(|_| ConfigError::InvalidWait(secs))
}
