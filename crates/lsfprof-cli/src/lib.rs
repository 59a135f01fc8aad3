//! CLI argument parsing for the LSF profile wrappers.

pub mod config;
pub mod logging;

use camino::{Utf8Path, Utf8PathBuf};
use clap::Parser;
use lsfprof_lsf::{
    ClusterConfig, JobId, RetryBudget, StatusPolicy, SubmitDefaults, UnknownPolicy, ZombiePolicy,
};

pub use config::{ConfigError, ProfileConfig};
pub use logging::init_logging;

#[derive(Parser, Debug)]
#[command(name = "lsf-status")]
#[command(about = "Print the status of an LSF job: success, running or failed")]
pub struct StatusArgs {
    /// LSF job ID
    pub jobid: JobId,

    /// Output log LSF writes for the job
    pub outlog: Utf8PathBuf,

    /// Profile configuration file (JSON)
    #[arg(long)]
    pub config: Option<Utf8PathBuf>,

    /// Number of bjobs queries before checking the log
    #[arg(long)]
    pub max_status_checks: Option<u32>,

    /// Seconds to wait between bjobs queries
    #[arg(long)]
    pub wait_between_tries: Option<f64>,

    /// What to do with UNKWN jobs (wait or kill)
    #[arg(long)]
    pub unknown_behaviour: Option<UnknownPolicy>,

    /// What to do with ZOMBI jobs (ignore or kill)
    #[arg(long)]
    pub zombie_behaviour: Option<ZombiePolicy>,

    /// Log filter used when RUST_LOG is unset
    #[arg(long, default_value = "warn")]
    pub log_level: String,
}

impl StatusArgs {
    /// Apply command-line overrides on top of the profile config.
    pub fn apply(&self, mut config: ProfileConfig) -> ProfileConfig {
        if let Some(n) = self.max_status_checks {
            config.max_status_checks = n;
        }
        if let Some(wait) = self.wait_between_tries {
            config.wait_between_tries = wait;
        }
        if let Some(policy) = self.unknown_behaviour {
            config.unknown_behaviour = policy;
        }
        if let Some(policy) = self.zombie_behaviour {
            config.zombie_behaviour = policy;
        }
        config
    }

    /// Load the config and resolve the retry budget and policies.
    pub fn settings(&self) -> Result<(RetryBudget, StatusPolicy), ConfigError> {
        let config = self.apply(ProfileConfig::load_or_default(self.config.as_deref())?);
        Ok((config.retry_budget()?, config.status_policy()))
    }
}

#[derive(Parser, Debug)]
#[command(name = "lsf-submit")]
#[command(about = "Submit a workflow jobscript with bsub and print its job ID and output log")]
pub struct SubmitArgs {
    /// Profile configuration file (JSON)
    #[arg(long)]
    pub config: Option<Utf8PathBuf>,

    /// Per-rule bsub parameters (JSON), overriding the profile's
    #[arg(long)]
    pub cluster_config: Option<Utf8PathBuf>,

    /// Log filter used when RUST_LOG is unset
    #[arg(long, default_value = "warn")]
    pub log_level: String,

    /// Extra bsub arguments followed by the jobscript
    #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
    pub args: Vec<String>,
}

impl SubmitArgs {
    /// The jobscript is always the last argument.
    pub fn jobscript(&self) -> &Utf8Path {
        Utf8Path::new(self.args.last().map(String::as_str).unwrap_or_default())
    }

    /// Arguments passed through to bsub unchanged.
    pub fn cluster_args(&self) -> &[String] {
        self.args.split_last().map(|(_, rest)| rest).unwrap_or_default()
    }

    /// Load the config and resolve the submit defaults and cluster config.
    pub fn settings(&self) -> Result<(SubmitDefaults, ClusterConfig), ConfigError> {
        let mut config = ProfileConfig::load_or_default(self.config.as_deref())?;
        if let Some(path) = &self.cluster_config {
            config.cluster_config = Some(path.clone());
        }
        Ok((config.submit_defaults(), config.load_cluster_config()?))
    }
}

#[derive(Parser, Debug)]
#[command(name = "lsf-cancel")]
#[command(about = "Cancel LSF jobs given the submit step's job strings")]
pub struct CancelArgs {
    /// Job IDs, possibly mixed with log paths
    pub jobs: Vec<String>,

    /// Log filter used when RUST_LOG is unset
    #[arg(long, default_value = "warn")]
    pub log_level: String,
}
