//! Submit jobs to LSF via bsub.
//!
//! The workflow engine calls the submit wrapper with optional cluster
//! arguments followed by a jobscript. The jobscript carries the job's
//! properties (rule, wildcards, threads, resources) as a JSON comment line,
//! from which the bsub resource request, log paths and job name are built.

use crate::memory::{Memory, Unit};
use crate::types::JobId;
use camino::{Utf8Path, Utf8PathBuf};
use indexmap::IndexMap;
use lsfprof_shell::{CommandError, CommandLine, Shell};
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::fs;
use std::io;
use std::sync::LazyLock;
use thiserror::Error;

// Allow expect here as the regex is compile-time verified to be valid
#[allow(clippy::expect_used)]
static SUBMITTED_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Job <(\d+)> is submitted").expect("constant regex pattern is valid")
});

/// Prefix of the jobscript line holding the job properties.
pub const PROPERTIES_PREFIX: &str = "# properties = ";

/// Resource keys, in lookup order, that set the run limit (`bsub -W`).
pub const TIME_RESOURCES: [&str; 4] = ["time", "runtime", "walltime", "time_min"];

#[derive(Error, Debug)]
pub enum SubmitError {
    #[error("Failed to read jobscript {path}: {error}")]
    Jobscript { path: Utf8PathBuf, error: io::Error },
    #[error("No job properties found in {0}")]
    MissingProperties(Utf8PathBuf),
    #[error("Invalid job properties in {path}: {error}")]
    Properties {
        path: Utf8PathBuf,
        error: serde_json::Error,
    },
    #[error("Failed to prepare log {path}: {error}")]
    Logs { path: Utf8PathBuf, error: io::Error },
    #[error("bsub failed: {0}")]
    Bsub(#[from] CommandError),
    #[error("No job id found in bsub output: {0:?}")]
    JobIdNotFound(String),
}

/// Cluster section of the job properties.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ClusterProperties {
    pub mem_mb: Option<f64>,
    pub queue: Option<String>,
    pub logdir: Option<Utf8PathBuf>,
    pub jobname: Option<String>,
}

/// Job properties as written into the jobscript by the workflow engine.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct JobProperties {
    #[serde(rename = "type")]
    pub job_type: String,
    pub rule: Option<String>,
    pub groupid: Option<String>,
    /// A number for single jobs, a UUID string for group jobs.
    pub jobid: Value,
    pub threads: Option<u32>,
    pub resources: IndexMap<String, Value>,
    pub wildcards: IndexMap<String, Value>,
    pub cluster: ClusterProperties,
}

impl JobProperties {
    /// Read the properties line from a jobscript.
    pub fn from_jobscript(path: &Utf8Path) -> Result<Self, SubmitError> {
        let content = fs::read_to_string(path).map_err(|error| SubmitError::Jobscript {
            path: path.to_owned(),
            error,
        })?;
        let json = content
            .lines()
            .find_map(|line| line.strip_prefix(PROPERTIES_PREFIX))
            .ok_or_else(|| SubmitError::MissingProperties(path.to_owned()))?;
        serde_json::from_str(json).map_err(|error| SubmitError::Properties {
            path: path.to_owned(),
            error,
        })
    }

    pub fn is_group(&self) -> bool {
        self.job_type == "group"
    }
}

/// Extra bsub parameters: `__default__` applies to every job, other keys to
/// the rule (or group) of that name.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(transparent)]
pub struct ClusterConfig(HashMap<String, ClusterParams>);

/// One parameter string or a list of them.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ClusterParams {
    One(String),
    Many(Vec<String>),
}

impl ClusterParams {
    pub fn joined(&self) -> String {
        match self {
            ClusterParams::One(params) => params.clone(),
            ClusterParams::Many(params) => params.join(" "),
        }
    }
}

impl ClusterConfig {
    pub const DEFAULT_KEY: &'static str = "__default__";

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn params(&self, key: &str) -> String {
        self.0.get(key).map(ClusterParams::joined).unwrap_or_default()
    }

    pub fn default_params(&self) -> String {
        self.params(Self::DEFAULT_KEY)
    }

    /// Default parameters followed by the rule's own.
    pub fn params_for_rule(&self, rule: &str) -> String {
        join_nonempty([self.default_params(), self.params(rule)])
    }
}

/// Site-wide values used when a job does not set them.
#[derive(Debug, Clone, PartialEq)]
pub struct SubmitDefaults {
    pub mem_mb: f64,
    pub threads: u32,
    pub logdir: Utf8PathBuf,
    pub queue: String,
    pub project: String,
    /// The cluster's `LSF_UNIT_FOR_LIMITS`
    pub memory_unit: Unit,
}

impl Default for SubmitDefaults {
    fn default() -> Self {
        Self {
            mem_mb: 1024.0,
            threads: 1,
            logdir: Utf8PathBuf::from("logs/cluster"),
            queue: String::new(),
            project: String::new(),
            memory_unit: Unit::Kilo,
        }
    }
}

/// A job ready to be submitted with bsub.
#[derive(Debug, Clone)]
pub struct BsubJob {
    jobscript: Utf8PathBuf,
    cluster_args: Vec<String>,
    properties: JobProperties,
    defaults: SubmitDefaults,
    rule_params: String,
    log_token: String,
}

impl BsubJob {
    /// `log_token` makes the log names unique across runs that reuse job
    /// numbers.
    pub fn new(
        jobscript: impl Into<Utf8PathBuf>,
        cluster_args: Vec<String>,
        properties: JobProperties,
        defaults: SubmitDefaults,
        log_token: impl Into<String>,
    ) -> Self {
        Self {
            jobscript: jobscript.into(),
            cluster_args,
            properties,
            defaults,
            rule_params: String::new(),
            log_token: log_token.into(),
        }
    }

    /// Add the cluster config's parameters for this job's rule.
    pub fn with_cluster_config(mut self, config: &ClusterConfig) -> Self {
        self.rule_params = config.params_for_rule(&self.rule_name());
        self
    }

    pub fn jobscript(&self) -> &Utf8Path {
        &self.jobscript
    }

    pub fn cluster_cmd(&self) -> String {
        self.cluster_args.join(" ")
    }

    pub fn threads(&self) -> u32 {
        self.properties.threads.unwrap_or(self.defaults.threads)
    }

    /// Requested memory: resources, then cluster properties, then the default.
    pub fn mem_mb(&self) -> Memory {
        let mb = self
            .properties
            .resources
            .get("mem_mb")
            .and_then(Value::as_f64)
            .or(self.properties.cluster.mem_mb)
            .unwrap_or(self.defaults.mem_mb);
        Memory::new(mb, Unit::Mega)
    }

    /// Memory limit in the cluster's unit, rounded up.
    pub fn mem_limit(&self) -> u64 {
        self.mem_mb()
            .to(self.defaults.memory_unit, true)
            .value()
            .ceil() as u64
    }

    pub fn rule_name(&self) -> String {
        let name = if self.properties.is_group() {
            self.properties.groupid.as_deref()
        } else {
            self.properties.rule.as_deref()
        };
        name.filter(|n| !n.is_empty())
            .unwrap_or("rule_name")
            .to_string()
    }

    /// Job number for single jobs, first UUID segment for group jobs.
    pub fn jobid(&self) -> String {
        let jobid = value_text(&self.properties.jobid);
        if self.properties.is_group() {
            jobid.split('-').next().unwrap_or_default().to_string()
        } else {
            jobid
        }
    }

    pub fn wildcards_str(&self) -> String {
        let joined = self
            .properties
            .wildcards
            .iter()
            .map(|(k, v)| format!("{}={}", k, value_text(v)))
            .collect::<Vec<_>>()
            .join(".");
        if joined.is_empty() {
            "unique".to_string()
        } else {
            joined
        }
    }

    pub fn jobname(&self) -> String {
        if self.properties.is_group() {
            return format!("{}_{}", self.rule_name(), self.jobid());
        }
        self.properties
            .cluster
            .jobname
            .clone()
            .unwrap_or_else(|| format!("{}.{}", self.rule_name(), self.wildcards_str()))
    }

    pub fn logdir(&self) -> Utf8PathBuf {
        self.properties
            .cluster
            .logdir
            .as_deref()
            .unwrap_or(self.defaults.logdir.as_path())
            .join(self.rule_name())
            .join(self.wildcards_str())
    }

    pub fn outlog(&self) -> Utf8PathBuf {
        self.log_path("out")
    }

    pub fn errlog(&self) -> Utf8PathBuf {
        self.log_path("err")
    }

    fn log_path(&self, extension: &str) -> Utf8PathBuf {
        self.logdir()
            .join(format!("jobid{}_{}.{}", self.jobid(), self.log_token, extension))
    }

    /// `-M`, `-n`, `-R` and, with a time resource, `-W`.
    pub fn resources_cmd(&self) -> String {
        let mem = self.mem_limit();
        let mut cmd = format!(
            "-M {mem} -n {} -R 'select[mem>{mem}] rusage[mem={mem}] span[hosts=1]'",
            self.threads()
        );
        let time = TIME_RESOURCES
            .iter()
            .find_map(|key| self.properties.resources.get(*key));
        if let Some(time) = time {
            cmd.push_str(&format!(" -W {}", value_text(time)));
        }
        cmd
    }

    pub fn jobinfo_cmd(&self) -> String {
        format!(
            "-o \"{}\" -e \"{}\" -J \"{}\"",
            self.outlog(),
            self.errlog(),
            self.jobname()
        )
    }

    /// Empty when there is no queue, or the cluster config picks one.
    pub fn queue_cmd(&self) -> String {
        let queue = self
            .properties
            .cluster
            .queue
            .as_deref()
            .unwrap_or(self.defaults.queue.as_str());
        if queue.is_empty() || self.rule_params_set("-q") {
            String::new()
        } else {
            format!("-q {}", queue)
        }
    }

    /// Empty when there is no project, or the cluster config picks one.
    pub fn project_cmd(&self) -> String {
        if self.defaults.project.is_empty() || self.rule_params_set("-P") {
            String::new()
        } else {
            format!("-P {}", self.defaults.project)
        }
    }

    fn rule_params_set(&self, flag: &str) -> bool {
        self.rule_params.split_whitespace().any(|token| token == flag)
    }

    pub fn submit_cmd(&self) -> String {
        join_nonempty([
            "bsub".to_string(),
            self.resources_cmd(),
            self.jobinfo_cmd(),
            self.queue_cmd(),
            self.project_cmd(),
            self.cluster_cmd(),
            self.rule_params.clone(),
            self.jobscript.to_string(),
        ])
    }

    /// The submit command runs through `sh -c`: cluster arguments and config
    /// parameters carry their own shell quoting.
    pub fn command_line(&self) -> CommandLine {
        CommandLine::new("sh").arg("-c").arg(self.submit_cmd())
    }
}

/// Job id from bsub's `Job <123> is submitted to queue <normal>.`
pub fn parse_submitted_jobid(stdout: &str) -> Result<JobId, SubmitError> {
    SUBMITTED_PATTERN
        .captures(stdout)
        .and_then(|caps| caps[1].parse::<JobId>().ok())
        .ok_or_else(|| SubmitError::JobIdNotFound(stdout.to_string()))
}

/// Create the log directory, clear logs left by an earlier attempt, and run
/// bsub.
pub async fn submit_job<S: Shell>(shell: &S, job: &BsubJob) -> Result<JobId, SubmitError> {
    let logdir = job.logdir();
    fs::create_dir_all(&logdir).map_err(|error| SubmitError::Logs {
        path: logdir.clone(),
        error,
    })?;
    for log in [job.outlog(), job.errlog()] {
        remove_if_exists(&log)?;
    }

    tracing::debug!("Submitting {}", job.submit_cmd());
    let output = shell.run(&job.command_line()).await?;
    parse_submitted_jobid(&output.stdout)
}

fn remove_if_exists(path: &Utf8Path) -> Result<(), SubmitError> {
    match fs::remove_file(path) {
        Err(error) if error.kind() != io::ErrorKind::NotFound => Err(SubmitError::Logs {
            path: path.to_owned(),
            error,
        }),
        _ => Ok(()),
    }
}

fn value_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn join_nonempty<I: IntoIterator<Item = String>>(parts: I) -> String {
    parts
        .into_iter()
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}
