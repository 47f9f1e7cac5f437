// src/config/model.rs

use std::collections::BTreeMap;
use std::time::Duration;

use serde::Deserialize;

use crate::engine::{DEFAULT_SHUTDOWN_TIMEOUT, DEFAULT_WORKER_COUNT, ExecutorConfig};
use crate::types::FailurePolicy;

/// Jobs file as read from TOML, before semantic validation.
///
/// ```toml
/// [executor]
/// workers = 4
/// shutdown_timeout_secs = 60
/// failure_policy = "proceed"
///
/// [default]
/// min_duration_ms = 4000
/// max_duration_ms = 8000
///
/// [job."Job A"]
///
/// [job."Job C"]
/// after = ["Job A"]
/// duration_ms = 500
/// ```
///
/// All sections are optional and have defaults. Use
/// `JobsFile::try_from(raw)` to validate.
#[derive(Debug, Clone, Deserialize)]
pub struct RawJobsFile {
    #[serde(default)]
    pub executor: ExecutorSection,

    #[serde(default)]
    pub default: DefaultSection,

    /// All jobs from `[job.<id>]`, keyed by job id.
    #[serde(default)]
    pub job: BTreeMap<String, JobConfig>,
}

/// `[executor]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ExecutorSection {
    #[serde(default = "default_workers")]
    pub workers: usize,

    #[serde(default = "default_shutdown_timeout_secs")]
    pub shutdown_timeout_secs: u64,

    #[serde(default)]
    pub failure_policy: FailurePolicy,
}

fn default_workers() -> usize {
    DEFAULT_WORKER_COUNT
}

fn default_shutdown_timeout_secs() -> u64 {
    DEFAULT_SHUTDOWN_TIMEOUT.as_secs()
}

impl Default for ExecutorSection {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            shutdown_timeout_secs: default_shutdown_timeout_secs(),
            failure_policy: FailurePolicy::default(),
        }
    }
}

impl ExecutorSection {
    pub fn to_executor_config(&self) -> ExecutorConfig {
        ExecutorConfig {
            worker_count: self.workers,
            shutdown_timeout: Duration::from_secs(self.shutdown_timeout_secs),
            failure_policy: self.failure_policy,
        }
    }
}

/// `[default]` section: simulated work for jobs without `cmd` or
/// `duration_ms`.
#[derive(Debug, Clone, Deserialize)]
pub struct DefaultSection {
    #[serde(default = "default_min_duration_ms")]
    pub min_duration_ms: u64,

    #[serde(default = "default_max_duration_ms")]
    pub max_duration_ms: u64,

    /// Seed for the random durations. Unset means seeded from entropy.
    #[serde(default)]
    pub seed: Option<u64>,
}

fn default_min_duration_ms() -> u64 {
    4000
}

fn default_max_duration_ms() -> u64 {
    8000
}

impl Default for DefaultSection {
    fn default() -> Self {
        Self {
            min_duration_ms: default_min_duration_ms(),
            max_duration_ms: default_max_duration_ms(),
            seed: None,
        }
    }
}

/// `[job.<id>]` section.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct JobConfig {
    /// Ids of jobs that must finish before this one starts.
    #[serde(default)]
    pub after: Vec<String>,

    /// Shell command to run as the job body.
    #[serde(default)]
    pub cmd: Option<String>,

    /// Fixed simulated duration, instead of the `[default]` random range.
    #[serde(default)]
    pub duration_ms: Option<u64>,
}

/// A jobs file that passed validation.
///
/// Only obtainable through `TryFrom<RawJobsFile>` (see `config::validate`),
/// so every `after` reference is known and the graph is acyclic.
#[derive(Debug, Clone)]
pub struct JobsFile {
    pub executor: ExecutorSection,
    pub default: DefaultSection,
    pub job: BTreeMap<String, JobConfig>,
}

impl JobsFile {
    pub(crate) fn new_unchecked(
        executor: ExecutorSection,
        default: DefaultSection,
        job: BTreeMap<String, JobConfig>,
    ) -> Self {
        Self {
            executor,
            default,
            job,
        }
    }

    /// Jobs without prerequisites, in id order.
    pub fn entry_ids(&self) -> Vec<&str> {
        self.job
            .iter()
            .filter(|(_, j)| j.after.is_empty())
            .map(|(id, _)| id.as_str())
            .collect()
    }
}
