// src/errors.rs

//! Crate-wide error type and result alias.

use thiserror::Error;

use crate::dag::JobId;

#[derive(Error, Debug)]
pub enum DagrunError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    /// A job is its own transitive prerequisite. `path` starts and ends with
    /// the same job.
    #[error("cycle detected in job graph: {}", .path.join(" -> "))]
    Cycle { path: Vec<JobId> },

    #[error("duplicate job id '{0}' in job graph")]
    DuplicateJob(JobId),

    #[error("job '{job}' requires '{prerequisite}', which is not reachable from the entry jobs")]
    MissingPrerequisite { job: JobId, prerequisite: JobId },

    #[error("job '{0}' was already scheduled by an earlier run")]
    AlreadyScheduled(JobId),

    #[error("cannot link job '{0}': the graph is sealed once a run has scheduled it")]
    GraphSealed(JobId),

    #[error("worker pool did not terminate; still running: {}", .pending.join(", "))]
    ShutdownTimeout { pending: Vec<JobId> },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl DagrunError {
    /// `true` for errors raised before any job was dispatched because the
    /// graph itself is unusable.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            DagrunError::Cycle { .. }
                | DagrunError::DuplicateJob(_)
                | DagrunError::MissingPrerequisite { .. }
                | DagrunError::AlreadyScheduled(_)
        )
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, DagrunError>;
