// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::model::{JobsFile, RawJobsFile};
use crate::errors::Result;

/// Read and deserialize a jobs file without semantic validation.
///
/// Use [`load_and_validate`] to also check dependencies and acyclicity.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawJobsFile> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;

    let raw: RawJobsFile = toml::from_str(&contents)?;
    debug!(path = %path.display(), jobs = raw.job.len(), "jobs file parsed");

    Ok(raw)
}

/// Load a jobs file and validate it.
///
/// Checks, in order: at least one job, sane `[executor]` and `[default]`
/// values, per-job fields and `after` references, acyclicity.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<JobsFile> {
    let raw = load_from_path(&path)?;
    JobsFile::try_from(raw)
}

/// `Dagrun.toml` in the current working directory.
pub fn default_config_path() -> PathBuf {
    PathBuf::from("Dagrun.toml")
}
