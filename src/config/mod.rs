// src/config/mod.rs

//! Jobs file loading and validation.
//!
//! - `model.rs`: the TOML-backed data model.
//! - `loader.rs`: reading a jobs file from disk.
//! - `validate.rs`: dependency and acyclicity checks.

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{default_config_path, load_and_validate, load_from_path};
pub use model::{DefaultSection, ExecutorSection, JobConfig, JobsFile, RawJobsFile};
