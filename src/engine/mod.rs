// src/engine/mod.rs

//! Scheduling engine.
//!
//! - [`executor`] validates a graph and drives it on a bounded worker pool,
//!   including the two-phase shutdown.
//! - [`unit`] is the per-node unit of work (gate, worker slot, action,
//!   fan-out).
//! - [`report`] holds the aggregate per-job result of a run.

pub mod executor;
pub mod report;
mod unit;

pub use executor::{DEFAULT_SHUTDOWN_TIMEOUT, DEFAULT_WORKER_COUNT, Executor, ExecutorConfig};
pub use report::{JobOutcome, JobRecord, RunReport};
