// src/dag/mod.rs

//! Job graph representation.
//!
//! - [`node`] is the data model: a job, its edges and its gate.
//! - [`gate`] is the prerequisite countdown a job waits on.
//! - [`builder`] discovers the nodes reachable from the entry jobs and
//!   rejects graphs that cannot be scheduled.
//! - [`graph`] assembles nodes from a validated jobs file.

pub mod builder;
pub mod gate;
pub mod graph;
pub mod node;

pub use builder::{ExecutionPlan, GraphBuilder};
pub use gate::Gate;
pub use graph::JobGraph;
pub use node::{JobId, JobNode, JobState};
