// src/exec/mod.rs

//! Job bodies and lifecycle reporting.
//!
//! - [`action`] defines the `JobAction` capability the executor invokes.
//! - [`simulated`] is a sleep-based placeholder body.
//! - [`command`] runs a shell command as a job body.
//! - [`events`] carries start/completion events to an injectable sink.

pub mod action;
pub mod command;
pub mod events;
pub mod simulated;

pub use action::{ActionError, ActionFuture, JobAction, JobContext, blocking, noop};
pub use command::CommandAction;
pub use events::{EventSink, LifecycleEvent, LifecycleKind, StdoutSink, TracingSink};
pub use simulated::{SharedRng, SimulatedWork, seeded_rng};
