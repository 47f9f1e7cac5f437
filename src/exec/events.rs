// src/exec/events.rs

//! Job lifecycle events and where they go.
//!
//! The executor reports every start and completion to an [`EventSink`]. The
//! sink is injected, so the CLI can print to stdout, library users can route
//! to `tracing`, and tests can capture the exact event order.

use std::fmt;
use std::time::Instant;

use tracing::{info, warn};

use crate::dag::JobId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleKind {
    Started,
    Completed,
    Failed,
    /// The action stopped early because the run was cancelled.
    Interrupted,
    /// The action was not run because a prerequisite failed.
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LifecycleEvent {
    pub job: JobId,
    pub kind: LifecycleKind,
    pub at: Instant,
    /// Error text for `Failed`, failing prerequisite for `Skipped`.
    pub detail: Option<String>,
}

impl LifecycleEvent {
    pub fn new(job: impl Into<JobId>, kind: LifecycleKind) -> Self {
        Self {
            job: job.into(),
            kind,
            at: Instant::now(),
            detail: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

impl fmt::Display for LifecycleEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.kind, &self.detail) {
            (LifecycleKind::Started, _) => write!(f, "{} started", self.job),
            (LifecycleKind::Completed, _) => write!(f, "{} completed", self.job),
            (LifecycleKind::Failed, Some(err)) => write!(f, "{} failed: {}", self.job, err),
            (LifecycleKind::Failed, None) => write!(f, "{} failed", self.job),
            (LifecycleKind::Interrupted, _) => write!(f, "{} was interrupted", self.job),
            (LifecycleKind::Skipped, _) => write!(f, "{} skipped", self.job),
        }
    }
}

/// Receiver of lifecycle events. Called from many units concurrently.
pub trait EventSink: Send + Sync + fmt::Debug {
    fn emit(&self, event: LifecycleEvent);
}

/// Forwards events to `tracing`. Default sink of the executor.
#[derive(Debug, Clone, Default)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: LifecycleEvent) {
        match event.kind {
            LifecycleKind::Failed | LifecycleKind::Interrupted | LifecycleKind::Skipped => {
                warn!(job = %event.job, kind = ?event.kind, "{}", event)
            }
            LifecycleKind::Started | LifecycleKind::Completed => {
                info!(job = %event.job, kind = ?event.kind, "{}", event)
            }
        }
    }
}

/// Prints one line per event on stdout (`"Job A started"`).
#[derive(Debug, Clone, Default)]
pub struct StdoutSink;

impl EventSink for StdoutSink {
    fn emit(&self, event: LifecycleEvent) {
        println!("{event}");
    }
}
