// src/engine/report.rs

//! Aggregate result of one executor run.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use crate::dag::JobId;

/// How a single job ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Succeeded,
    /// The action returned an error or panicked. Dependents were still
    /// released.
    Failed { error: String },
    /// Not run because a prerequisite failed (blocking failure policy).
    Skipped { failed_prerequisite: JobId },
    /// Stopped by cancellation, before or during its action.
    Cancelled,
}

impl JobOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, JobOutcome::Succeeded)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobRecord {
    pub outcome: JobOutcome,
    /// When the action started; `None` if it never did.
    pub started_at: Option<Instant>,
    pub finished_at: Option<Instant>,
}

impl JobRecord {
    pub(crate) fn not_started(outcome: JobOutcome) -> Self {
        Self {
            outcome,
            started_at: None,
            finished_at: None,
        }
    }

    pub fn ran(&self) -> bool {
        self.started_at.is_some()
    }

    pub fn duration(&self) -> Option<Duration> {
        match (self.started_at, self.finished_at) {
            (Some(start), Some(end)) => Some(end.saturating_duration_since(start)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RunReport {
    jobs: BTreeMap<JobId, JobRecord>,
    elapsed: Duration,
}

impl RunReport {
    pub(crate) fn new(jobs: BTreeMap<JobId, JobRecord>, elapsed: Duration) -> Self {
        Self { jobs, elapsed }
    }

    /// `true` when every job succeeded. An empty run is successful.
    pub fn is_success(&self) -> bool {
        self.jobs.values().all(|r| r.outcome.is_success())
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    pub fn record(&self, job: &str) -> Option<&JobRecord> {
        self.jobs.get(job)
    }

    pub fn outcome(&self, job: &str) -> Option<&JobOutcome> {
        self.jobs.get(job).map(|r| &r.outcome)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&JobId, &JobRecord)> {
        self.jobs.iter()
    }

    pub fn succeeded(&self) -> Vec<&str> {
        self.ids_where(|o| matches!(o, JobOutcome::Succeeded))
    }

    pub fn failed(&self) -> Vec<&str> {
        self.ids_where(|o| matches!(o, JobOutcome::Failed { .. }))
    }

    pub fn skipped(&self) -> Vec<&str> {
        self.ids_where(|o| matches!(o, JobOutcome::Skipped { .. }))
    }

    pub fn cancelled(&self) -> Vec<&str> {
        self.ids_where(|o| matches!(o, JobOutcome::Cancelled))
    }

    fn ids_where(&self, pred: impl Fn(&JobOutcome) -> bool) -> Vec<&str> {
        self.jobs
            .iter()
            .filter(|(_, r)| pred(&r.outcome))
            .map(|(id, _)| id.as_str())
            .collect()
    }
}
