// src/dag/node.rs

//! The job data model.
//!
//! A [`JobNode`] owns its action, the gate counting unsatisfied
//! prerequisites, and the bidirectional edge bookkeeping:
//!
//! - a prerequisite holds **strong** references to its dependents, so the
//!   entry jobs keep the whole reachable graph alive;
//! - a dependent holds **weak** references (plus the id) to its
//!   prerequisites, so ordinary graphs do not form reference cycles.
//!
//! Edges are only added during construction. Once a run schedules a node,
//! its structure is sealed and read-only.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use tokio::task::AbortHandle;
use tracing::{debug, warn};

use crate::dag::gate::Gate;
use crate::errors::{DagrunError, Result};
use crate::exec::action::{ActionError, JobAction, JobContext};

/// Stable, human-readable job identifier.
pub type JobId = String;

/// Lifecycle of a node within one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    /// Constructed; edges may still be added.
    Idle,
    /// Claimed by a run; structure is sealed.
    Scheduled,
    /// Action is executing.
    Running,
    /// Action has returned (successfully or not). Inert from now on.
    Finished,
}

impl JobState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => JobState::Idle,
            1 => JobState::Scheduled,
            2 => JobState::Running,
            _ => JobState::Finished,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            JobState::Idle => 0,
            JobState::Scheduled => 1,
            JobState::Running => 2,
            JobState::Finished => 3,
        }
    }
}

#[derive(Debug, Clone)]
struct PrerequisiteLink {
    id: JobId,
    node: Weak<JobNode>,
}

pub struct JobNode {
    id: JobId,
    action: Arc<dyn JobAction>,
    prerequisites: Mutex<Vec<PrerequisiteLink>>,
    dependents: Mutex<Vec<Arc<JobNode>>>,
    gate: Gate,
    state: AtomicU8,
    notified: AtomicBool,
    upstream_failure: Mutex<Option<JobId>>,
}

impl fmt::Debug for JobNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dependents: Vec<JobId> = lock(&self.dependents)
            .iter()
            .map(|d| d.id.clone())
            .collect();
        f.debug_struct("JobNode")
            .field("id", &self.id)
            .field("prerequisites", &self.prerequisite_ids())
            .field("dependents", &dependents)
            .field("pending", &self.gate.pending())
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl JobNode {
    /// Create a job that runs after every node in `prerequisites`.
    ///
    /// The new node is registered as a dependent of each prerequisite before
    /// it is returned. Registration is safe when sibling dependents of the
    /// same prerequisite are constructed on different threads.
    pub fn new(
        id: impl Into<JobId>,
        action: impl JobAction + 'static,
        prerequisites: &[&Arc<JobNode>],
    ) -> Arc<JobNode> {
        Self::with_shared_action(id, Arc::new(action), prerequisites)
    }

    /// Like [`JobNode::new`], for an action shared between several nodes.
    pub fn with_shared_action(
        id: impl Into<JobId>,
        action: Arc<dyn JobAction>,
        prerequisites: &[&Arc<JobNode>],
    ) -> Arc<JobNode> {
        let node = Arc::new(JobNode {
            id: id.into(),
            action,
            prerequisites: Mutex::new(Vec::with_capacity(prerequisites.len())),
            dependents: Mutex::new(Vec::new()),
            gate: Gate::new(),
            state: AtomicU8::new(JobState::Idle.as_u8()),
            notified: AtomicBool::new(false),
            upstream_failure: Mutex::new(None),
        });

        for prerequisite in prerequisites {
            link(prerequisite, &node);
        }

        node
    }

    /// Add `prerequisite` to this node after construction.
    ///
    /// Only allowed while both nodes are still `Idle`; this is what lets a
    /// graph be assembled from a description where jobs reference each other
    /// by name (and, unlike [`JobNode::new`], it can express a cycle, which a
    /// run then rejects).
    pub fn depend_on(self: &Arc<Self>, prerequisite: &Arc<JobNode>) -> Result<()> {
        for node in [self, prerequisite] {
            if node.state() != JobState::Idle {
                return Err(DagrunError::GraphSealed(node.id.clone()));
            }
        }
        link(prerequisite, self);
        Ok(())
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn state(&self) -> JobState {
        JobState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn gate(&self) -> &Gate {
        &self.gate
    }

    /// Unsatisfied prerequisite count.
    pub fn pending(&self) -> usize {
        self.gate.pending()
    }

    /// Whether all prerequisites have completed.
    pub fn is_runnable(&self) -> bool {
        self.gate.is_open()
    }

    /// Snapshot of the nodes that depend on this one, in registration order.
    pub fn dependents(&self) -> Vec<Arc<JobNode>> {
        lock(&self.dependents).clone()
    }

    /// Snapshot of the prerequisites that are still alive.
    pub fn prerequisites(&self) -> Vec<Arc<JobNode>> {
        lock(&self.prerequisites)
            .iter()
            .filter_map(|link| link.node.upgrade())
            .collect()
    }

    pub fn prerequisite_ids(&self) -> Vec<JobId> {
        lock(&self.prerequisites)
            .iter()
            .map(|link| link.id.clone())
            .collect()
    }

    /// Ids of prerequisites that have been dropped.
    pub(crate) fn dropped_prerequisites(&self) -> Vec<JobId> {
        lock(&self.prerequisites)
            .iter()
            .filter(|link| link.node.strong_count() == 0)
            .map(|link| link.id.clone())
            .collect()
    }

    /// Claim the node for a run, sealing its structure.
    pub(crate) fn mark_scheduled(&self) -> Result<()> {
        self.transition(JobState::Idle, JobState::Scheduled)
            .map_err(|_| DagrunError::AlreadyScheduled(self.id.clone()))
    }

    /// Undo [`JobNode::mark_scheduled`] for a run that failed to start.
    pub(crate) fn unmark_scheduled(&self) {
        let _ = self.transition(JobState::Scheduled, JobState::Idle);
    }

    /// Mark a scheduled node as finished without running its action.
    pub(crate) fn mark_finished(&self) {
        self.state.store(JobState::Finished.as_u8(), Ordering::Release);
    }

    /// Remember that `origin`, an ancestor of this node, failed. The first
    /// recorded origin wins.
    pub(crate) fn mark_upstream_failed(&self, origin: &str) {
        let mut failure = lock(&self.upstream_failure);
        if failure.is_none() {
            *failure = Some(origin.to_string());
        }
    }

    /// The failed ancestor, if a prerequisite (directly or transitively)
    /// failed during this run.
    pub fn upstream_failure(&self) -> Option<JobId> {
        lock(&self.upstream_failure).clone()
    }

    pub fn upstream_failed(&self) -> bool {
        lock(&self.upstream_failure).is_some()
    }

    /// Execute the action.
    ///
    /// The action runs at most once per node: a second call returns
    /// [`ActionError::AlreadyRan`]. A node that was never scheduled can be
    /// run directly once its gate is open; before that the call returns
    /// [`ActionError::NotReady`]. Panics inside the action are reported as
    /// [`ActionError::Panicked`].
    pub async fn run(&self, ctx: JobContext) -> std::result::Result<(), ActionError> {
        let pending = self.pending();
        if pending > 0 {
            return Err(ActionError::NotReady(self.id.clone(), pending));
        }

        let claimed = self
            .transition(JobState::Scheduled, JobState::Running)
            .or_else(|_| self.transition(JobState::Idle, JobState::Running));
        if claimed.is_err() {
            return Err(ActionError::AlreadyRan(self.id.clone()));
        }

        let handle = tokio::spawn(self.action.run(ctx));
        let guard = AbortOnDrop(handle.abort_handle());

        let result = match handle.await {
            Ok(result) => result,
            Err(err) if err.is_panic() => Err(ActionError::Panicked(panic_message(err))),
            Err(_) => Err(ActionError::Cancelled),
        };
        drop(guard);

        self.mark_finished();
        result
    }

    /// Decrement the gate of every dependent.
    ///
    /// Returns the dependents that became runnable because of this call.
    /// Fan-out happens at most once per node; later calls return nothing.
    pub fn notify_dependents_on_completion(&self) -> Vec<Arc<JobNode>> {
        if self.notified.swap(true, Ordering::AcqRel) {
            warn!(job = %self.id, "dependents already notified; ignoring repeated fan-out");
            return Vec::new();
        }

        let mut released = Vec::new();
        for dependent in self.dependents() {
            if dependent.gate.release_one() {
                debug!(job = %self.id, dependent = %dependent.id, "dependent released");
                released.push(dependent);
            }
        }
        released
    }

    fn transition(&self, from: JobState, to: JobState) -> std::result::Result<(), JobState> {
        self.state
            .compare_exchange(from.as_u8(), to.as_u8(), Ordering::AcqRel, Ordering::Acquire)
            .map(|_| ())
            .map_err(JobState::from_u8)
    }
}

/// Record `dependent` as requiring `prerequisite`, on both sides.
fn link(prerequisite: &Arc<JobNode>, dependent: &Arc<JobNode>) {
    lock(&dependent.prerequisites).push(PrerequisiteLink {
        id: prerequisite.id.clone(),
        node: Arc::downgrade(prerequisite),
    });
    dependent.gate.arm();
    lock(&prerequisite.dependents).push(Arc::clone(dependent));
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) fn panic_message(err: tokio::task::JoinError) -> String {
    let payload = err.into_panic();
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Aborts the spawned action if the unit driving it is dropped first.
struct AbortOnDrop(AbortHandle);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}
