// src/engine/unit.rs

//! One unit of work per job node.
//!
//! A unit:
//! 1. waits (parked, no worker slot held) until the node's gate opens;
//! 2. takes a worker slot from the pool semaphore;
//! 3. runs the action;
//! 4. releases the slot and fans out completion to the dependents.
//!
//! Cancellation is observed at every await point before the action. A unit
//! whose action was interrupted does not notify its dependents; they are
//! released by the same cancellation instead.

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::Semaphore;
use tokio::task::JoinError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::dag::node::panic_message;
use crate::dag::{JobId, JobNode};
use crate::engine::report::{JobOutcome, JobRecord};
use crate::exec::action::{ActionError, JobContext};
use crate::exec::events::{EventSink, LifecycleEvent, LifecycleKind};
use crate::types::FailurePolicy;

/// State shared by all units of one run.
#[derive(Debug)]
pub(crate) struct RunContext {
    pub workers: Arc<Semaphore>,
    pub sink: Arc<dyn EventSink>,
    pub cancel: CancellationToken,
    pub policy: FailurePolicy,
}

pub(crate) async fn run_unit(node: Arc<JobNode>, cx: Arc<RunContext>) -> (JobId, JobRecord) {
    let id = node.id().to_string();
    let record = drive(&node, &cx).await;
    (id, record)
}

async fn drive(node: &Arc<JobNode>, cx: &RunContext) -> JobRecord {
    tokio::select! {
        biased;
        _ = cx.cancel.cancelled() => {
            debug!(job = %node.id(), pending = node.pending(), "cancelled while waiting on prerequisites");
            return cancelled_before_start(node);
        }
        _ = node.gate().wait_open() => {}
    }

    if cx.policy == FailurePolicy::Block {
        if let Some(origin) = node.upstream_failure() {
            return skip(node, cx, origin);
        }
    }

    let permit = tokio::select! {
        biased;
        _ = cx.cancel.cancelled() => return cancelled_before_start(node),
        permit = Arc::clone(&cx.workers).acquire_owned() => match permit {
            Ok(permit) => permit,
            Err(_) => return cancelled_before_start(node),
        },
    };

    debug!(job = %node.id(), "prerequisites done; worker slot acquired");

    let started_at = Instant::now();
    cx.sink.emit(LifecycleEvent::new(node.id(), LifecycleKind::Started));

    let ctx = JobContext::new(node.id(), cx.cancel.child_token());
    let result = node.run(ctx).await;
    let finished_at = Instant::now();
    drop(permit);

    let outcome = match result {
        Ok(()) => {
            cx.sink.emit(LifecycleEvent::new(node.id(), LifecycleKind::Completed));
            JobOutcome::Succeeded
        }
        // An action may only skip fan-out when the run asked it to stop;
        // a self-reported cancellation is a failure like any other.
        Err(ActionError::Cancelled) if cx.cancel.is_cancelled() => {
            cx.sink.emit(LifecycleEvent::new(node.id(), LifecycleKind::Interrupted));
            return JobRecord {
                outcome: JobOutcome::Cancelled,
                started_at: Some(started_at),
                finished_at: Some(finished_at),
            };
        }
        Err(err) => {
            let error = err.to_string();
            warn!(job = %node.id(), error = %error, "job action failed");
            cx.sink.emit(
                LifecycleEvent::new(node.id(), LifecycleKind::Failed).with_detail(error.clone()),
            );
            if cx.policy == FailurePolicy::Block {
                poison_dependents(node, node.id());
            }
            JobOutcome::Failed { error }
        }
    };

    fan_out(node);

    JobRecord {
        outcome,
        started_at: Some(started_at),
        finished_at: Some(finished_at),
    }
}

/// Record for a unit whose task panicked or was aborted outside its action.
///
/// The node still fans out (and, under `Block`, poisons its dependents) so
/// the rest of the run is not left waiting on it.
pub(crate) fn unit_crashed(node: &JobNode, policy: FailurePolicy, err: JoinError) -> JobRecord {
    node.mark_finished();
    if err.is_cancelled() {
        return JobRecord::not_started(JobOutcome::Cancelled);
    }

    let error = format!("job unit panicked: {}", panic_message(err));
    if policy == FailurePolicy::Block {
        poison_dependents(node, node.id());
    }
    fan_out(node);
    JobRecord::not_started(JobOutcome::Failed { error })
}

fn cancelled_before_start(node: &JobNode) -> JobRecord {
    node.mark_finished();
    JobRecord::not_started(JobOutcome::Cancelled)
}

/// Record a node whose ancestor failed under the blocking policy, and pass
/// the failure on so the whole subtree is skipped.
fn skip(node: &JobNode, cx: &RunContext, failed_prerequisite: JobId) -> JobRecord {
    debug!(job = %node.id(), origin = %failed_prerequisite, "skipping job after upstream failure");
    cx.sink.emit(
        LifecycleEvent::new(node.id(), LifecycleKind::Skipped)
            .with_detail(failed_prerequisite.clone()),
    );

    node.mark_finished();
    poison_dependents(node, &failed_prerequisite);
    fan_out(node);

    JobRecord::not_started(JobOutcome::Skipped {
        failed_prerequisite,
    })
}

fn poison_dependents(node: &JobNode, origin: &str) {
    for dependent in node.dependents() {
        dependent.mark_upstream_failed(origin);
    }
}

fn fan_out(node: &JobNode) {
    let released = node.notify_dependents_on_completion();
    if !released.is_empty() {
        let ids: Vec<&str> = released.iter().map(|n| n.id()).collect();
        debug!(job = %node.id(), released = ?ids, "fan-out released dependents");
    }
}
