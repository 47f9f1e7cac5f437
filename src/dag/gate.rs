// src/dag/gate.rs

//! Countdown gate guarding a job until all prerequisites have finished.
//!
//! The gate is an atomic counter of unsatisfied prerequisites plus a
//! [`Notify`] used to wake waiters when the counter reaches zero. Waiting is
//! async: a unit blocked on its gate is parked without occupying a worker
//! slot.

use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::Notify;
use tracing::warn;

#[derive(Debug, Default)]
pub struct Gate {
    pending: AtomicUsize,
    opened: Notify,
}

impl Gate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register one more prerequisite. Only valid while the graph is being
    /// constructed.
    pub(crate) fn arm(&self) {
        self.pending.fetch_add(1, Ordering::AcqRel);
    }

    /// Number of prerequisites that have not completed yet.
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::Acquire)
    }

    pub fn is_open(&self) -> bool {
        self.pending() == 0
    }

    /// Record the completion of one prerequisite.
    ///
    /// Returns `true` if this call opened the gate. The counter never goes
    /// below zero; an extra release is logged and ignored.
    pub fn release_one(&self) -> bool {
        let previous = self
            .pending
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1));

        match previous {
            Ok(1) => {
                self.opened.notify_waiters();
                true
            }
            Ok(_) => false,
            Err(_) => {
                warn!("gate released more times than it has prerequisites; ignoring");
                false
            }
        }
    }

    /// Wait until every prerequisite has completed.
    ///
    /// Returns immediately for a gate with no prerequisites.
    pub async fn wait_open(&self) {
        loop {
            let notified = self.opened.notified();
            tokio::pin!(notified);
            // Register before re-checking the counter so a release racing
            // with this check cannot be missed.
            notified.as_mut().enable();

            if self.is_open() {
                return;
            }

            notified.await;
        }
    }
}
