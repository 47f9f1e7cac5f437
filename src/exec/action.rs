// src/exec/action.rs

//! The job body capability.
//!
//! The executor never knows what a job does. It hands the job's
//! [`JobAction`] a [`JobContext`] and awaits the returned future. Async
//! closures implement the trait directly; synchronous, blocking bodies can be
//! wrapped with [`blocking`].

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::dag::JobId;

/// Boxed future returned by [`JobAction::run`].
pub type ActionFuture = Pin<Box<dyn Future<Output = Result<(), ActionError>> + Send + 'static>>;

#[derive(Error, Debug)]
pub enum ActionError {
    #[error("{0}")]
    Failed(String),

    /// The action stopped early because the run was cancelled.
    #[error("cancelled")]
    Cancelled,

    #[error("action panicked: {0}")]
    Panicked(String),

    #[error("job '{0}' has already run")]
    AlreadyRan(JobId),

    /// The job still has unfinished prerequisites.
    #[error("job '{0}' is waiting on {1} prerequisite(s)")]
    NotReady(JobId, usize),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ActionError {
    pub fn failed(msg: impl Into<String>) -> Self {
        ActionError::Failed(msg.into())
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, ActionError::Cancelled)
    }
}

/// What an action gets to see about the job it is running for.
#[derive(Debug, Clone)]
pub struct JobContext {
    job: JobId,
    cancel: CancellationToken,
}

impl JobContext {
    pub fn new(job: impl Into<JobId>, cancel: CancellationToken) -> Self {
        Self {
            job: job.into(),
            cancel,
        }
    }

    /// Context for running an action outside of an executor run.
    pub fn detached(job: impl Into<JobId>) -> Self {
        Self::new(job, CancellationToken::new())
    }

    pub fn job_id(&self) -> &str {
        &self.job
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Resolves once the run asks its jobs to stop.
    pub async fn cancelled(&self) {
        self.cancel.cancelled().await
    }
}

/// Unit of work attached to a job.
///
/// Implementations may perform arbitrary side effects. Long-running actions
/// should watch [`JobContext::cancelled`] and return
/// [`ActionError::Cancelled`] when it fires; actions that ignore it are
/// aborted when the executor gives up on shutdown.
pub trait JobAction: Send + Sync {
    fn run(&self, ctx: JobContext) -> ActionFuture;
}

impl<F, Fut> JobAction for F
where
    F: Fn(JobContext) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), ActionError>> + Send + 'static,
{
    fn run(&self, ctx: JobContext) -> ActionFuture {
        Box::pin(self(ctx))
    }
}

/// An action that does nothing.
pub fn noop() -> impl JobAction {
    |_ctx: JobContext| async { Ok::<(), ActionError>(()) }
}

/// Adapt a synchronous, possibly blocking closure into a [`JobAction`].
///
/// The closure runs on tokio's blocking pool, so it does not stall the
/// executor's async workers.
pub fn blocking<F>(f: F) -> BlockingAction<F>
where
    F: Fn(&JobContext) -> Result<(), ActionError> + Send + Sync + 'static,
{
    BlockingAction { f: Arc::new(f) }
}

pub struct BlockingAction<F> {
    f: Arc<F>,
}

impl<F> JobAction for BlockingAction<F>
where
    F: Fn(&JobContext) -> Result<(), ActionError> + Send + Sync + 'static,
{
    fn run(&self, ctx: JobContext) -> ActionFuture {
        let f = Arc::clone(&self.f);
        Box::pin(async move {
            match tokio::task::spawn_blocking(move || f(&ctx)).await {
                Ok(result) => result,
                Err(err) if err.is_panic() => {
                    Err(ActionError::Panicked("blocking job body panicked".to_string()))
                }
                Err(_) => Err(ActionError::Cancelled),
            }
        })
    }
}
