// src/engine/executor.rs

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Semaphore;
use tokio::task::{Id, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::dag::{GraphBuilder, JobId, JobNode};
use crate::engine::report::{JobRecord, RunReport};
use crate::engine::unit::{RunContext, run_unit, unit_crashed};
use crate::errors::{DagrunError, Result};
use crate::exec::events::{EventSink, TracingSink};
use crate::types::FailurePolicy;

pub const DEFAULT_WORKER_COUNT: usize = 4;
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(60);

/// Executor settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutorConfig {
    /// Maximum number of job actions running at the same time.
    pub worker_count: usize,
    /// Bound for each of the two shutdown phases (graceful drain, then drain
    /// after cancellation).
    pub shutdown_timeout: Duration,
    pub failure_policy: FailurePolicy,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            worker_count: DEFAULT_WORKER_COUNT,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
            failure_policy: FailurePolicy::default(),
        }
    }
}

impl ExecutorConfig {
    pub fn with_workers(worker_count: usize) -> Self {
        Self {
            worker_count,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.worker_count == 0 {
            return Err(DagrunError::ConfigError(
                "worker_count must be >= 1 (got 0)".to_string(),
            ));
        }
        if self.worker_count > Semaphore::MAX_PERMITS {
            return Err(DagrunError::ConfigError(format!(
                "worker_count must be <= {} (got {})",
                Semaphore::MAX_PERMITS,
                self.worker_count
            )));
        }
        if self.shutdown_timeout.is_zero() {
            return Err(DagrunError::ConfigError(
                "shutdown_timeout must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Runs a job graph on a bounded pool of workers.
///
/// Every node reachable from the entry jobs is submitted as its own unit
/// of work. Submission order does not matter: each unit waits for its own
/// gate, so a job starts only after all of its prerequisites have finished,
/// and independent jobs run concurrently up to `worker_count`.
#[derive(Debug, Clone)]
pub struct Executor {
    config: ExecutorConfig,
    sink: Arc<dyn EventSink>,
}

impl Executor {
    pub fn new(config: ExecutorConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            sink: Arc::new(TracingSink),
        })
    }

    /// Executor with `worker_count` workers and default settings otherwise.
    pub fn with_workers(worker_count: usize) -> Result<Self> {
        Self::new(ExecutorConfig::with_workers(worker_count))
    }

    /// Route lifecycle events to `sink` instead of `tracing`.
    pub fn with_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Run every job reachable from `entries` exactly once.
    ///
    /// Structural problems (cycles, duplicate ids, reused or unreachable
    /// prerequisites) fail the call before any job is dispatched. Job
    /// failures and cancellations are reported per job in the returned
    /// [`RunReport`]. If the pool cannot be drained even after cancelling,
    /// the call fails with [`DagrunError::ShutdownTimeout`].
    pub async fn run(&self, entries: &[Arc<JobNode>]) -> Result<RunReport> {
        self.run_with_cancellation(entries, CancellationToken::new())
            .await
    }

    /// Like [`Executor::run`], stopping cooperatively when `cancel` fires.
    pub async fn run_with_cancellation(
        &self,
        entries: &[Arc<JobNode>],
        cancel: CancellationToken,
    ) -> Result<RunReport> {
        let started = Instant::now();

        if entries.is_empty() {
            debug!("no entry jobs; nothing to run");
            return Ok(RunReport::default());
        }

        let plan = GraphBuilder::new(entries).plan()?;
        claim(plan.nodes())?;

        info!(
            jobs = plan.len(),
            entries = plan.entries().len(),
            workers = self.config.worker_count,
            policy = %self.config.failure_policy,
            "starting run"
        );

        let cx = Arc::new(RunContext {
            workers: Arc::new(Semaphore::new(self.config.worker_count)),
            sink: Arc::clone(&self.sink),
            cancel: cancel.child_token(),
            policy: self.config.failure_policy,
        });

        let mut units = Units {
            set: JoinSet::new(),
            nodes: HashMap::with_capacity(plan.len()),
            policy: self.config.failure_policy,
        };
        for node in plan.nodes() {
            let handle = units
                .set
                .spawn(run_unit(Arc::clone(node), Arc::clone(&cx)));
            units.nodes.insert(handle.id(), Arc::clone(node));
        }

        let mut records = BTreeMap::new();
        self.shutdown(&mut units, &mut records, &cx.cancel, &plan.ids())
            .await?;
        cx.workers.close();

        let report = RunReport::new(records, started.elapsed());
        info!(
            elapsed = ?report.elapsed(),
            succeeded = report.succeeded().len(),
            failed = report.failed().len(),
            skipped = report.skipped().len(),
            cancelled = report.cancelled().len(),
            "run finished"
        );
        Ok(report)
    }

    /// Two-phase bounded drain of the submitted units.
    async fn shutdown(
        &self,
        units: &mut Units,
        records: &mut BTreeMap<JobId, JobRecord>,
        cancel: &CancellationToken,
        all_ids: &[JobId],
    ) -> Result<()> {
        let bound = self.config.shutdown_timeout;

        if tokio::time::timeout(bound, units.collect(records)).await.is_ok() {
            return Ok(());
        }

        warn!(
            timeout = ?bound,
            remaining = units.set.len(),
            "jobs did not finish in time; requesting cancellation"
        );
        cancel.cancel();

        if tokio::time::timeout(bound, units.collect(records)).await.is_ok() {
            return Ok(());
        }

        units.set.abort_all();
        let pending: Vec<JobId> = all_ids
            .iter()
            .filter(|id| !records.contains_key(*id))
            .cloned()
            .collect();
        error!(?pending, "worker pool did not terminate after cancellation");
        Err(DagrunError::ShutdownTimeout { pending })
    }
}

/// Claim every node for this run, or none of them.
fn claim(nodes: &[Arc<JobNode>]) -> Result<()> {
    for (claimed, node) in nodes.iter().enumerate() {
        if let Err(err) = node.mark_scheduled() {
            for earlier in &nodes[..claimed] {
                earlier.unmark_scheduled();
            }
            return Err(err);
        }
    }
    Ok(())
}

/// The spawned units of one run, with the node each task drives.
struct Units {
    set: JoinSet<(JobId, JobRecord)>,
    nodes: HashMap<Id, Arc<JobNode>>,
    policy: FailurePolicy,
}

impl Units {
    async fn collect(&mut self, records: &mut BTreeMap<JobId, JobRecord>) {
        while let Some(joined) = self.set.join_next_with_id().await {
            match joined {
                Ok((_, (id, record))) => {
                    records.insert(id, record);
                }
                Err(err) => {
                    let Some(node) = self.nodes.get(&err.id()).cloned() else {
                        error!(error = %err, "unknown job unit terminated abnormally");
                        continue;
                    };
                    error!(job = %node.id(), error = %err, "job unit terminated abnormally");
                    let record = unit_crashed(&node, self.policy, err);
                    records.insert(node.id().to_string(), record);
                }
            }
        }
    }
}
