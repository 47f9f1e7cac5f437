use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use dagrun::exec::{ActionFuture, JobAction, JobContext};

/// Records how many gauged actions run at once and how often each job ran.
#[derive(Debug, Default)]
pub struct ConcurrencyGauge {
    current: AtomicUsize,
    peak: AtomicUsize,
    runs: Mutex<HashMap<String, usize>>,
}

impl ConcurrencyGauge {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// An action that holds its slot for `hold`, reporting to this gauge.
    pub fn action(self: &Arc<Self>, hold: Duration) -> GaugedAction {
        GaugedAction {
            gauge: Arc::clone(self),
            hold,
        }
    }

    /// Highest number of gauged actions observed running at the same time.
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub fn runs_of(&self, job: &str) -> usize {
        self.runs.lock().unwrap().get(job).copied().unwrap_or(0)
    }

    pub fn total_runs(&self) -> usize {
        self.runs.lock().unwrap().values().sum()
    }

    fn enter(&self, job: &str) {
        *self.runs.lock().unwrap().entry(job.to_string()).or_insert(0) += 1;
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
    }

    fn leave(&self) {
        self.current.fetch_sub(1, Ordering::SeqCst);
    }
}

pub struct GaugedAction {
    gauge: Arc<ConcurrencyGauge>,
    hold: Duration,
}

impl JobAction for GaugedAction {
    fn run(&self, ctx: JobContext) -> ActionFuture {
        let gauge = Arc::clone(&self.gauge);
        let hold = self.hold;
        Box::pin(async move {
            gauge.enter(ctx.job_id());
            tokio::time::sleep(hold).await;
            gauge.leave();
            Ok(())
        })
    }
}
