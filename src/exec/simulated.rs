// src/exec/simulated.rs

//! Placeholder job body that "works" by sleeping.
//!
//! The duration is either fixed or drawn from a range with an injectable
//! random number generator, so tests can make it deterministic.

use std::ops::RangeInclusive;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use crate::exec::action::{ActionError, ActionFuture, JobAction, JobContext};

/// Random number generator that can be shared by several jobs.
pub type SharedRng = Arc<Mutex<StdRng>>;

pub fn seeded_rng(seed: u64) -> SharedRng {
    Arc::new(Mutex::new(StdRng::seed_from_u64(seed)))
}

#[derive(Debug, Clone)]
enum DurationSource {
    Fixed(Duration),
    Random {
        range: RangeInclusive<Duration>,
        rng: SharedRng,
    },
}

#[derive(Debug, Clone)]
pub struct SimulatedWork {
    source: DurationSource,
}

impl SimulatedWork {
    /// Always sleep for `duration`.
    pub fn fixed(duration: Duration) -> Self {
        Self {
            source: DurationSource::Fixed(duration),
        }
    }

    /// Sleep for a random duration within `range`, seeded from entropy.
    pub fn random(range: RangeInclusive<Duration>) -> Self {
        Self::with_rng(range, Arc::new(Mutex::new(StdRng::from_entropy())))
    }

    /// Sleep for a random duration within `range`, drawn from `rng`.
    pub fn with_rng(range: RangeInclusive<Duration>, rng: SharedRng) -> Self {
        Self {
            source: DurationSource::Random { range, rng },
        }
    }

    /// Pick the duration of the next run.
    pub fn next_duration(&self) -> Duration {
        match &self.source {
            DurationSource::Fixed(d) => *d,
            DurationSource::Random { range, rng } => {
                let (lo, hi) = (range.start().as_millis(), range.end().as_millis());
                if lo >= hi {
                    return *range.start();
                }
                let mut rng = rng.lock().unwrap_or_else(PoisonError::into_inner);
                let millis = rng.gen_range(lo..=hi);
                Duration::from_millis(u64::try_from(millis).unwrap_or(u64::MAX))
            }
        }
    }
}

impl JobAction for SimulatedWork {
    fn run(&self, ctx: JobContext) -> ActionFuture {
        let duration = self.next_duration();
        Box::pin(async move {
            debug!(job = %ctx.job_id(), ?duration, "simulating work");
            tokio::select! {
                _ = tokio::time::sleep(duration) => Ok(()),
                _ = ctx.cancelled() => Err(ActionError::Cancelled),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seeded_durations_are_reproducible() {
        let range = Duration::from_millis(4000)..=Duration::from_millis(8000);
        let a = SimulatedWork::with_rng(range.clone(), seeded_rng(42));
        let b = SimulatedWork::with_rng(range.clone(), seeded_rng(42));

        for _ in 0..16 {
            let d = a.next_duration();
            assert_eq!(d, b.next_duration());
            assert!(range.contains(&d));
        }
    }

    #[tokio::test]
    async fn stops_when_cancelled() {
        let work = SimulatedWork::fixed(Duration::from_secs(30));
        let ctx = JobContext::detached("slow");
        ctx.cancellation().cancel();

        let result = work.run(ctx).await;
        assert!(matches!(result, Err(ActionError::Cancelled)));
    }
}
