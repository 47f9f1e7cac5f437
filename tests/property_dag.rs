// tests/property_dag.rs

mod common;
use crate::common::{ConcurrencyGauge, RecordingSink};

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use proptest::prelude::*;

use dagrun::JobNode;
use dagrun::engine::{Executor, ExecutorConfig};
use dagrun::exec::JobAction;

// Random DAG as dependency lists. Acyclic by construction: job N may only
// depend on jobs 0..N-1.
fn dag_strategy(max_jobs: usize) -> impl Strategy<Value = Vec<BTreeSet<usize>>> {
    (1..=max_jobs).prop_flat_map(|num_jobs| {
        proptest::collection::vec(
            proptest::collection::vec(any::<usize>(), 0..4),
            num_jobs,
        )
        .prop_map(|raw| {
            raw.into_iter()
                .enumerate()
                .map(|(i, deps)| {
                    if i == 0 {
                        BTreeSet::new()
                    } else {
                        deps.into_iter().map(|d| d % i).collect()
                    }
                })
                .collect()
        })
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn every_job_runs_once_after_its_prerequisites(
        deps in dag_strategy(12),
        workers in 1..5usize,
    ) {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_all()
            .build()
            .unwrap();

        let gauge = ConcurrencyGauge::new();
        let mut nodes: Vec<Arc<JobNode>> = Vec::with_capacity(deps.len());
        for (i, prereqs) in deps.iter().enumerate() {
            let action: Arc<dyn JobAction> = Arc::new(gauge.action(Duration::from_millis(1)));
            let parents: Vec<&Arc<JobNode>> = prereqs.iter().map(|p| &nodes[*p]).collect();
            let node = JobNode::with_shared_action(format!("job-{i}"), action, &parents);
            nodes.push(node);
        }
        let entries: Vec<Arc<JobNode>> = nodes
            .iter()
            .zip(deps.iter())
            .filter(|(_, prereqs)| prereqs.is_empty())
            .map(|(node, _)| Arc::clone(node))
            .collect();

        let sink = Arc::new(RecordingSink::new());
        let executor = Executor::new(ExecutorConfig::with_workers(workers))
            .unwrap()
            .with_sink(sink.clone());

        let report = runtime
            .block_on(async {
                tokio::time::timeout(Duration::from_secs(10), executor.run(&entries)).await
            })
            .expect("run timed out")
            .unwrap();

        prop_assert!(report.is_success());
        prop_assert_eq!(report.len(), deps.len());
        prop_assert_eq!(sink.len(), 2 * deps.len());
        prop_assert!(gauge.peak() <= workers);
        for (i, prereqs) in deps.iter().enumerate() {
            let job = format!("job-{i}");
            prop_assert_eq!(gauge.runs_of(&job), 1);
            for p in prereqs {
                sink.assert_finished_before(&format!("job-{p}"), &job);
            }
        }
    }
}
