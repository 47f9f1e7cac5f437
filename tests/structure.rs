// tests/structure.rs

mod common;
use crate::common::builders::{demo_graph, sleeping};
use crate::common::{ConcurrencyGauge, init_tracing, recording_executor, with_timeout};

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use dagrun::dag::{GraphBuilder, JobNode, JobState};
use dagrun::engine::{Executor, ExecutorConfig};
use dagrun::errors::DagrunError;
use dagrun::exec::{ActionError, JobAction, JobContext, noop};

fn ids(nodes: &[Arc<JobNode>]) -> Vec<String> {
    nodes.iter().map(|n| n.id().to_string()).collect()
}

#[tokio::test]
async fn cycle_is_rejected_before_anything_runs() {
    init_tracing();

    let gauge = ConcurrencyGauge::new();
    let hold = Duration::from_millis(1);
    let a = JobNode::new("A", gauge.action(hold), &[]);
    let b = JobNode::new("B", gauge.action(hold), &[&a]);
    let c = JobNode::new("C", gauge.action(hold), &[&b]);
    a.depend_on(&c).unwrap();

    assert!(GraphBuilder::new(&[Arc::clone(&a)]).detect_cycle());

    let (executor, sink) = recording_executor(ExecutorConfig::default());
    let result = with_timeout(executor.run(&[Arc::clone(&a)])).await;

    match result {
        Err(DagrunError::Cycle { path }) => {
            assert_eq!(path, vec!["A", "B", "C", "A"]);
        }
        other => panic!("expected Cycle error, got {other:?}"),
    }
    assert_eq!(gauge.total_runs(), 0);
    assert!(sink.is_empty());
    for node in [&a, &b, &c] {
        assert_eq!(node.state(), JobState::Idle);
    }
}

#[test]
fn self_dependency_is_a_cycle() {
    let a = JobNode::new("A", noop(), &[]);
    a.depend_on(&a).unwrap();

    let path = GraphBuilder::new(&[a]).find_cycle();
    assert_eq!(path, Some(vec!["A".to_string(), "A".to_string()]));
}

#[test]
fn shared_descendants_are_not_a_cycle() {
    let graph = demo_graph(sleeping(Duration::from_millis(1)));
    assert!(!GraphBuilder::new(&graph.entries).detect_cycle());
}

#[test]
fn gate_opens_exactly_at_the_last_prerequisite() {
    let p1 = JobNode::new("p1", noop(), &[]);
    let p2 = JobNode::new("p2", noop(), &[]);
    let p3 = JobNode::new("p3", noop(), &[]);
    let child = JobNode::new("child", noop(), &[&p1, &p2, &p3]);

    assert_eq!(child.pending(), 3);
    assert!(!child.is_runnable());

    assert!(p1.notify_dependents_on_completion().is_empty());
    assert_eq!(child.pending(), 2);
    assert!(!child.is_runnable());

    // Repeated fan-out from the same prerequisite must not count twice.
    assert!(p1.notify_dependents_on_completion().is_empty());
    assert_eq!(child.pending(), 2);

    assert!(p2.notify_dependents_on_completion().is_empty());
    assert!(!child.is_runnable());

    let released = p3.notify_dependents_on_completion();
    assert_eq!(ids(&released), vec!["child"]);
    assert!(child.is_runnable());
    assert_eq!(child.pending(), 0);
}

#[test]
fn discovery_is_idempotent() {
    let graph = demo_graph(sleeping(Duration::from_millis(1)));

    let first = ids(&GraphBuilder::new(&graph.entries).discover_all());
    let second = ids(&GraphBuilder::new(&graph.entries).discover_all());
    assert_eq!(first, second);
    assert_eq!(first.len(), 7);

    let mut reversed = graph.entries.clone();
    reversed.reverse();
    let from_reversed: BTreeSet<String> =
        ids(&GraphBuilder::new(&reversed).discover_all()).into_iter().collect();
    let expected: BTreeSet<String> = first.into_iter().collect();
    assert_eq!(from_reversed, expected);
}

#[test]
fn discovery_excludes_entries_and_repeats() {
    let a = JobNode::new("A", noop(), &[]);
    let b = JobNode::new("B", noop(), &[&a]);
    let _c = JobNode::new("C", noop(), &[&a, &b]);

    let entries = vec![Arc::clone(&a), Arc::clone(&a)];
    let builder = GraphBuilder::new(&entries);
    assert_eq!(ids(&builder.unique_entries()), vec!["A"]);
    assert_eq!(ids(&builder.discover_all()), vec!["B", "C"]);
}

#[tokio::test]
async fn unreachable_prerequisite_is_rejected() {
    init_tracing();

    let a = JobNode::new("A", noop(), &[]);
    let x = JobNode::new("X", noop(), &[]);
    let _c = JobNode::new("C", noop(), &[&a, &x]);

    let executor = Executor::new(ExecutorConfig::default()).unwrap();
    let result = with_timeout(executor.run(&[Arc::clone(&a)])).await;

    match result {
        Err(DagrunError::MissingPrerequisite { job, prerequisite }) => {
            assert_eq!(job, "C");
            assert_eq!(prerequisite, "X");
        }
        other => panic!("expected MissingPrerequisite, got {other:?}"),
    }
    assert_eq!(a.state(), JobState::Idle);
}

#[tokio::test]
async fn dropped_prerequisite_is_rejected() {
    init_tracing();

    let a = JobNode::new("A", noop(), &[]);
    let x = JobNode::new("X", noop(), &[]);
    let _c = JobNode::new("C", noop(), &[&a, &x]);
    drop(x);

    let executor = Executor::new(ExecutorConfig::default()).unwrap();
    let err = with_timeout(executor.run(&[a])).await.unwrap_err();

    assert!(matches!(
        err,
        DagrunError::MissingPrerequisite { ref prerequisite, .. } if prerequisite == "X"
    ));
    assert!(err.is_structural());
}

#[tokio::test]
async fn duplicate_ids_are_rejected() {
    init_tracing();

    let first = JobNode::new("build", noop(), &[]);
    let second = JobNode::new("build", noop(), &[]);

    let executor = Executor::new(ExecutorConfig::default()).unwrap();
    let err = with_timeout(executor.run(&[first, second])).await.unwrap_err();

    assert!(matches!(err, DagrunError::DuplicateJob(ref id) if id == "build"));
}

#[tokio::test]
async fn a_graph_runs_only_once() {
    init_tracing();

    let a = JobNode::new("A", noop(), &[]);
    let b = JobNode::new("B", noop(), &[&a]);

    let executor = Executor::new(ExecutorConfig::default()).unwrap();
    let report = with_timeout(executor.run(&[Arc::clone(&a)])).await.unwrap();
    assert!(report.is_success());
    assert_eq!(b.state(), JobState::Finished);

    let err = with_timeout(executor.run(&[Arc::clone(&a)])).await.unwrap_err();
    assert!(matches!(err, DagrunError::AlreadyScheduled(_)));

    let late = JobNode::new("late", noop(), &[]);
    let err = late.depend_on(&a).unwrap_err();
    assert!(matches!(err, DagrunError::GraphSealed(ref id) if id == "A"));
}

#[tokio::test]
async fn running_a_node_twice_directly_fails() {
    let a = JobNode::new("A", noop(), &[]);

    a.run(JobContext::detached("A")).await.unwrap();
    let err = a.run(JobContext::detached("A")).await.unwrap_err();

    assert!(matches!(err, ActionError::AlreadyRan(ref id) if id == "A"));
    assert_eq!(a.state(), JobState::Finished);
}

#[tokio::test]
async fn running_a_node_before_its_prerequisites_fails() {
    let gauge = ConcurrencyGauge::new();
    let parent = JobNode::new("parent", gauge.action(Duration::ZERO), &[]);
    let child = JobNode::new("child", gauge.action(Duration::ZERO), &[&parent]);

    let err = child.run(JobContext::detached("child")).await.unwrap_err();

    assert!(matches!(err, ActionError::NotReady(ref id, 1) if id == "child"));
    assert_eq!(child.state(), JobState::Idle);
    assert_eq!(child.pending(), 1);
    assert_eq!(gauge.runs_of("child"), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn siblings_built_on_many_threads_all_register() {
    init_tracing();

    const THREADS: usize = 8;
    const PER_THREAD: usize = 50;

    let gauge = ConcurrencyGauge::new();
    let root = JobNode::new("root", noop(), &[]);

    std::thread::scope(|scope| {
        for t in 0..THREADS {
            let root = &root;
            let gauge = &gauge;
            scope.spawn(move || {
                for i in 0..PER_THREAD {
                    let action: Arc<dyn JobAction> = Arc::new(gauge.action(Duration::ZERO));
                    JobNode::with_shared_action(format!("child-{t}-{i}"), action, &[root]);
                }
            });
        }
    });

    let children = root.dependents();
    assert_eq!(children.len(), THREADS * PER_THREAD);
    assert!(children.iter().all(|c| c.pending() == 1));

    let (executor, sink) = recording_executor(ExecutorConfig::with_workers(8));
    let report = with_timeout(executor.run(&[root])).await.unwrap();

    assert!(report.is_success());
    assert_eq!(report.len(), THREADS * PER_THREAD + 1);
    assert_eq!(gauge.total_runs(), THREADS * PER_THREAD);
    for child in children.iter() {
        assert_eq!(gauge.runs_of(child.id()), 1);
    }
    assert_eq!(sink.len(), 2 * (THREADS * PER_THREAD + 1));
}
