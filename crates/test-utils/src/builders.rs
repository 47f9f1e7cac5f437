#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use dagrun::dag::JobNode;
use dagrun::exec::{ActionError, JobAction, JobContext, SimulatedWork};

/// Nodes of a hand-built graph, with the entry nodes to hand to the executor.
pub struct SampleGraph {
    pub entries: Vec<Arc<JobNode>>,
    nodes: BTreeMap<String, Arc<JobNode>>,
}

impl SampleGraph {
    fn new() -> Self {
        Self {
            entries: Vec::new(),
            nodes: BTreeMap::new(),
        }
    }

    fn add(
        &mut self,
        id: &str,
        after: &[&str],
        make: &dyn Fn(&str) -> Arc<dyn JobAction>,
    ) -> Arc<JobNode> {
        let prereqs: Vec<&Arc<JobNode>> = after.iter().map(|p| &self.nodes[*p]).collect();
        let node = JobNode::with_shared_action(id, make(id), &prereqs);
        if after.is_empty() {
            self.entries.push(Arc::clone(&node));
        }
        self.nodes.insert(id.to_string(), Arc::clone(&node));
        node
    }

    pub fn get(&self, id: &str) -> &Arc<JobNode> {
        &self.nodes[id]
    }

    pub fn ids(&self) -> Vec<String> {
        self.nodes.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Every `(prerequisite, dependent)` edge.
    pub fn edges(&self) -> Vec<(String, String)> {
        self.nodes
            .values()
            .flat_map(|node| {
                node.prerequisite_ids()
                    .into_iter()
                    .map(|p| (p, node.id().to_string()))
                    .collect::<Vec<_>>()
            })
            .collect()
    }
}

/// The nine-job demo graph shipped in `Dagrun.toml`:
///
/// ```text
/// A -> C -> E, B -> D -> E, E -> F/G/H, F/G/H -> I
/// ```
pub fn demo_graph(make: impl Fn(&str) -> Arc<dyn JobAction>) -> SampleGraph {
    let mut g = SampleGraph::new();
    g.add("Job A", &[], &make);
    g.add("Job B", &[], &make);
    g.add("Job C", &["Job A"], &make);
    g.add("Job D", &["Job B"], &make);
    g.add("Job E", &["Job C", "Job D"], &make);
    g.add("Job F", &["Job E"], &make);
    g.add("Job G", &["Job E"], &make);
    g.add("Job H", &["Job E"], &make);
    g.add("Job I", &["Job F", "Job G", "Job H"], &make);
    g
}

/// Layers of jobs where every job depends on every job of the layer above.
/// Ids are `L<layer>-<index>`.
pub fn layered_graph(
    widths: &[usize],
    make: impl Fn(&str) -> Arc<dyn JobAction>,
) -> SampleGraph {
    let mut g = SampleGraph::new();
    let mut previous: Vec<String> = Vec::new();
    for (layer, width) in widths.iter().enumerate() {
        let current: Vec<String> = (0..*width).map(|i| format!("L{layer}-{i}")).collect();
        let after: Vec<&str> = previous.iter().map(String::as_str).collect();
        for id in current.iter() {
            g.add(id, &after, &make);
        }
        previous = current;
    }
    g
}

/// A small build pipeline:
///
/// ```text
/// fetch -> compile-core, compile-cli -> link -> test, package
/// ```
pub fn build_pipeline(make: impl Fn(&str) -> Arc<dyn JobAction>) -> SampleGraph {
    let mut g = SampleGraph::new();
    g.add("fetch", &[], &make);
    g.add("compile-core", &["fetch"], &make);
    g.add("compile-cli", &["fetch"], &make);
    g.add("link", &["compile-core", "compile-cli"], &make);
    g.add("test", &["link"], &make);
    g.add("package", &["link"], &make);
    g
}

/// Action factory: every job sleeps for `duration`.
pub fn sleeping(duration: Duration) -> impl Fn(&str) -> Arc<dyn JobAction> {
    move |_id: &str| Arc::new(SimulatedWork::fixed(duration)) as Arc<dyn JobAction>
}

/// Action that fails with `message`.
pub fn failing(message: &str) -> Arc<dyn JobAction> {
    let message = message.to_string();
    Arc::new(move |_ctx: JobContext| {
        let message = message.clone();
        async move { Err::<(), ActionError>(ActionError::failed(message)) }
    })
}

/// Action that panics.
pub fn panicking() -> Arc<dyn JobAction> {
    Arc::new(|ctx: JobContext| async move { explode(&ctx) })
}

fn explode(ctx: &JobContext) -> Result<(), ActionError> {
    panic!("job body of '{}' exploded", ctx.job_id())
}

/// Action that sleeps for `duration` and ignores cancellation.
pub fn stubborn(duration: Duration) -> Arc<dyn JobAction> {
    Arc::new(move |_ctx: JobContext| async move {
        tokio::time::sleep(duration).await;
        Ok::<(), ActionError>(())
    })
}
