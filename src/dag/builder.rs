// src/dag/builder.rs

//! Graph discovery and validation for a set of entry jobs.
//!
//! Everything here follows `dependents` edges starting from the entry set,
//! the same traversal the executor uses, so cycle detection and discovery
//! both cover exactly the subgraph a run would schedule.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use tracing::debug;

use crate::dag::node::{JobId, JobNode, JobState};
use crate::errors::{DagrunError, Result};

/// Identity of a node for visited-set bookkeeping.
fn key(node: &Arc<JobNode>) -> usize {
    Arc::as_ptr(node) as usize
}

#[derive(Debug, Clone, Copy)]
pub struct GraphBuilder<'a> {
    entries: &'a [Arc<JobNode>],
}

impl<'a> GraphBuilder<'a> {
    pub fn new(entries: &'a [Arc<JobNode>]) -> Self {
        Self { entries }
    }

    /// Entry nodes with duplicates removed, in the order given.
    pub fn unique_entries(&self) -> Vec<Arc<JobNode>> {
        let mut seen = HashSet::new();
        self.entries
            .iter()
            .filter(|node| seen.insert(key(node)))
            .cloned()
            .collect()
    }

    /// Every node reachable from the entries that is not itself an entry,
    /// each exactly once, in breadth-first order.
    ///
    /// Dependents are visited in registration order, so the result is
    /// deterministic for a given graph.
    pub fn discover_all(&self) -> Vec<Arc<JobNode>> {
        let entries = self.unique_entries();
        let mut seen: HashSet<usize> = entries.iter().map(key).collect();
        let mut queue: VecDeque<Arc<JobNode>> = entries.into_iter().collect();
        let mut discovered = Vec::new();

        while let Some(node) = queue.pop_front() {
            for dependent in node.dependents() {
                if seen.insert(key(&dependent)) {
                    discovered.push(Arc::clone(&dependent));
                    queue.push_back(dependent);
                }
            }
        }

        discovered
    }

    /// Whether any node reachable from the entries is its own transitive
    /// prerequisite.
    pub fn detect_cycle(&self) -> bool {
        self.find_cycle().is_some()
    }

    /// Depth-first search for a back edge.
    ///
    /// Returns the ids along the cycle, with the first id repeated at the
    /// end (`["A", "B", "C", "A"]`). Iterative, so deep chains cannot blow
    /// the stack.
    pub fn find_cycle(&self) -> Option<Vec<JobId>> {
        struct Frame {
            node: Arc<JobNode>,
            children: Vec<Arc<JobNode>>,
            next: usize,
        }

        impl Frame {
            fn new(node: Arc<JobNode>) -> Self {
                let children = node.dependents();
                Self {
                    node,
                    children,
                    next: 0,
                }
            }
        }

        let mut visited: HashSet<usize> = HashSet::new();
        let mut on_stack: HashSet<usize> = HashSet::new();

        for entry in self.entries {
            if visited.contains(&key(entry)) {
                continue;
            }

            on_stack.insert(key(entry));
            let mut stack = vec![Frame::new(Arc::clone(entry))];

            while let Some(frame) = stack.last_mut() {
                if frame.next < frame.children.len() {
                    let child = Arc::clone(&frame.children[frame.next]);
                    frame.next += 1;
                    let child_key = key(&child);

                    if on_stack.contains(&child_key) {
                        let start = stack
                            .iter()
                            .position(|f| key(&f.node) == child_key)
                            .unwrap_or(0);
                        let mut path: Vec<JobId> = stack[start..]
                            .iter()
                            .map(|f| f.node.id().to_string())
                            .collect();
                        path.push(child.id().to_string());
                        return Some(path);
                    }

                    if !visited.contains(&child_key) {
                        on_stack.insert(child_key);
                        stack.push(Frame::new(child));
                    }
                } else if let Some(done) = stack.pop() {
                    on_stack.remove(&key(&done.node));
                    visited.insert(key(&done.node));
                }
            }
        }

        None
    }

    /// Validate the reachable graph and return the nodes a run must
    /// schedule: the entries followed by everything they reach.
    ///
    /// Fails, before anything is dispatched, if the graph has a cycle,
    /// two nodes share an id, a node was already scheduled by another run,
    /// or a node waits on a prerequisite that the run will never execute.
    pub fn plan(&self) -> Result<ExecutionPlan> {
        if let Some(path) = self.find_cycle() {
            return Err(DagrunError::Cycle { path });
        }

        let entries = self.unique_entries();
        let entry_count = entries.len();
        let mut nodes = entries;
        nodes.extend(self.discover_all());

        let mut ids: HashMap<&str, usize> = HashMap::with_capacity(nodes.len());
        for node in &nodes {
            if let Some(other) = ids.insert(node.id(), key(node)) {
                if other != key(node) {
                    return Err(DagrunError::DuplicateJob(node.id().to_string()));
                }
            }
        }

        for node in &nodes {
            if node.state() != JobState::Idle {
                return Err(DagrunError::AlreadyScheduled(node.id().to_string()));
            }
        }

        let members: HashSet<usize> = nodes.iter().map(key).collect();
        for node in &nodes {
            if let Some(dropped) = node.dropped_prerequisites().into_iter().next() {
                return Err(DagrunError::MissingPrerequisite {
                    job: node.id().to_string(),
                    prerequisite: dropped,
                });
            }
            for prerequisite in node.prerequisites() {
                if !members.contains(&key(&prerequisite)) {
                    return Err(DagrunError::MissingPrerequisite {
                        job: node.id().to_string(),
                        prerequisite: prerequisite.id().to_string(),
                    });
                }
            }
        }

        debug!(
            entries = entry_count,
            total = nodes.len(),
            "execution plan ready"
        );

        Ok(ExecutionPlan { nodes, entry_count })
    }
}

/// Validated set of nodes for one run.
#[derive(Debug, Clone)]
pub struct ExecutionPlan {
    nodes: Vec<Arc<JobNode>>,
    entry_count: usize,
}

impl ExecutionPlan {
    /// Entries first, then discovered dependents in breadth-first order.
    pub fn nodes(&self) -> &[Arc<JobNode>] {
        &self.nodes
    }

    pub fn entries(&self) -> &[Arc<JobNode>] {
        &self.nodes[..self.entry_count]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn ids(&self) -> Vec<JobId> {
        self.nodes.iter().map(|n| n.id().to_string()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::action::noop;

    fn ids(nodes: &[Arc<JobNode>]) -> Vec<&str> {
        nodes.iter().map(|n| n.id()).collect()
    }

    #[test]
    fn discovers_diamond_once_in_bfs_order() {
        let a = JobNode::new("A", noop(), &[]);
        let b = JobNode::new("B", noop(), &[&a]);
        let c = JobNode::new("C", noop(), &[&a]);
        let _d = JobNode::new("D", noop(), &[&b, &c]);

        let entries = vec![a];
        let found = GraphBuilder::new(&entries).discover_all();
        assert_eq!(ids(&found), vec!["B", "C", "D"]);
    }

    #[test]
    fn duplicated_entries_are_collapsed() {
        let a = JobNode::new("A", noop(), &[]);
        let _b = JobNode::new("B", noop(), &[&a]);

        let entries = vec![Arc::clone(&a), a];
        let plan = GraphBuilder::new(&entries).plan().expect("valid graph");
        assert_eq!(plan.ids(), vec!["A", "B"]);
        assert_eq!(plan.entries().len(), 1);
    }

    #[test]
    fn finds_cycle_path() {
        let a = JobNode::new("A", noop(), &[]);
        let b = JobNode::new("B", noop(), &[&a]);
        let c = JobNode::new("C", noop(), &[&b]);
        a.depend_on(&c).expect("graph not sealed");

        let entries = vec![a];
        let builder = GraphBuilder::new(&entries);
        assert!(builder.detect_cycle());
        assert_eq!(
            builder.find_cycle(),
            Some(vec![
                "A".to_string(),
                "B".to_string(),
                "C".to_string(),
                "A".to_string()
            ])
        );
    }

    #[test]
    fn shared_descendant_is_not_a_cycle() {
        let a = JobNode::new("A", noop(), &[]);
        let b = JobNode::new("B", noop(), &[&a]);
        let c = JobNode::new("C", noop(), &[&a, &b]);
        let _d = JobNode::new("D", noop(), &[&b, &c]);

        let entries = vec![a];
        assert!(!GraphBuilder::new(&entries).detect_cycle());
    }

    #[test]
    fn self_dependency_is_a_cycle() {
        let a = JobNode::new("A", noop(), &[]);
        a.depend_on(&a).expect("graph not sealed");

        let entries = vec![a];
        assert_eq!(
            GraphBuilder::new(&entries).find_cycle(),
            Some(vec!["A".to_string(), "A".to_string()])
        );
    }
}
