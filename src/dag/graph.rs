// src/dag/graph.rs

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::config::model::{DefaultSection, JobConfig, JobsFile};
use crate::dag::node::{JobId, JobNode};
use crate::errors::{DagrunError, Result};
use crate::exec::action::JobAction;
use crate::exec::command::CommandAction;
use crate::exec::simulated::{SharedRng, SimulatedWork, seeded_rng};

/// Job nodes built from a validated [`JobsFile`], keyed by job id.
///
/// Nodes reference each other by `Arc`, so this is only an index over them;
/// the executor needs nothing but [`JobGraph::entries`].
#[derive(Debug, Clone)]
pub struct JobGraph {
    nodes: BTreeMap<JobId, Arc<JobNode>>,
    entries: Vec<Arc<JobNode>>,
}

impl JobGraph {
    /// Build the graph described by `cfg`.
    ///
    /// Jobs may list their `after` entries in any order, so nodes are
    /// created first and linked in a second pass.
    pub fn from_config(cfg: &JobsFile) -> Result<Self> {
        let rng = shared_rng(&cfg.default);

        let mut nodes: BTreeMap<JobId, Arc<JobNode>> = BTreeMap::new();
        for (id, job) in cfg.job.iter() {
            let action = action_for(job, &cfg.default, &rng);
            nodes.insert(id.clone(), JobNode::with_shared_action(id.clone(), action, &[]));
        }

        for (id, job) in cfg.job.iter() {
            let node = &nodes[id];
            for dep in job.after.iter() {
                let prerequisite = nodes.get(dep).ok_or_else(|| {
                    DagrunError::MissingPrerequisite {
                        job: id.clone(),
                        prerequisite: dep.clone(),
                    }
                })?;
                node.depend_on(prerequisite)?;
            }
        }

        let entries = cfg
            .job
            .iter()
            .filter(|(_, job)| job.after.is_empty())
            .filter_map(|(id, _)| nodes.get(id).cloned())
            .collect();

        Ok(Self { nodes, entries })
    }

    /// Jobs without prerequisites, in id order.
    pub fn entries(&self) -> &[Arc<JobNode>] {
        &self.entries
    }

    pub fn get(&self, id: &str) -> Option<&Arc<JobNode>> {
        self.nodes.get(id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.nodes.keys().map(|s| s.as_str())
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

fn shared_rng(defaults: &DefaultSection) -> SharedRng {
    match defaults.seed {
        Some(seed) => seeded_rng(seed),
        None => Arc::new(Mutex::new(StdRng::from_entropy())),
    }
}

fn action_for(job: &JobConfig, defaults: &DefaultSection, rng: &SharedRng) -> Arc<dyn JobAction> {
    if let Some(cmd) = &job.cmd {
        return Arc::new(CommandAction::new(cmd.clone()));
    }
    if let Some(ms) = job.duration_ms {
        return Arc::new(SimulatedWork::fixed(Duration::from_millis(ms)));
    }
    let range = Duration::from_millis(defaults.min_duration_ms)
        ..=Duration::from_millis(defaults.max_duration_ms);
    Arc::new(SimulatedWork::with_rng(range, Arc::clone(rng)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::model::RawJobsFile;

    fn jobs_file(toml_src: &str) -> JobsFile {
        let raw: RawJobsFile = toml::from_str(toml_src).unwrap();
        JobsFile::try_from(raw).unwrap()
    }

    #[test]
    fn links_jobs_declared_out_of_order() {
        let cfg = jobs_file(
            r#"
[job.build]
after = ["fetch"]
duration_ms = 1

[job.fetch]
duration_ms = 1

[job.test]
after = ["build", "fetch"]
duration_ms = 1
"#,
        );

        let graph = JobGraph::from_config(&cfg).unwrap();

        assert_eq!(graph.len(), 3);
        let entry_ids: Vec<&str> = graph.entries().iter().map(|n| n.id()).collect();
        assert_eq!(entry_ids, vec!["fetch"]);

        let test = graph.get("test").unwrap();
        assert_eq!(test.pending(), 2);
        let mut prereqs = test.prerequisite_ids();
        prereqs.sort();
        assert_eq!(prereqs, vec!["build".to_string(), "fetch".to_string()]);

        let fetch = graph.get("fetch").unwrap();
        assert_eq!(fetch.dependents().len(), 2);
    }

    #[test]
    fn several_independent_entries() {
        let cfg = jobs_file(
            r#"
[job.a]
[job.b]
[job.c]
after = ["a", "b"]
"#,
        );

        let graph = JobGraph::from_config(&cfg).unwrap();
        let entry_ids: Vec<&str> = graph.entries().iter().map(|n| n.id()).collect();
        assert_eq!(entry_ids, vec!["a", "b"]);
    }
}
