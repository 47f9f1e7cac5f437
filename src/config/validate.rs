// src/config/validate.rs

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};

use petgraph::algo::{tarjan_scc, toposort};
use petgraph::graphmap::DiGraphMap;
use tokio::sync::Semaphore;

use crate::config::model::{JobConfig, JobsFile, RawJobsFile};
use crate::errors::{DagrunError, Result};

impl TryFrom<RawJobsFile> for JobsFile {
    type Error = DagrunError;

    fn try_from(raw: RawJobsFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(JobsFile::new_unchecked(raw.executor, raw.default, raw.job))
    }
}

impl JobsFile {
    /// Job ids ordered so that every job comes after its prerequisites.
    pub fn topological_order(&self) -> Result<Vec<String>> {
        topological_order(&self.job)
    }
}

fn validate_raw_config(cfg: &RawJobsFile) -> Result<()> {
    ensure_has_jobs(cfg)?;
    validate_executor_section(cfg)?;
    validate_default_section(cfg)?;
    validate_jobs(cfg)?;
    topological_order(&cfg.job)?;
    Ok(())
}

fn ensure_has_jobs(cfg: &RawJobsFile) -> Result<()> {
    if cfg.job.is_empty() {
        return Err(DagrunError::ConfigError(
            "jobs file must contain at least one [job.<id>] section".to_string(),
        ));
    }
    Ok(())
}

fn validate_executor_section(cfg: &RawJobsFile) -> Result<()> {
    if cfg.executor.workers == 0 {
        return Err(DagrunError::ConfigError(
            "[executor].workers must be >= 1 (got 0)".to_string(),
        ));
    }
    if cfg.executor.workers > Semaphore::MAX_PERMITS {
        return Err(DagrunError::ConfigError(format!(
            "[executor].workers must be <= {} (got {})",
            Semaphore::MAX_PERMITS,
            cfg.executor.workers
        )));
    }
    if cfg.executor.shutdown_timeout_secs == 0 {
        return Err(DagrunError::ConfigError(
            "[executor].shutdown_timeout_secs must be >= 1 (got 0)".to_string(),
        ));
    }
    Ok(())
}

fn validate_default_section(cfg: &RawJobsFile) -> Result<()> {
    let d = &cfg.default;
    if d.min_duration_ms > d.max_duration_ms {
        return Err(DagrunError::ConfigError(format!(
            "[default].min_duration_ms ({}) must not exceed max_duration_ms ({})",
            d.min_duration_ms, d.max_duration_ms
        )));
    }
    Ok(())
}

fn validate_jobs(cfg: &RawJobsFile) -> Result<()> {
    for (name, job) in cfg.job.iter() {
        if job.cmd.is_some() && job.duration_ms.is_some() {
            return Err(DagrunError::ConfigError(format!(
                "job '{}' sets both `cmd` and `duration_ms`",
                name
            )));
        }
        for dep in job.after.iter() {
            if !cfg.job.contains_key(dep) {
                return Err(DagrunError::ConfigError(format!(
                    "job '{}' has unknown dependency '{}' in `after`",
                    name, dep
                )));
            }
            if dep == name {
                return Err(DagrunError::ConfigError(format!(
                    "job '{}' cannot depend on itself in `after`",
                    name
                )));
            }
        }
    }
    Ok(())
}

fn topological_order(jobs: &BTreeMap<String, JobConfig>) -> Result<Vec<String>> {
    // Edge direction: prerequisite -> job. For
    //   [job.B]
    //   after = ["A"]
    // we add edge A -> B.
    let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();

    for name in jobs.keys() {
        graph.add_node(name.as_str());
    }

    for (name, job) in jobs.iter() {
        for dep in job.after.iter() {
            graph.add_edge(dep.as_str(), name.as_str(), ());
        }
    }

    match toposort(&graph, None) {
        Ok(order) => Ok(order.into_iter().map(str::to_string).collect()),
        Err(cycle) => Err(DagrunError::Cycle {
            path: cycle_path(&graph, cycle.node_id()),
        }),
    }
}

/// A cycle through `start`, as job ids with `start` repeated at the end.
///
/// The walk is a shortest-path search from `start` back to itself,
/// restricted to the strongly connected component that contains it.
fn cycle_path(graph: &DiGraphMap<&str, ()>, start: &str) -> Vec<String> {
    let component: HashSet<&str> = tarjan_scc(graph)
        .into_iter()
        .find(|scc| scc.contains(&start))
        .unwrap_or_default()
        .into_iter()
        .collect();

    let mut came_from: HashMap<&str, &str> = HashMap::new();
    let mut queue: VecDeque<&str> = VecDeque::from([start]);

    while let Some(node) = queue.pop_front() {
        for next in graph.neighbors(node) {
            if !component.contains(next) {
                continue;
            }
            if next == start {
                let mut path = vec![start.to_string()];
                let mut at = node;
                while at != start {
                    path.push(at.to_string());
                    at = came_from[at];
                }
                path.push(start.to_string());
                path.reverse();
                return path;
            }
            if !came_from.contains_key(next) {
                came_from.insert(next, node);
                queue.push_back(next);
            }
        }
    }

    vec![start.to_string(), start.to_string()]
}
