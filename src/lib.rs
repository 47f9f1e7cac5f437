// src/lib.rs

pub mod cli;
pub mod config;
pub mod dag;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod logging;
pub mod types;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::cli::CliArgs;
use crate::config::JobsFile;
use crate::config::loader::load_and_validate;
use crate::dag::JobGraph;
use crate::engine::{Executor, ExecutorConfig, RunReport};
use crate::exec::StdoutSink;

pub use crate::dag::{GraphBuilder, JobId, JobNode};
pub use crate::engine::JobOutcome;
pub use crate::errors::DagrunError;
pub use crate::exec::{ActionError, JobAction, JobContext};
pub use crate::types::FailurePolicy;

/// High-level entry point used by `main.rs`.
///
/// Loads and validates the jobs file, applies CLI overrides, builds the
/// graph and runs it with lifecycle lines printed on stdout. Ctrl-C cancels
/// the run cooperatively. Returns `None` for `--dry-run`.
pub async fn run(args: CliArgs) -> Result<Option<RunReport>> {
    let cfg = load_and_validate(&args.config)?;
    info!(config = %args.config, jobs = cfg.job.len(), "jobs file loaded");

    let config = executor_config(&cfg, &args);
    if args.dry_run {
        config.validate()?;
        for line in dry_run_plan(&cfg, &config)? {
            println!("{line}");
        }
        debug!("dry-run complete (no execution)");
        return Ok(None);
    }

    let executor = Executor::new(config)?.with_sink(Arc::new(StdoutSink));
    let graph = JobGraph::from_config(&cfg)?;

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "failed to listen for Ctrl+C");
                return;
            }
            info!("Ctrl+C received; cancelling run");
            cancel.cancel();
        });
    }

    let report = executor
        .run_with_cancellation(graph.entries(), cancel)
        .await?;
    Ok(Some(report))
}

/// `[executor]` settings with the CLI flags applied on top.
fn executor_config(cfg: &JobsFile, args: &CliArgs) -> ExecutorConfig {
    let mut config = cfg.executor.to_executor_config();
    if let Some(workers) = args.workers {
        config.worker_count = workers;
    }
    if let Some(secs) = args.shutdown_timeout {
        config.shutdown_timeout = Duration::from_secs(secs);
    }
    if let Some(policy) = args.failure_policy {
        config.failure_policy = policy;
    }
    config
}

/// What a run would do, one printed line per entry.
fn dry_run_plan(cfg: &JobsFile, config: &ExecutorConfig) -> Result<Vec<String>> {
    let mut lines = vec![
        "dagrun dry-run".to_string(),
        format!("  executor.workers = {}", config.worker_count),
        format!("  executor.shutdown_timeout = {:?}", config.shutdown_timeout),
        format!("  executor.failure_policy = {}", config.failure_policy),
        String::new(),
    ];

    let order = cfg.topological_order()?;
    lines.push(format!("jobs ({}), in dependency order:", order.len()));
    for id in order.iter() {
        let Some(job) = cfg.job.get(id) else { continue };
        lines.push(format!("  - {id}"));
        if !job.after.is_empty() {
            lines.push(format!("      after: {:?}", job.after));
        }
        if let Some(ref cmd) = job.cmd {
            lines.push(format!("      cmd: {cmd}"));
        } else if let Some(ms) = job.duration_ms {
            lines.push(format!("      simulated: {ms} ms"));
        } else {
            lines.push(format!(
                "      simulated: {}..={} ms",
                cfg.default.min_duration_ms, cfg.default.max_duration_ms
            ));
        }
    }
    Ok(lines)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RawJobsFile;
    use clap::Parser;

    fn jobs_file(toml_src: &str) -> JobsFile {
        let raw: RawJobsFile = toml::from_str(toml_src).unwrap();
        JobsFile::try_from(raw).unwrap()
    }

    #[test]
    fn cli_overrides_executor_section() {
        let cfg = jobs_file(
            r#"
[executor]
workers = 8
shutdown_timeout_secs = 30

[job.a]
"#,
        );

        let args = CliArgs::parse_from(["dagrun", "--workers", "2", "--failure-policy", "block"]);
        let config = executor_config(&cfg, &args);

        assert_eq!(config.worker_count, 2);
        assert_eq!(config.shutdown_timeout, Duration::from_secs(30));
        assert_eq!(config.failure_policy, FailurePolicy::Block);
    }

    #[test]
    fn dry_run_shows_the_effective_settings() {
        let cfg = jobs_file(
            r#"
[executor]
workers = 8

[job.fetch]
duration_ms = 5

[job.build]
after = ["fetch"]
cmd = "make"
"#,
        );
        let args = CliArgs::parse_from([
            "dagrun",
            "--dry-run",
            "--workers",
            "2",
            "--shutdown-timeout",
            "5",
        ]);

        let lines = dry_run_plan(&cfg, &executor_config(&cfg, &args)).unwrap();

        assert!(lines.contains(&"  executor.workers = 2".to_string()));
        assert!(lines.contains(&"  executor.shutdown_timeout = 5s".to_string()));
        assert!(!lines.iter().any(|l| l.contains("workers = 8")));

        let fetch = lines.iter().position(|l| l == "  - fetch").unwrap();
        let build = lines.iter().position(|l| l == "  - build").unwrap();
        assert!(fetch < build);
        assert!(lines.contains(&"      cmd: make".to_string()));
        assert!(lines.contains(&"      simulated: 5 ms".to_string()));
    }
}
