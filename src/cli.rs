// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, ValueEnum};

use crate::types::FailurePolicy;

/// Command-line arguments for `dagrun`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "dagrun",
    version,
    about = "Run a graph of dependent jobs on a bounded worker pool.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the jobs file (TOML).
    #[arg(long, value_name = "PATH", default_value = "Dagrun.toml")]
    pub config: String,

    /// Number of workers. Overrides `[executor].workers`.
    #[arg(long, value_name = "N")]
    pub workers: Option<usize>,

    /// Seconds to wait for jobs at shutdown before cancelling them.
    /// Overrides `[executor].shutdown_timeout_secs`.
    #[arg(long, value_name = "SECS")]
    pub shutdown_timeout: Option<u64>,

    /// What happens to dependents of a failed job (proceed, block).
    /// Overrides `[executor].failure_policy`.
    #[arg(long, value_name = "POLICY")]
    pub failure_policy: Option<FailurePolicy>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `DAGRUN_LOG` or `info` is used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Validate the jobs file and print the jobs in dependency order without
    /// running anything.
    #[arg(long)]
    pub dry_run: bool,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

pub fn parse() -> CliArgs {
    CliArgs::parse()
}
