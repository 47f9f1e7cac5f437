// src/exec/command.rs

//! Job body that runs a shell command.

use std::process::Stdio;

use anyhow::Context;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::exec::action::{ActionError, ActionFuture, JobAction, JobContext};

/// Runs `cmd` through the platform shell.
///
/// - stdout lines are logged at `info`, stderr lines at `debug`;
/// - a non-zero exit status fails the job;
/// - on cancellation the child process is killed and the job reports
///   [`ActionError::Cancelled`].
#[derive(Debug, Clone)]
pub struct CommandAction {
    cmd: String,
}

impl CommandAction {
    pub fn new(cmd: impl Into<String>) -> Self {
        Self { cmd: cmd.into() }
    }

    pub fn cmd(&self) -> &str {
        &self.cmd
    }
}

impl JobAction for CommandAction {
    fn run(&self, ctx: JobContext) -> ActionFuture {
        let cmd = self.cmd.clone();
        Box::pin(async move { run_command(&cmd, &ctx).await })
    }
}

async fn run_command(cmd_line: &str, ctx: &JobContext) -> Result<(), ActionError> {
    let job = ctx.job_id().to_string();
    info!(job = %job, cmd = %cmd_line, "starting job process");

    let mut cmd = if cfg!(windows) {
        let mut c = Command::new("cmd");
        c.arg("/C").arg(cmd_line);
        c
    } else {
        let mut c = Command::new("sh");
        c.arg("-c").arg(cmd_line);
        c
    };

    cmd.stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = cmd
        .spawn()
        .with_context(|| format!("spawning process for job '{job}'"))?;

    if let Some(stdout) = child.stdout.take() {
        let job = job.clone();
        tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                info!(job = %job, "stdout: {}", line);
            }
        });
    }

    if let Some(stderr) = child.stderr.take() {
        let job = job.clone();
        tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                debug!(job = %job, "stderr: {}", line);
            }
        });
    }

    tokio::select! {
        status = child.wait() => {
            let status = status
                .with_context(|| format!("waiting for process of job '{job}'"))?;
            let code = status.code().unwrap_or(-1);
            debug!(job = %job, exit_code = code, "job process exited");

            if status.success() {
                Ok(())
            } else {
                Err(ActionError::Failed(format!("command exited with code {code}")))
            }
        }

        _ = ctx.cancelled() => {
            info!(job = %job, "cancellation requested; killing job process");
            if let Err(e) = child.kill().await {
                warn!(job = %job, error = %e, "failed to kill job process on cancellation");
            }
            Err(ActionError::Cancelled)
        }
    }
}
