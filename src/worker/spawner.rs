//! Worker process spawner.
//!
//! Launches the worker with piped stdio and `kill_on_drop(true)`, and
//! provides [`wait_for_exit`], which resolves either when the worker dies on
//! its own or when the attachment is cancelled and the worker has been shut
//! down (terminate signal, grace period, then kill).

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::BridgeConfig;
use crate::{AppError, Result};

// ── Configuration ────────────────────────────────────────────────────────────

/// Configuration for spawning the worker process.
#[derive(Debug, Clone)]
pub struct SpawnConfig {
    /// Executable (e.g. `python`).
    pub program: String,
    /// Arguments passed to the executable.
    pub args: Vec<String>,
    /// Working directory of the child.
    pub workspace_root: PathBuf,
    /// Longest stdout/stderr line accepted.
    pub max_line_bytes: usize,
    /// Time between the terminate signal and a forced kill on stop.
    pub stop_grace: Duration,
}

impl From<&BridgeConfig> for SpawnConfig {
    fn from(config: &BridgeConfig) -> Self {
        Self {
            program: config.worker.program.clone(),
            args: config.worker.args.clone(),
            workspace_root: config.workspace_root.clone(),
            max_line_bytes: config.worker.max_line_bytes,
            stop_grace: config.stop_grace(),
        }
    }
}

// ── Connection handle ────────────────────────────────────────────────────────

/// Stdio handles of a freshly spawned worker.
#[derive(Debug)]
pub struct WorkerConnection {
    /// Child process handle, kept alive so `kill_on_drop` works.
    pub child: Child,
    /// Worker stdin, for protocol commands.
    pub stdin: ChildStdin,
    /// Worker stdout, carrying JSON events.
    pub stdout: ChildStdout,
    /// Worker stderr, carrying diagnostics.
    pub stderr: ChildStderr,
}

/// How a monitored worker ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExitOutcome {
    /// The worker exited without being asked to.
    Exited {
        /// Exit code, `None` when terminated by a signal or unknown.
        code: Option<i32>,
        /// Human-readable description.
        reason: String,
    },
    /// The worker was shut down through cancellation.
    Stopped,
}

// ── Spawner ──────────────────────────────────────────────────────────────────

/// Spawn the worker process with all three standard streams piped.
///
/// # Errors
///
/// - `AppError::Spawn("failed to spawn worker: …")`: OS spawn failure,
///   e.g. the executable is missing.
/// - `AppError::Spawn("failed to capture worker …")`: a stdio pipe is absent.
pub fn spawn_worker(config: &SpawnConfig) -> Result<WorkerConnection> {
    let mut cmd = Command::new(&config.program);
    cmd.args(&config.args)
        .current_dir(&config.workspace_root)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = cmd.spawn().map_err(|err| {
        AppError::Spawn(format!(
            "failed to spawn worker `{}`: {err}",
            config.program
        ))
    })?;

    let stdin = child
        .stdin
        .take()
        .ok_or_else(|| AppError::Spawn("failed to capture worker stdin".into()))?;
    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| AppError::Spawn("failed to capture worker stdout".into()))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| AppError::Spawn("failed to capture worker stderr".into()))?;

    info!(
        program = %config.program,
        pid = child.id(),
        "worker process spawned"
    );

    Ok(WorkerConnection {
        child,
        stdin,
        stdout,
        stderr,
    })
}

// ── Exit monitor ─────────────────────────────────────────────────────────────

/// Wait for the worker to exit, or shut it down once `cancel` fires.
///
/// On cancellation the worker receives a terminate signal (unix) and has
/// `grace` to exit before it is killed.
pub async fn wait_for_exit(
    mut child: Child,
    cancel: CancellationToken,
    grace: Duration,
) -> ExitOutcome {
    tokio::select! {
        result = child.wait() => match result {
            Ok(status) => {
                let code = status.code();
                let reason = code.map_or_else(
                    || "process terminated by signal".to_owned(),
                    |c| format!("process exited with code {c}"),
                );
                ExitOutcome::Exited { code, reason }
            }
            Err(err) => {
                warn!(%err, "error waiting for worker process");
                ExitOutcome::Exited {
                    code: None,
                    reason: format!("wait error: {err}"),
                }
            }
        },
        () = cancel.cancelled() => {
            shutdown(&mut child, grace).await;
            ExitOutcome::Stopped
        }
    }
}

async fn shutdown(child: &mut Child, grace: Duration) {
    request_terminate(child);

    match tokio::time::timeout(grace, child.wait()).await {
        Ok(Ok(status)) => {
            info!(?status, "worker process exited gracefully");
        }
        Ok(Err(err)) => {
            warn!(%err, "error waiting for worker process");
        }
        Err(_) => {
            warn!("worker did not exit within grace period, forcing kill");
            if let Err(err) = child.kill().await {
                warn!(%err, "failed to force-kill worker process");
            }
        }
    }
}

#[cfg(unix)]
fn request_terminate(child: &Child) {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    let Some(pid) = child.id().and_then(|id| i32::try_from(id).ok()) else {
        return;
    };
    if let Err(err) = kill(Pid::from_raw(pid), Signal::SIGTERM) {
        warn!(pid, %err, "failed to signal worker process");
    }
}

#[cfg(not(unix))]
fn request_terminate(child: &mut Child) {
    if let Err(err) = child.start_kill() {
        warn!(%err, "failed to signal worker process");
    }
}
