//! Worker process supervisor.
//!
//! Owns the single worker attachment. Components that need the worker hold
//! an `Arc<Supervisor>`; nothing else keeps a process handle.
//!
//! # States
//!
//! ```text
//! Detached --start() ok-----> Attached
//! Detached --start() fails--> Detached   (spawn error reported)
//! Attached --worker exits---> Detached   (WorkerExited emitted)
//! Attached --stop()---------> Detached
//! ```
//!
//! Writes are only accepted while attached. There is no queueing and no
//! automatic restart: the next interaction that needs the worker calls
//! [`Supervisor::start`] again.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::host::Notifier;
use crate::worker::protocol::WorkerCommand;
use crate::worker::reader::{run_reader, run_stderr_drain};
use crate::worker::spawner::{spawn_worker, wait_for_exit, ExitOutcome, SpawnConfig};
use crate::worker::writer::run_writer;
use crate::worker::BridgeEvent;
use crate::{AppError, Result};

/// Capacity of the per-attachment outbound line queue.
const COMMAND_QUEUE: usize = 64;

/// Time allowed for the reader to deliver buffered stdout after an exit.
const READER_DRAIN: Duration = Duration::from_secs(1);

/// Whether a worker is currently attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachState {
    /// No live worker.
    Detached,
    /// A worker is running and accepting commands.
    Attached,
}

/// Live worker bookkeeping.
struct Attachment {
    generation: u64,
    line_tx: mpsc::Sender<String>,
    cancel: CancellationToken,
    monitor: JoinHandle<()>,
}

type Slot = Arc<Mutex<Option<Attachment>>>;

/// Owns the worker process and its stream tasks.
pub struct Supervisor {
    config: SpawnConfig,
    event_tx: mpsc::Sender<BridgeEvent>,
    notifier: Arc<dyn Notifier>,
    slot: Slot,
    generations: AtomicU64,
}

impl Supervisor {
    /// Create a detached supervisor.
    ///
    /// Decoded worker events and exit notices are delivered on `event_tx`.
    #[must_use]
    pub fn new(
        config: SpawnConfig,
        event_tx: mpsc::Sender<BridgeEvent>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            config,
            event_tx,
            notifier,
            slot: Arc::new(Mutex::new(None)),
            generations: AtomicU64::new(0),
        }
    }

    /// Current attachment state.
    pub async fn state(&self) -> AttachState {
        if self.slot.lock().await.is_some() {
            AttachState::Attached
        } else {
            AttachState::Detached
        }
    }

    /// Spawn the worker unless one is already attached.
    ///
    /// Returns `Ok(true)` when a new worker was spawned and `Ok(false)` when
    /// one was already running.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Spawn`] when the worker cannot be launched. The
    /// failure has already been reported through the notifier and the
    /// supervisor stays detached.
    pub async fn start(&self) -> Result<bool> {
        let mut guard = self.slot.lock().await;
        if guard.is_some() {
            debug!("supervisor: worker already attached");
            return Ok(false);
        }

        let conn = match spawn_worker(&self.config) {
            Ok(conn) => conn,
            Err(err) => {
                error!(%err, "supervisor: worker spawn failed");
                self.notifier.error(&format!("Failed to start worker: {err}"));
                return Err(err);
            }
        };

        let generation = self.generations.fetch_add(1, Ordering::Relaxed) + 1;
        let span = info_span!("worker", generation, pid = conn.child.id());
        let cancel = CancellationToken::new();
        let (line_tx, line_rx) = mpsc::channel(COMMAND_QUEUE);
        let max_line_bytes = self.config.max_line_bytes;

        let reader = tokio::spawn(
            run_reader(conn.stdout, max_line_bytes, self.event_tx.clone(), cancel.clone())
                .instrument(span.clone()),
        );

        let stdin = conn.stdin;
        let writer_cancel = cancel.clone();
        tokio::spawn(
            async move {
                if let Err(err) = run_writer(stdin, line_rx, writer_cancel).await {
                    warn!(%err, "worker writer stopped");
                }
            }
            .instrument(span.clone()),
        );

        tokio::spawn(
            run_stderr_drain(conn.stderr, max_line_bytes, cancel.clone()).instrument(span.clone()),
        );

        let monitor = tokio::spawn(
            monitor(
                conn.child,
                generation,
                reader,
                Arc::clone(&self.slot),
                self.event_tx.clone(),
                cancel.clone(),
                self.config.stop_grace,
            )
            .instrument(span),
        );

        *guard = Some(Attachment {
            generation,
            line_tx,
            cancel,
            monitor,
        });
        drop(guard);

        info!(generation, "supervisor: worker attached");
        self.notifier.info("Worker process started");
        Ok(true)
    }

    /// Shut the worker down if attached; idempotent.
    ///
    /// Returns `true` if a worker was stopped. Completes once the process has
    /// exited or been killed.
    pub async fn stop(&self) -> bool {
        let Some(attachment) = self.slot.lock().await.take() else {
            return false;
        };

        attachment.cancel.cancel();
        if let Err(err) = attachment.monitor.await {
            warn!(%err, "supervisor: exit monitor task failed");
        }
        info!(
            generation = attachment.generation,
            "supervisor: worker stopped"
        );
        true
    }

    /// Queue `command` for the worker's stdin.
    ///
    /// # Errors
    ///
    /// - [`AppError::NotRunning`] when no worker is attached.
    /// - [`AppError::Protocol`] when the command cannot be encoded.
    /// - [`AppError::Io`] when the worker's stdin has already closed.
    pub async fn write(&self, command: &WorkerCommand) -> Result<()> {
        let line_tx = {
            let guard = self.slot.lock().await;
            let Some(attachment) = guard.as_ref() else {
                return Err(AppError::NotRunning);
            };
            attachment.line_tx.clone()
        };
        let line = command.to_line()?;

        line_tx
            .send(line)
            .await
            .map_err(|_| AppError::Io("worker stdin closed".into()))?;
        debug!(command = command.name(), "supervisor: command queued");
        Ok(())
    }
}

/// Await the worker's end and reset the slot if it died on its own.
async fn monitor(
    child: tokio::process::Child,
    generation: u64,
    reader: JoinHandle<Result<()>>,
    slot: Slot,
    event_tx: mpsc::Sender<BridgeEvent>,
    cancel: CancellationToken,
    grace: Duration,
) {
    let ExitOutcome::Exited { code, reason } = wait_for_exit(child, cancel.clone(), grace).await
    else {
        debug!("supervisor: worker shut down on request");
        return;
    };

    // Let stdout drain so events the worker printed before dying stay
    // ahead of the exit notice.
    if tokio::time::timeout(READER_DRAIN, reader).await.is_err() {
        debug!("supervisor: reader still open after exit, cancelling");
    }
    cancel.cancel();

    {
        let mut guard = slot.lock().await;
        if guard.as_ref().is_some_and(|a| a.generation == generation) {
            *guard = None;
        }
    }

    info!(?code, %reason, "supervisor: worker exited");
    if event_tx
        .send(BridgeEvent::WorkerExited { code, reason })
        .await
        .is_err()
    {
        debug!("supervisor: event channel closed before exit could be delivered");
    }
}
