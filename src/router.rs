//! Bidirectional message routing.
//!
//! # Inbound (worker → panel / editor)
//!
//! | Event                          | Action                                        |
//! |--------------------------------|-----------------------------------------------|
//! | `insertOutput{value}`          | append to conversation, push to panel         |
//! | `show_insert_code_prompt{code}`| confirmation, then paced insertion            |
//! | `clear_editor` / `type_word`   | editor edit when `honor_worker_edits` is set  |
//! | unrecognized action            | ignored, logged at `DEBUG`                    |
//! | worker exit (non-zero/signal)  | error notification                            |
//!
//! # Outbound (panel → worker / core)
//!
//! | Request             | Action                                                 |
//! |---------------------|--------------------------------------------------------|
//! | `startListening`    | ensure worker started, write `startListening`, notify  |
//! | `submitText{value}` | write `processTextInput:<value>`                       |
//! | `stopSpeaking`      | write `stopSpeaking`, notify                           |
//! | `clearOutput`       | clear conversation, tell panel to clear                |
//! | `insertOutput{value}` | append to conversation, push to panel                |

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::conversation::{push_entry, ConversationLog};
use crate::host::{BoxFuture, Host, PanelMessage};
use crate::insertion::{CodeInserter, InsertionOutcome};
use crate::supervisor::Supervisor;
use crate::worker::protocol::{WorkerCommand, WorkerEvent};
use crate::worker::BridgeEvent;
use crate::{AppError, Result};

/// Router tuning.
#[derive(Debug, Clone, Copy)]
pub struct RouterOptions {
    /// Delay between paced line insertions.
    pub pacing: Duration,
    /// Apply `clear_editor` / `type_word` worker actions.
    pub honor_worker_edits: bool,
}

impl Default for RouterOptions {
    fn default() -> Self {
        Self {
            pacing: Duration::from_millis(150),
            honor_worker_edits: false,
        }
    }
}

/// Routes worker events and panel requests.
pub struct Router {
    supervisor: Arc<Supervisor>,
    log: Arc<ConversationLog>,
    host: Host,
    inserter: Arc<CodeInserter>,
    honor_worker_edits: bool,
}

impl Router {
    /// Create a router over the given supervisor, log and host collaborators.
    #[must_use]
    pub fn new(
        supervisor: Arc<Supervisor>,
        log: Arc<ConversationLog>,
        host: Host,
        options: RouterOptions,
    ) -> Self {
        let inserter = Arc::new(CodeInserter::new(
            Arc::clone(&host.editor),
            Arc::clone(&host.notifier),
            options.pacing,
        ));
        Self {
            supervisor,
            log,
            host,
            inserter,
            honor_worker_edits: options.honor_worker_edits,
        }
    }

    /// Replay the conversation into a freshly (re)attached panel.
    pub async fn attach_panel(&self) {
        self.log.replay(self.host.panel.as_ref()).await;
    }

    /// Handle one request from the panel.
    pub async fn handle_panel(&self, message: PanelMessage) {
        match message {
            PanelMessage::StartListening => {
                if self.supervisor.start().await.is_err() {
                    // Spawn failure was reported by the supervisor.
                    return;
                }
                if self.send(&WorkerCommand::StartListening).await {
                    self.host.notifier.info("Started listening...");
                }
            }
            PanelMessage::SubmitText { value } => {
                self.send(&WorkerCommand::ProcessTextInput(value)).await;
            }
            PanelMessage::StopSpeaking => {
                if self.send(&WorkerCommand::StopSpeaking).await {
                    self.host.notifier.info("Stopped speaking...");
                }
            }
            PanelMessage::ClearOutput => self.clear_output().await,
            PanelMessage::InsertOutput { value } => self.record_output(value).await,
        }
    }

    /// Handle one event from the worker side.
    ///
    /// Returns the insertion task when the event started a code-insertion
    /// flow.
    pub async fn handle_event(
        &self,
        event: BridgeEvent,
    ) -> Option<JoinHandle<Result<InsertionOutcome>>> {
        let abnormal_exit = event.is_abnormal_exit();
        match event {
            BridgeEvent::Worker(WorkerEvent::InsertOutput { value }) => {
                self.record_output(value).await;
            }
            BridgeEvent::Worker(WorkerEvent::ShowInsertCodePrompt { code }) => {
                return Some(self.inserter.offer(code));
            }
            BridgeEvent::Worker(WorkerEvent::ClearEditor) => {
                if self.honor_worker_edits {
                    self.edit(self.host.editor.clear_document()).await;
                } else {
                    debug!("router: ignoring clear_editor from worker");
                }
            }
            BridgeEvent::Worker(WorkerEvent::TypeWord { word }) => {
                if self.honor_worker_edits {
                    self.edit(self.host.editor.insert_at_cursor(format!("{word} ")))
                        .await;
                } else {
                    debug!("router: ignoring type_word from worker");
                }
            }
            BridgeEvent::Worker(WorkerEvent::Unrecognized { action }) => {
                debug!(%action, "router: ignoring unrecognized worker action");
            }
            BridgeEvent::WorkerExited { code, reason } => {
                if abnormal_exit {
                    let shown = code.map_or_else(|| "signal".to_owned(), |c| c.to_string());
                    self.host
                        .notifier
                        .error(&format!("Worker process exited with code {shown}"));
                } else {
                    info!(%reason, "router: worker exited normally");
                }
            }
        }
        None
    }

    /// Consume bridge events in arrival order until cancelled or closed.
    pub async fn run(
        self: Arc<Self>,
        mut events: mpsc::Receiver<BridgeEvent>,
        cancel: CancellationToken,
    ) {
        loop {
            tokio::select! {
                biased;

                () = cancel.cancelled() => {
                    debug!("router: cancellation received, stopping");
                    break;
                }

                event = events.recv() => {
                    let Some(event) = event else {
                        debug!("router: event channel closed, stopping");
                        break;
                    };
                    // Insertion tasks run detached; their outcome is logged by the inserter.
                    drop(self.handle_event(event).await);
                }
            }
        }
    }

    /// Abort any paced insertion and stop the worker.
    pub async fn shutdown(&self) {
        self.inserter.cancel();
        self.supervisor.stop().await;
    }

    /// Write `command`, reporting failures to the user. Returns `true` on success.
    async fn send(&self, command: &WorkerCommand) -> bool {
        match self.supervisor.write(command).await {
            Ok(()) => true,
            Err(AppError::NotRunning) => {
                warn!(command = command.name(), "router: worker not running, command dropped");
                self.host.notifier.error("Worker process is not running");
                false
            }
            Err(err) => {
                warn!(command = command.name(), %err, "router: command failed");
                self.host
                    .notifier
                    .error(&format!("Failed to send {}: {err}", command.name()));
                false
            }
        }
    }

    async fn record_output(&self, value: String) {
        if let Err(err) = self.log.append(value.clone()).await {
            warn!(%err, "router: failed to persist conversation entry");
            self.host
                .notifier
                .error(&format!("Failed to save conversation: {err}"));
        }
        push_entry(self.host.panel.as_ref(), &value);
    }

    async fn clear_output(&self) {
        if let Err(err) = self.log.clear().await {
            warn!(%err, "router: failed to clear persisted conversation");
            self.host
                .notifier
                .error(&format!("Failed to clear conversation: {err}"));
        }
        self.host.panel.post(PanelMessage::ClearOutput);
    }

    async fn edit(&self, op: BoxFuture<'_, Result<bool>>) {
        match op.await {
            Ok(true) => {}
            Ok(false) => debug!("router: no active document, edit skipped"),
            Err(err) => {
                warn!(%err, "router: editor action failed");
                self.host.notifier.error(&format!("Editor action failed: {err}"));
            }
        }
    }
}
