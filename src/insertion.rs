//! Code-insertion flow.
//!
//! When the worker proposes a code block the user is asked to confirm. On
//! "yes" the active document is cleared and the code is typed in one line at
//! a time, with a fixed pause between lines. The sequence is not
//! atomic: an observer sees the document fill in progressively.
//!
//! At most one insertion runs at a time. Starting a new one cancels the
//! previous one between lines, so two pacing sequences never interleave.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::host::{Editor, Notifier};
use crate::Result;

/// Question shown before touching the document.
pub const INSERT_PROMPT: &str = "Code detected. Do you want to insert it into the editor?";

/// How an insertion request ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertionOutcome {
    /// Every line was inserted.
    Completed {
        /// Number of lines inserted.
        lines: usize,
    },
    /// The user answered "no".
    Declined,
    /// There was no active document.
    NoEditor,
    /// A newer request or shutdown stopped this one.
    Cancelled {
        /// Lines inserted before cancellation.
        inserted: usize,
    },
}

/// Confirms and performs paced code insertion.
pub struct CodeInserter {
    editor: Arc<dyn Editor>,
    notifier: Arc<dyn Notifier>,
    pacing: Duration,
    in_flight: Mutex<InFlight>,
}

/// Cancellation bookkeeping shared by `offer`, `begin` and `cancel`.
#[derive(Default)]
struct InFlight {
    /// Bumped by every [`CodeInserter::cancel`]; an offer whose dialog
    /// straddles a bump never touches the document.
    epoch: u64,
    token: Option<CancellationToken>,
}

impl CodeInserter {
    /// Create an inserter pausing `pacing` between lines.
    #[must_use]
    pub fn new(editor: Arc<dyn Editor>, notifier: Arc<dyn Notifier>, pacing: Duration) -> Self {
        Self {
            editor,
            notifier,
            pacing,
            in_flight: Mutex::new(InFlight::default()),
        }
    }

    /// Ask the user about `code` and insert it on "yes".
    ///
    /// Runs in the background so the caller keeps processing events while
    /// the dialog is open; await the handle to observe the outcome. A
    /// [`cancel`](Self::cancel) issued while the dialog is open ends the
    /// offer as [`InsertionOutcome::Cancelled`] without editing.
    pub fn offer(self: &Arc<Self>, code: String) -> JoinHandle<Result<InsertionOutcome>> {
        let this = Arc::clone(self);
        tokio::spawn(async move {
            let Some(epoch) = this.epoch() else {
                return Ok(InsertionOutcome::Cancelled { inserted: 0 });
            };
            if !this.notifier.confirm(INSERT_PROMPT.to_owned()).await {
                debug!("code insertion declined");
                return Ok(InsertionOutcome::Declined);
            }
            let Some(cancel) = this.begin(epoch) else {
                debug!("code insertion cancelled while awaiting confirmation");
                return Ok(InsertionOutcome::Cancelled { inserted: 0 });
            };
            this.run(code, cancel).await
        })
    }

    /// Stop the in-flight insertion before its next line, and abandon every
    /// offer still waiting on its confirmation dialog.
    pub fn cancel(&self) {
        if let Ok(mut guard) = self.in_flight.lock() {
            guard.epoch += 1;
            if let Some(token) = guard.token.take() {
                token.cancel();
            }
        }
    }

    fn epoch(&self) -> Option<u64> {
        self.in_flight.lock().ok().map(|guard| guard.epoch)
    }

    /// Cancel the previous insertion and register a token for a new one,
    /// unless [`cancel`](Self::cancel) ran since `epoch` was read.
    fn begin(&self, epoch: u64) -> Option<CancellationToken> {
        let mut guard = self.in_flight.lock().ok()?;
        if guard.epoch != epoch {
            return None;
        }
        let token = CancellationToken::new();
        if let Some(previous) = guard.token.replace(token.clone()) {
            previous.cancel();
        }
        Some(token)
    }

    async fn run(&self, code: String, cancel: CancellationToken) -> Result<InsertionOutcome> {
        let result = type_code(self.editor.as_ref(), &code, self.pacing, &cancel).await;
        match &result {
            Ok(outcome) => info!(?outcome, "code insertion finished"),
            Err(err) => {
                warn!(%err, "code insertion failed");
                self.notifier.error(&format!("Failed to insert code: {err}"));
            }
        }
        result
    }
}

/// Clear the document, then insert `code` line by line at the cursor.
///
/// Each line is inserted with a trailing `\n`; consecutive insertions are
/// separated by `pacing`. Cancellation is observed before every line.
///
/// # Errors
///
/// Returns `AppError::Editor` if an edit fails.
pub async fn type_code(
    editor: &dyn Editor,
    code: &str,
    pacing: Duration,
    cancel: &CancellationToken,
) -> Result<InsertionOutcome> {
    if cancel.is_cancelled() {
        return Ok(InsertionOutcome::Cancelled { inserted: 0 });
    }
    if !editor.clear_document().await? {
        return Ok(InsertionOutcome::NoEditor);
    }

    let mut inserted = 0;
    for line in code.split('\n') {
        if inserted > 0 {
            tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    return Ok(InsertionOutcome::Cancelled { inserted });
                }
                () = tokio::time::sleep(pacing) => {}
            }
        }
        if cancel.is_cancelled() {
            return Ok(InsertionOutcome::Cancelled { inserted });
        }
        if !editor.insert_at_cursor(format!("{line}\n")).await? {
            return Ok(InsertionOutcome::NoEditor);
        }
        inserted += 1;
    }

    Ok(InsertionOutcome::Completed { lines: inserted })
}
