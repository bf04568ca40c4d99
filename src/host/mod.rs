//! Host-side collaborators.
//!
//! The bridge core never talks to a concrete UI or editor. The panel, the
//! host's notification/confirmation surface and the editor are reached
//! through the traits below, so the same core runs inside the headless
//! binary (`stdio`, `file_editor`, `log_notifier`) or against test fakes.

pub mod file_editor;
pub mod log_notifier;
pub mod stdio;

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::Result;

/// Boxed, sendable future returned by collaborator traits.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Message exchanged with the panel.
///
/// The vocabulary is shared by both directions: the panel sends requests,
/// the core pushes `insertOutput` and `clearOutput` back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum PanelMessage {
    /// Begin speech capture in the worker.
    StartListening,
    /// Submit typed text to the worker.
    SubmitText {
        /// Text typed by the user.
        value: String,
    },
    /// Interrupt speech playback in the worker.
    StopSpeaking,
    /// A conversation entry to display (and, from the panel, to record).
    InsertOutput {
        /// Entry text.
        value: String,
    },
    /// Clear the conversation.
    ClearOutput,
}

/// Destination for messages pushed to the panel.
pub trait PanelSink: Send + Sync {
    /// Deliver `message` to the panel. Delivery is fire-and-forget.
    fn post(&self, message: PanelMessage);
}

/// User-visible notifications and yes/no confirmation.
pub trait Notifier: Send + Sync {
    /// Show an informational notification.
    fn info(&self, message: &str);

    /// Show an error notification.
    fn error(&self, message: &str);

    /// Ask the user a yes/no question; resolves to `true` on "yes".
    fn confirm(&self, prompt: String) -> BoxFuture<'_, bool>;
}

/// The host's active text document.
///
/// Both operations resolve to `Ok(false)` when no document is active, which
/// callers treat as a silent no-op.
pub trait Editor: Send + Sync {
    /// Delete the whole content of the active document.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Editor`](crate::AppError::Editor) if the edit fails.
    fn clear_document(&self) -> BoxFuture<'_, Result<bool>>;

    /// Insert `text` at the cursor and move the cursor past it.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Editor`](crate::AppError::Editor) if the edit fails.
    fn insert_at_cursor(&self, text: String) -> BoxFuture<'_, Result<bool>>;
}

/// Bundle of collaborators handed to the router.
#[derive(Clone)]
pub struct Host {
    /// Panel push target.
    pub panel: Arc<dyn PanelSink>,
    /// Notification and confirmation surface.
    pub notifier: Arc<dyn Notifier>,
    /// Active document.
    pub editor: Arc<dyn Editor>,
}
