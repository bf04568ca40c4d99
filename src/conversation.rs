//! Durable conversation log.
//!
//! An ordered, append-only sequence of entries mirrored into a
//! [`StateStore`] under a single key. Entries are never edited; the only
//! destructive operation is a whole-log [`clear`](ConversationLog::clear).
//!
//! The in-memory mirror and the store write are guarded by one async mutex,
//! so store writes are issued in append order even though each completes
//! asynchronously.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::debug;

use crate::host::{PanelMessage, PanelSink};
use crate::persistence::StateStore;
use crate::Result;

/// Who produced an entry, from its text prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryRole {
    /// Entry starts with `USER:`.
    User,
    /// Entry starts with `ASSISTANT:`.
    Assistant,
    /// Any other entry (status lines from the worker).
    Other,
}

impl EntryRole {
    /// Classify `entry` by its prefix.
    #[must_use]
    pub fn of(entry: &str) -> Self {
        if entry.starts_with("USER:") {
            Self::User
        } else if entry.starts_with("ASSISTANT:") {
            Self::Assistant
        } else {
            Self::Other
        }
    }
}

/// Push one entry to the panel.
///
/// Live events and replay both go through here, so a reopened panel sees
/// exactly what it would have seen live.
pub fn push_entry(panel: &dyn PanelSink, entry: &str) {
    panel.post(PanelMessage::InsertOutput {
        value: entry.to_owned(),
    });
}

/// Ordered conversation history backed by a [`StateStore`].
pub struct ConversationLog {
    key: String,
    store: Arc<dyn StateStore>,
    entries: Mutex<Vec<String>>,
}

impl ConversationLog {
    /// Load the persisted conversation stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the store cannot be read.
    pub async fn open(store: Arc<dyn StateStore>, key: impl Into<String>) -> Result<Self> {
        let key = key.into();
        let entries = store.get(&key).await?;
        debug!(key = %key, count = entries.len(), "conversation loaded");
        Ok(Self {
            key,
            store,
            entries: Mutex::new(entries),
        })
    }

    /// Append `entry` and persist the full sequence.
    ///
    /// The entry is kept in memory even if the store write fails.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the store write fails.
    pub async fn append(&self, entry: String) -> Result<()> {
        let mut entries = self.entries.lock().await;
        debug!(role = ?EntryRole::of(&entry), "conversation entry appended");
        entries.push(entry);
        self.store.set(&self.key, entries.clone()).await
    }

    /// Remove every entry and persist an empty sequence.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the store write fails.
    pub async fn clear(&self) -> Result<()> {
        let mut entries = self.entries.lock().await;
        entries.clear();
        self.store.set(&self.key, Vec::new()).await
    }

    /// Snapshot of all entries in append order.
    pub async fn all(&self) -> Vec<String> {
        self.entries.lock().await.clone()
    }

    /// Push every entry to `panel` in order.
    pub async fn replay(&self, panel: &dyn PanelSink) {
        let entries = self.entries.lock().await;
        for entry in entries.iter() {
            push_entry(panel, entry);
        }
    }
}
