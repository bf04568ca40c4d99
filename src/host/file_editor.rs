//! File-backed [`Editor`] for the headless binary.
//!
//! The document is held in memory with a byte-offset cursor and written back
//! to disk after every edit, so an observer reading the file sees each paced
//! insertion as it lands.

use std::path::PathBuf;

use tokio::sync::Mutex;

use super::{BoxFuture, Editor};
use crate::{AppError, Result};

struct Document {
    path: PathBuf,
    text: String,
    cursor: usize,
}

/// Editor over an optional file; with no file there is no active document.
pub struct FileEditor {
    document: Mutex<Option<Document>>,
}

impl FileEditor {
    /// Open `path` as the active document, cursor at the end.
    ///
    /// A missing file is treated as an empty document.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Editor` if the file exists but cannot be read.
    pub async fn open(path: PathBuf) -> Result<Self> {
        let text = match tokio::fs::read_to_string(&path).await {
            Ok(text) => text,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => String::new(),
            Err(err) => {
                return Err(AppError::Editor(format!(
                    "failed to read {}: {err}",
                    path.display()
                )))
            }
        };
        let cursor = text.len();
        Ok(Self {
            document: Mutex::new(Some(Document { path, text, cursor })),
        })
    }

    /// Editor with no active document.
    #[must_use]
    pub fn detached() -> Self {
        Self {
            document: Mutex::new(None),
        }
    }

    /// Current document text, if a document is active.
    pub async fn text(&self) -> Option<String> {
        self.document.lock().await.as_ref().map(|d| d.text.clone())
    }
}

async fn flush(doc: &Document) -> Result<()> {
    tokio::fs::write(&doc.path, doc.text.as_bytes())
        .await
        .map_err(|err| AppError::Editor(format!("failed to write {}: {err}", doc.path.display())))
}

impl Editor for FileEditor {
    fn clear_document(&self) -> BoxFuture<'_, Result<bool>> {
        Box::pin(async move {
            let mut guard = self.document.lock().await;
            let Some(doc) = guard.as_mut() else {
                return Ok(false);
            };
            doc.text.clear();
            doc.cursor = 0;
            flush(doc).await?;
            Ok(true)
        })
    }

    fn insert_at_cursor(&self, text: String) -> BoxFuture<'_, Result<bool>> {
        Box::pin(async move {
            let mut guard = self.document.lock().await;
            let Some(doc) = guard.as_mut() else {
                return Ok(false);
            };
            doc.text.insert_str(doc.cursor, &text);
            doc.cursor += text.len();
            flush(doc).await?;
            Ok(true)
        })
    }
}
