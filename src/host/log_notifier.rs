//! [`Notifier`] that reports through the diagnostic log.
//!
//! Used by the headless binary, where there is no dialog to show. The
//! confirmation answer is fixed at construction (`--assume-yes`).

use tracing::{error, info};

use super::{BoxFuture, Notifier};

/// Notifier writing to `tracing` with a fixed confirmation answer.
#[derive(Debug, Clone, Copy)]
pub struct LogNotifier {
    assume_yes: bool,
}

impl LogNotifier {
    /// Create a notifier that answers every confirmation with `assume_yes`.
    #[must_use]
    pub fn new(assume_yes: bool) -> Self {
        Self { assume_yes }
    }
}

impl Notifier for LogNotifier {
    fn info(&self, message: &str) {
        info!(target: "notify", "{message}");
    }

    fn error(&self, message: &str) {
        error!(target: "notify", "{message}");
    }

    fn confirm(&self, prompt: String) -> BoxFuture<'_, bool> {
        Box::pin(async move {
            info!(target: "notify", answer = self.assume_yes, "{prompt}");
            self.assume_yes
        })
    }
}
