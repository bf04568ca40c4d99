//! Panel transport over stdio.
//!
//! The headless binary exposes the panel protocol as NDJSON: one
//! [`PanelMessage`] object per line on stdin (requests) and stdout (pushes).

use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio_util::codec::{FramedRead, FramedWrite};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::{PanelMessage, PanelSink};
use crate::worker::codec::{Frame, WorkerCodec};
use crate::Result;

/// [`PanelSink`] that queues messages for [`run_panel_writer`].
#[derive(Debug, Clone)]
pub struct StdioPanel {
    tx: mpsc::UnboundedSender<PanelMessage>,
}

impl StdioPanel {
    /// Create the sink and the receiver to pass to [`run_panel_writer`].
    #[must_use]
    pub fn new() -> (Self, mpsc::UnboundedReceiver<PanelMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl PanelSink for StdioPanel {
    fn post(&self, message: PanelMessage) {
        if self.tx.send(message).is_err() {
            debug!("stdio panel: writer gone, dropping message");
        }
    }
}

/// Serialize queued panel messages as NDJSON onto `out`.
///
/// # Errors
///
/// Returns `AppError::Io` if `out` can no longer be written.
pub async fn run_panel_writer<W>(
    out: W,
    mut rx: mpsc::UnboundedReceiver<PanelMessage>,
    cancel: CancellationToken,
) -> Result<()>
where
    W: AsyncWrite + Unpin + Send,
{
    let mut framed = FramedWrite::new(out, WorkerCodec::default());

    loop {
        tokio::select! {
            biased;

            () = cancel.cancelled() => break,

            message = rx.recv() => {
                let Some(message) = message else { break };
                let line = serde_json::to_string(&message)?;
                framed.send(line).await?;
            }
        }
    }

    Ok(())
}

/// Read NDJSON panel requests from `input` and forward them to `tx`.
///
/// Lines that are not valid [`PanelMessage`]s are logged and skipped.
/// Returns on EOF, cancellation, or when `tx` is closed.
pub async fn run_panel_reader<R>(
    input: R,
    tx: mpsc::Sender<PanelMessage>,
    cancel: CancellationToken,
) where
    R: AsyncRead + Unpin + Send,
{
    let mut framed = FramedRead::new(input, WorkerCodec::default());

    loop {
        tokio::select! {
            biased;

            () = cancel.cancelled() => break,

            item = framed.next() => match item {
                Some(Ok(Frame::Line(line))) => {
                    if line.trim().is_empty() {
                        continue;
                    }
                    match serde_json::from_str::<PanelMessage>(&line) {
                        Ok(message) => {
                            if tx.send(message).await.is_err() {
                                break;
                            }
                        }
                        Err(err) => {
                            warn!(%err, raw_line = %line, "panel reader: invalid message, skipping");
                        }
                    }
                }
                Some(Ok(Frame::Oversized(len))) => {
                    warn!(bytes = len, "panel reader: line too long, skipping");
                }
                Some(Err(err)) => {
                    warn!(%err, "panel reader: IO error, stopping");
                    break;
                }
                None => {
                    debug!("panel reader: EOF");
                    break;
                }
            },
        }
    }
}
