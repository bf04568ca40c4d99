//! Worker writer task.
//!
//! Receives encoded command lines from a tokio [`mpsc`] channel and writes
//! each one, newline-terminated, to the worker's stdin through
//! [`FramedWrite`] backed by [`WorkerCodec`].

use futures_util::SinkExt;
use tokio::io::AsyncWrite;
use tokio::sync::mpsc;
use tokio_util::codec::FramedWrite;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::worker::codec::WorkerCodec;
use crate::{AppError, Result};

/// Writer task: drains `line_rx` into `stdin`.
///
/// The task exits cleanly when `cancel` fires or every sender is dropped.
///
/// # Errors
///
/// Returns [`AppError::Io`]`("write failed: …")` when the worker's stdin is
/// gone (e.g. broken pipe after the worker died). The caller logs it; the
/// host keeps running.
pub async fn run_writer<W>(
    stdin: W,
    mut line_rx: mpsc::Receiver<String>,
    cancel: CancellationToken,
) -> Result<()>
where
    W: AsyncWrite + Unpin + Send,
{
    let mut framed = FramedWrite::new(stdin, WorkerCodec::default());

    loop {
        tokio::select! {
            biased;

            () = cancel.cancelled() => {
                debug!("worker writer: cancellation received, stopping");
                break;
            }

            line = line_rx.recv() => {
                let Some(line) = line else {
                    debug!("worker writer: line channel closed, stopping");
                    break;
                };

                framed.send(line).await.map_err(|e| {
                    warn!(error = %e, "worker writer: write to stdin failed");
                    AppError::Io(format!("write failed: {e}"))
                })?;
            }
        }
    }

    Ok(())
}
