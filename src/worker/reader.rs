//! Worker reader tasks.
//!
//! [`run_reader`] frames the worker's stdout with [`WorkerCodec`], decodes
//! every line with [`decode_event`] and forwards the events through a tokio
//! [`mpsc`] channel in arrival order. A malformed line is logged and skipped;
//! it never ends the stream or affects the lines after it.
//!
//! [`run_stderr_drain`] re-emits the worker's stderr as diagnostics.

use futures_util::StreamExt;
use tokio::io::AsyncRead;
use tokio::sync::mpsc;
use tokio_util::codec::FramedRead;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::worker::codec::{Frame, WorkerCodec};
use crate::worker::protocol::decode_event;
use crate::worker::BridgeEvent;
use crate::Result;

/// Read newline-delimited JSON from `stdout` and emit [`BridgeEvent::Worker`]s.
///
/// Exits cleanly on EOF, on cancellation, or when `event_tx` is closed.
/// Termination is reported by the exit monitor, not by this task.
///
/// # Errors
///
/// Always returns `Ok(())`; I/O errors on the stream end the task and are
/// logged.
pub async fn run_reader<R>(
    stdout: R,
    max_line_bytes: usize,
    event_tx: mpsc::Sender<BridgeEvent>,
    cancel: CancellationToken,
) -> Result<()>
where
    R: AsyncRead + Unpin + Send,
{
    let mut framed = FramedRead::new(stdout, WorkerCodec::new(max_line_bytes));

    loop {
        tokio::select! {
            biased;

            () = cancel.cancelled() => {
                debug!("worker reader: cancellation received, stopping");
                break;
            }

            item = framed.next() => {
                match item {
                    None => {
                        debug!("worker reader: EOF detected");
                        break;
                    }

                    Some(Err(e)) => {
                        warn!(error = %e, "worker reader: IO error, stopping");
                        break;
                    }

                    Some(Ok(Frame::Oversized(len))) => {
                        warn!(bytes = len, "worker reader: line too long, skipping");
                    }

                    Some(Ok(Frame::Line(line))) => match decode_event(&line) {
                        Ok(Some(event)) => {
                            if event_tx.send(BridgeEvent::Worker(event)).await.is_err() {
                                debug!("worker reader: event_tx closed, stopping");
                                break;
                            }
                        }
                        Ok(None) => {}
                        Err(e) => {
                            warn!(
                                error = %e,
                                raw_line = %line,
                                "worker reader: parse error, skipping line"
                            );
                        }
                    },
                }
            }
        }
    }

    Ok(())
}

/// Forward each stderr line of the worker to the diagnostic log.
pub async fn run_stderr_drain<R>(stderr: R, max_line_bytes: usize, cancel: CancellationToken)
where
    R: AsyncRead + Unpin + Send,
{
    let mut framed = FramedRead::new(stderr, WorkerCodec::new(max_line_bytes));

    loop {
        tokio::select! {
            biased;

            () = cancel.cancelled() => break,

            item = framed.next() => match item {
                Some(Ok(Frame::Line(line))) => {
                    if !line.trim().is_empty() {
                        warn!(target: "worker::stderr", "{}", line.trim_end());
                    }
                }
                Some(Ok(Frame::Oversized(len))) => {
                    warn!(target: "worker::stderr", bytes = len, "oversized stderr line dropped");
                }
                Some(Err(e)) => {
                    debug!(error = %e, "worker stderr: IO error, stopping");
                    break;
                }
                None => break,
            },
        }
    }
}
