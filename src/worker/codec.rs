//! Newline framing for worker streams.
//!
//! [`LineFramer`] is the text-level framer: it accumulates chunks and yields
//! every complete line, keeping the unterminated tail for the next call.
//!
//! [`WorkerCodec`] adapts the framer to [`tokio_util::codec`] so it can drive
//! [`tokio_util::codec::FramedRead`] over a child's stdout. It also handles
//! UTF-8 sequences split across reads and enforces a maximum line length.
//!
//! # Usage
//!
//! ```rust,ignore
//! use tokio_util::codec::FramedRead;
//! use worker_bridge::worker::codec::WorkerCodec;
//!
//! let frames = FramedRead::new(child_stdout, WorkerCodec::new(1 << 20));
//! ```

use std::collections::VecDeque;

use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder};
use tracing::debug;

use crate::{AppError, Result};

/// Maximum line length accepted by default: 1 MiB.
pub const MAX_LINE_BYTES: usize = 1_048_576;

// ── Line framer ───────────────────────────────────────────────────────────────

/// Splits a text stream on `\n`, retaining the unterminated tail.
///
/// After every [`ingest`](Self::ingest) the pending buffer holds exactly the
/// text following the last newline seen so far. Concatenating every emitted
/// line (each followed by `\n`) with [`pending`](Self::pending) reproduces
/// the concatenation of all ingested chunks.
#[derive(Debug, Default)]
pub struct LineFramer {
    pending: String,
}

impl LineFramer {
    /// Create an empty framer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `chunk` and return every line it completed, in order.
    ///
    /// Lines are returned without their terminating `\n` and are not trimmed.
    pub fn ingest(&mut self, chunk: &str) -> Vec<String> {
        self.pending.push_str(chunk);

        let Some(last_newline) = self.pending.rfind('\n') else {
            return Vec::new();
        };

        let tail = self.pending.split_off(last_newline + 1);
        let mut complete = std::mem::replace(&mut self.pending, tail);
        complete.pop();

        complete.split('\n').map(str::to_owned).collect()
    }

    /// Text received after the last newline.
    #[must_use]
    pub fn pending(&self) -> &str {
        &self.pending
    }

    /// Remove and return the unterminated tail.
    pub fn take_pending(&mut self) -> String {
        std::mem::take(&mut self.pending)
    }
}

// ── Codec ─────────────────────────────────────────────────────────────────────

/// One decoded unit from the worker stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// A complete line, without its newline.
    Line(String),
    /// A line exceeding the length limit was dropped; carries its length in bytes.
    Oversized(usize),
}

/// Line codec for worker stdio.
///
/// Decoding never fails on content: over-long lines surface as
/// [`Frame::Oversized`] so a single bad line cannot end the stream, and
/// invalid UTF-8 is replaced with `U+FFFD`.
///
/// Encoding writes `item\n` and rejects items that embed a newline, since
/// the worker protocol has no escaping.
#[derive(Debug)]
pub struct WorkerCodec {
    framer: LineFramer,
    ready: VecDeque<Frame>,
    utf8_tail: Vec<u8>,
    max_line_bytes: usize,
    /// Set once an unterminated line outgrows the limit; everything up to
    /// and including its newline is dropped.
    is_discarding: bool,
}

impl WorkerCodec {
    /// Create a codec that drops lines longer than `max_line_bytes`.
    #[must_use]
    pub fn new(max_line_bytes: usize) -> Self {
        Self {
            framer: LineFramer::new(),
            ready: VecDeque::new(),
            utf8_tail: Vec::new(),
            max_line_bytes,
            is_discarding: false,
        }
    }

    fn queue_lines(&mut self, lines: Vec<String>) {
        for line in lines {
            if self.is_discarding {
                // Remainder of a line already reported as oversized.
                self.is_discarding = false;
                continue;
            }
            let frame = if line.len() > self.max_line_bytes {
                Frame::Oversized(line.len())
            } else {
                Frame::Line(line)
            };
            self.ready.push_back(frame);
        }
    }
}

impl Default for WorkerCodec {
    fn default() -> Self {
        Self::new(MAX_LINE_BYTES)
    }
}

impl Decoder for WorkerCodec {
    type Item = Frame;
    type Error = AppError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Frame>> {
        if let Some(frame) = self.ready.pop_front() {
            return Ok(Some(frame));
        }
        if src.is_empty() {
            return Ok(None);
        }

        let mut bytes = std::mem::take(&mut self.utf8_tail);
        bytes.extend_from_slice(&src.split());
        let (text, consumed) = decode_utf8_prefix(&bytes);
        self.utf8_tail = bytes[consumed..].to_vec();

        let lines = self.framer.ingest(&text);
        self.queue_lines(lines);

        if self.is_discarding {
            // Still inside the dropped line: no newline arrived yet.
            self.framer.take_pending();
        } else if self.framer.pending().len() > self.max_line_bytes {
            // An unterminated tail past the limit can never become a valid line.
            let dropped = self.framer.take_pending();
            self.ready.push_back(Frame::Oversized(dropped.len()));
            self.is_discarding = true;
        }

        Ok(self.ready.pop_front())
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Frame>> {
        if let Some(frame) = self.decode(src)? {
            return Ok(Some(frame));
        }
        self.is_discarding = false;
        let tail = self.framer.take_pending();
        if !tail.is_empty() {
            debug!(
                bytes = tail.len(),
                "worker codec: dropping unterminated tail at end of stream"
            );
        }
        Ok(None)
    }
}

impl Encoder<String> for WorkerCodec {
    type Error = AppError;

    fn encode(&mut self, item: String, dst: &mut BytesMut) -> Result<()> {
        if item.contains('\n') {
            return Err(AppError::Protocol(
                "outbound line must not contain a newline".into(),
            ));
        }
        dst.reserve(item.len() + 1);
        dst.extend_from_slice(item.as_bytes());
        dst.extend_from_slice(b"\n");
        Ok(())
    }
}

// ── Private helper ────────────────────────────────────────────────────────────

/// Decode as much of `bytes` as possible.
///
/// Returns the text and the number of bytes consumed. A truncated sequence at
/// the very end is left unconsumed so the next read can complete it; invalid
/// sequences elsewhere become `U+FFFD`.
fn decode_utf8_prefix(bytes: &[u8]) -> (String, usize) {
    let mut text = String::with_capacity(bytes.len());
    let mut offset = 0;

    while offset < bytes.len() {
        match std::str::from_utf8(&bytes[offset..]) {
            Ok(valid) => {
                text.push_str(valid);
                offset = bytes.len();
            }
            Err(err) => {
                let valid_end = offset + err.valid_up_to();
                // valid_up_to guarantees this slice is UTF-8.
                text.push_str(&String::from_utf8_lossy(&bytes[offset..valid_end]));
                match err.error_len() {
                    Some(len) => {
                        text.push(char::REPLACEMENT_CHARACTER);
                        offset = valid_end + len;
                    }
                    None => return (text, valid_end),
                }
            }
        }
    }

    (text, offset)
}
