//! Worker wire protocol.
//!
//! # Inbound (worker stdout, one JSON object per line)
//!
//! | `action`                  | Payload         | Maps to                                  |
//! |---------------------------|-----------------|------------------------------------------|
//! | `insertOutput`            | `value: string` | [`WorkerEvent::InsertOutput`]            |
//! | `show_insert_code_prompt` | `code: string`  | [`WorkerEvent::ShowInsertCodePrompt`]    |
//! | `clear_editor`            | (none)          | [`WorkerEvent::ClearEditor`]             |
//! | `type_word`               | `word: string`  | [`WorkerEvent::TypeWord`]                |
//! | *(any other)*             | (none)          | [`WorkerEvent::Unrecognized`]            |
//!
//! # Outbound (worker stdin, one command per line)
//!
//! `startListening`, `processTextInput:<text>`, `stopSpeaking`.

use serde::Deserialize;
use serde_json::Value;

use crate::{AppError, Result};

// ── Inbound ───────────────────────────────────────────────────────────────────

/// Event decoded from one worker stdout line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerEvent {
    /// Append a message to the conversation and show it in the panel.
    InsertOutput {
        /// Message text, conventionally prefixed `USER:` or `ASSISTANT:`.
        value: String,
    },
    /// Offer to insert a code block into the active document.
    ShowInsertCodePrompt {
        /// Code to insert.
        code: String,
    },
    /// Clear the active document.
    ClearEditor,
    /// Type a single word at the cursor.
    TypeWord {
        /// Word to insert.
        word: String,
    },
    /// Well-formed message with an action this bridge does not know.
    Unrecognized {
        /// The unknown action tag.
        action: String,
    },
}

/// Top-level worker message envelope.
#[derive(Debug, Deserialize)]
struct Envelope {
    action: String,
    #[serde(flatten)]
    payload: serde_json::Map<String, Value>,
}

/// Decode one framed line into a [`WorkerEvent`].
///
/// # Return value
///
/// - `Ok(Some(event))`: a well-formed message, including unknown actions
///   as [`WorkerEvent::Unrecognized`].
/// - `Ok(None)`: the line is empty or whitespace.
///
/// # Errors
///
/// - [`AppError::Protocol`]`("malformed json: …")`: not a JSON object with
///   a string `action`.
/// - [`AppError::Protocol`]`("missing required field: …")`: known action
///   without its payload field.
pub fn decode_event(line: &str) -> Result<Option<WorkerEvent>> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }

    let mut envelope: Envelope = serde_json::from_str(line)
        .map_err(|e| AppError::Protocol(format!("malformed json: {e}")))?;

    let event = match envelope.action.as_str() {
        "insertOutput" => WorkerEvent::InsertOutput {
            value: take_string(&mut envelope, "value")?,
        },
        "show_insert_code_prompt" => WorkerEvent::ShowInsertCodePrompt {
            code: take_string(&mut envelope, "code")?,
        },
        "clear_editor" => WorkerEvent::ClearEditor,
        "type_word" => WorkerEvent::TypeWord {
            word: take_string(&mut envelope, "word")?,
        },
        _ => WorkerEvent::Unrecognized {
            action: envelope.action,
        },
    };

    Ok(Some(event))
}

fn take_string(envelope: &mut Envelope, field: &str) -> Result<String> {
    match envelope.payload.remove(field) {
        Some(Value::String(s)) => Ok(s),
        Some(other) => Err(AppError::Protocol(format!(
            "field `{field}` of `{}` must be a string, got {other}",
            envelope.action
        ))),
        None => Err(AppError::Protocol(format!(
            "missing required field: `{field}` in `{}`",
            envelope.action
        ))),
    }
}

// ── Outbound ──────────────────────────────────────────────────────────────────

/// Command written to the worker's stdin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerCommand {
    /// Begin capturing speech input.
    StartListening,
    /// Submit typed text.
    ProcessTextInput(String),
    /// Interrupt speech playback.
    StopSpeaking,
}

impl WorkerCommand {
    /// Render the command as a single protocol line, without the newline.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Protocol`] if a text payload contains a line
    /// break; the protocol does not escape them.
    pub fn to_line(&self) -> Result<String> {
        match self {
            Self::StartListening => Ok("startListening".to_owned()),
            Self::StopSpeaking => Ok("stopSpeaking".to_owned()),
            Self::ProcessTextInput(text) => {
                if text.contains(['\n', '\r']) {
                    return Err(AppError::Protocol(
                        "text input must be a single line".into(),
                    ));
                }
                Ok(format!("processTextInput:{text}"))
            }
        }
    }

    /// Short name for logging.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::StartListening => "startListening",
            Self::ProcessTextInput(_) => "processTextInput",
            Self::StopSpeaking => "stopSpeaking",
        }
    }
}
