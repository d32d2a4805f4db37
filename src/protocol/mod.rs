// src/protocol/mod.rs — Wire protocol: outbound commands and inbound frame classification
//
// Outbound frames are JSON objects tagged by `command`. Inbound frames are
// either raw text deltas or JSON control objects; the first character decides.

pub mod table;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::infra::errors::AuditChatError;
use crate::util::truncate_str;
pub use table::ResultTable;

/// First character of every control frame.
pub const CONTROL_FRAME_START: char = '{';

/// A command sent from the client to the assistant backend.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum Command {
    UserMessage {
        message: String,
    },
    UploadFile {
        #[serde(flatten)]
        pdf: PdfPayload,
    },
    Stop,
    Reset,
    DeleteMessage {
        message_index: usize,
        /// Stable identity of the deleted entry. Index-only backends ignore it.
        #[serde(skip_serializing_if = "Option::is_none")]
        message_id: Option<String>,
    },
    Regenerate,
}

impl Command {
    /// Short name used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            Command::UserMessage { .. } => "user_message",
            Command::UploadFile { .. } => "upload_file",
            Command::Stop => "stop",
            Command::Reset => "reset",
            Command::DeleteMessage { .. } => "delete_message",
            Command::Regenerate => "regenerate",
        }
    }
}

/// File contents in one of the two agreed transport-safe encodings.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum PdfPayload {
    #[serde(rename = "pdf_bytes")]
    Bytes(Vec<u8>),
    #[serde(rename = "pdf_base64")]
    Base64(String),
}

/// Serialize a command to its wire text.
pub fn encode(command: &Command) -> Result<String, AuditChatError> {
    Ok(serde_json::to_string(command)?)
}

/// A decoded control frame.
#[derive(Debug, Clone, PartialEq)]
pub enum ControlFrame {
    /// The current assistant turn finished streaming.
    Completed,
    /// The uploaded document was analysed.
    FileProcessed(ResultTable),
    /// The server cleared its conversation.
    ResetCompleted,
    /// Acknowledgment of a `delete_message` already applied locally.
    MessageDeleted,
    /// The turn failed; the text is surfaced verbatim.
    Error(String),
}

/// One inbound frame after classification.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Control(ControlFrame),
    Delta(String),
    /// Looked like a control frame but matched no known shape.
    Unrecognized,
}

#[derive(Deserialize)]
struct RawControl {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    results: Option<Value>,
    #[serde(default)]
    error: Option<Value>,
}

/// Classify a text frame. Anything that does not start with `{` is a text
/// delta and is never parsed.
pub fn classify(text: &str) -> Frame {
    if !text.starts_with(CONTROL_FRAME_START) {
        return Frame::Delta(text.to_string());
    }
    match decode_control(text) {
        Some(control) => Frame::Control(control),
        None => {
            tracing::debug!("unrecognized control frame: {}", truncate_str(text, 80));
            Frame::Unrecognized
        }
    }
}

/// Checks run in the order the backend's statuses have always been matched:
/// `completed`, `file_processed`, `error`, `reset_completed`, `message_deleted`.
fn decode_control(text: &str) -> Option<ControlFrame> {
    let raw: RawControl = serde_json::from_str(text).ok()?;
    let status = raw.status.as_deref();

    if status == Some("completed") {
        return Some(ControlFrame::Completed);
    }
    if status == Some("file_processed") {
        let rows = raw.results?;
        return ResultTable::from_rows(&rows).map(ControlFrame::FileProcessed);
    }
    if let Some(message) = raw.error.as_ref().and_then(error_text) {
        return Some(ControlFrame::Error(message));
    }
    match status {
        Some("reset_completed") => Some(ControlFrame::ResetCompleted),
        Some("message_deleted") => Some(ControlFrame::MessageDeleted),
        _ => None,
    }
}

/// Falsy error values (null, empty string, false) do not count as an error.
fn error_text(value: &Value) -> Option<String> {
    match value {
        Value::Null | Value::Bool(false) => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}
