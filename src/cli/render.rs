// src/cli/render.rs — Terminal renderer for session events

use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use std::io::Write;

use crate::protocol::ResultTable;
use crate::session::{RenderEvent, RESULTS_HEADING};
use crate::transcript::{Message, MessageBody, MessageStatus, Role};

pub const ASSISTANT_PREFIX: &str = "assistant> ";
pub const UPLOAD_PROMPT_TEXT: &str = "Please upload your PDF file: /upload <path>";

/// Build a render callback that writes the conversation to stdout.
///
/// Logs go to stderr, so the transcript stays readable when piped.
pub fn terminal_renderer() -> impl Fn(RenderEvent) + Send + 'static {
    move |event| {
        if let Err(e) = write_event(&mut std::io::stdout().lock(), &event) {
            tracing::debug!("could not draw event: {e}");
        }
    }
}

/// Write one event to `out` and flush. Silent events write nothing.
pub fn write_event(out: &mut impl Write, event: &RenderEvent) -> std::io::Result<()> {
    let Some(text) = format_event(event) else {
        return Ok(());
    };
    out.write_all(text.as_bytes())?;
    out.flush()
}

/// Terminal text for one event. `None` when the event draws nothing.
pub fn format_event(event: &RenderEvent) -> Option<String> {
    match event {
        RenderEvent::MessageAppended { message, .. } => format_appended(message),
        RenderEvent::MessageMutated { delta, content, .. } => {
            if delta.is_empty() {
                None
            } else if content.len() == delta.len() {
                Some(format!("{ASSISTANT_PREFIX}{delta}"))
            } else {
                Some(delta.clone())
            }
        }
        RenderEvent::MessageCompleted { .. } => Some("\n".into()),
        RenderEvent::ProgressText(text) => Some(format!("[progress] {text}\n")),
        RenderEvent::ResultTable(table) => {
            Some(format!("{ASSISTANT_PREFIX}{RESULTS_HEADING}\n{}\n", render_table(table)))
        }
        RenderEvent::Notice(notice) => Some(format!("[notice] {notice}\n")),
        RenderEvent::Disconnected => Some(
            "[disconnected] The connection was closed. Restart auditchat to reconnect.\n".into(),
        ),
        RenderEvent::MessageDeleted { .. }
        | RenderEvent::TranscriptCleared
        | RenderEvent::ProgressVisibility(_)
        | RenderEvent::UploadPromptRequested
        | RenderEvent::UploadPromptDismissed
        | RenderEvent::TurnStateChanged(_) => None,
    }
}

fn format_appended(message: &Message) -> Option<String> {
    if message.role == Role::User {
        return None;
    }
    match (&message.body, message.status) {
        (MessageBody::Text(text), MessageStatus::Warning) => Some(format!("[warning] {text}\n")),
        (MessageBody::Text(text), MessageStatus::Pending) if text.is_empty() => None,
        (MessageBody::Text(text), MessageStatus::Pending) => Some(format!("{ASSISTANT_PREFIX}{text}")),
        (MessageBody::Text(text), MessageStatus::Normal) => {
            Some(format!("{ASSISTANT_PREFIX}{text}\n"))
        }
        (MessageBody::UploadPrompt, _) => Some(format!("{ASSISTANT_PREFIX}{UPLOAD_PROMPT_TEXT}\n")),
        // Drawn by the `ResultTable` event.
        (MessageBody::ResultTable(_), _) => None,
    }
}

/// Draw analysis results as a bordered table.
pub fn render_table(table: &ResultTable) -> String {
    if table.is_empty() {
        return "(no rows)".into();
    }
    let mut out = Table::new();
    out.load_preset(UTF8_FULL);
    out.set_content_arrangement(ContentArrangement::Dynamic);
    out.set_header(&table.columns);
    for row in &table.rows {
        out.add_row(row);
    }
    out.to_string()
}
