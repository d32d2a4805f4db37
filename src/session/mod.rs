// src/session/mod.rs — Turn state machine driving the transcript
//
// One logical turn at a time. User actions are validated against the current
// `TurnState` and return the command to send; inbound events mutate the
// transcript and fire `RenderEvent`s. Nothing here touches the network.

pub mod upload;

use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::infra::config::UploadEncoding;
use crate::protocol::{Command, ControlFrame, Frame, ResultTable};
use crate::transcript::{Extension, Message, MessageId, MessageStatus, Role, Transcript};
use crate::transport::InboundEvent;
pub use upload::PendingUpload;

pub const UPLOAD_STARTED_TEXT: &str = "Starting data extraction...";
pub const RESULTS_HEADING: &str = "Here are the Beneish M-Score analysis results:";
pub const RESET_TEXT: &str = "The conversation has been reset.";
pub const CONNECTION_ERROR_TEXT: &str = "Sorry, a connection error occurred.";
pub const TIMEOUT_TEXT: &str = "No response from the server in time; the request was stopped.";

/// Warning text shown for a backend `{error}` frame.
pub fn error_text(detail: &str) -> String {
    format!("Sorry, an error occurred: {detail}")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TurnState {
    #[default]
    Idle,
    AwaitingTextResponse,
    AwaitingFileResult,
}

impl TurnState {
    pub fn is_idle(self) -> bool {
        self == TurnState::Idle
    }
}

impl std::fmt::Display for TurnState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TurnState::Idle => "idle",
            TurnState::AwaitingTextResponse => "awaiting response",
            TurnState::AwaitingFileResult => "processing file",
        };
        f.write_str(s)
    }
}

/// A user action refused before anything was sent.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("A request is still in progress, please wait.")]
    TurnInFlight,
    #[error("Please write a message.")]
    EmptyMessage,
    #[error("Please choose a PDF file.")]
    NoFile,
    #[error("Nothing is running.")]
    NothingToStop,
    #[error("There is no reply to regenerate.")]
    NothingToRegenerate,
    #[error("That message no longer exists.")]
    NoSuchMessage,
}

/// Instructions for whatever draws the conversation.
#[derive(Debug, Clone, PartialEq)]
pub enum RenderEvent {
    MessageAppended { index: usize, message: Message },
    /// Streamed text added to an existing entry; `content` is the full text so far.
    MessageMutated {
        index: usize,
        delta: String,
        content: String,
    },
    /// The entry stopped accepting deltas.
    MessageCompleted { index: usize },
    MessageDeleted { index: usize },
    TranscriptCleared,
    ProgressText(String),
    ProgressVisibility(bool),
    UploadPromptRequested,
    UploadPromptDismissed,
    ResultTable(ResultTable),
    TurnStateChanged(TurnState),
    /// Blocking notice for a rejected action.
    Notice(String),
    Disconnected,
}

pub struct Session {
    id: String,
    state: TurnState,
    transcript: Transcript,
    pending_upload: Option<PendingUpload>,
    upload_encoding: UploadEncoding,
    progress_visible: bool,
    connected: bool,
    on_render: Option<Box<dyn Fn(RenderEvent) + Send>>,
}

impl Session {
    pub fn new(upload_encoding: UploadEncoding) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            state: TurnState::Idle,
            transcript: Transcript::new(),
            pending_upload: None,
            upload_encoding,
            progress_visible: false,
            connected: true,
            on_render: None,
        }
    }

    /// Set the callback that receives every `RenderEvent`.
    pub fn with_renderer(mut self, cb: impl Fn(RenderEvent) + Send + 'static) -> Self {
        self.on_render = Some(Box::new(cb));
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn state(&self) -> TurnState {
        self.state
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn pending_upload(&self) -> Option<&PendingUpload> {
        self.pending_upload.as_ref()
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn progress_visible(&self) -> bool {
        self.progress_visible
    }

    fn emit(&self, event: RenderEvent) {
        if let Some(ref cb) = self.on_render {
            cb(event);
        }
    }

    // ── User actions ────────────────────────────────────────────────

    pub fn submit_user_message(&mut self, text: &str) -> Result<Command, Rejection> {
        self.ensure_idle()?;
        let text = text.trim();
        if text.is_empty() {
            return Err(self.reject(Rejection::EmptyMessage));
        }

        self.append(Message::user(text));
        self.append(Message::assistant_pending());
        self.set_state(TurnState::AwaitingTextResponse);
        Ok(Command::UserMessage {
            message: text.to_string(),
        })
    }

    pub fn submit_file(&mut self, upload: PendingUpload) -> Result<Command, Rejection> {
        self.ensure_idle()?;
        if upload.is_empty() {
            return Err(self.reject(Rejection::NoFile));
        }

        let command = upload.to_command(self.upload_encoding);
        info!("uploading {} ({} bytes)", upload.name, upload.len());
        self.pending_upload = Some(upload);
        self.set_progress_visible(true);
        self.emit(RenderEvent::ProgressText(UPLOAD_STARTED_TEXT.into()));
        self.set_state(TurnState::AwaitingFileResult);
        Ok(command)
    }

    /// Abandon the running turn without waiting for the server.
    pub fn request_stop(&mut self) -> Result<Command, Rejection> {
        if self.state.is_idle() {
            return Err(self.reject(Rejection::NothingToStop));
        }
        self.discard_empty_pending();
        self.end_turn();
        Ok(Command::Stop)
    }

    /// Ask the server to clear the conversation. The transcript is cleared
    /// when `reset_completed` arrives.
    pub fn request_reset(&mut self) -> Command {
        debug!("reset requested while {}", self.state);
        Command::Reset
    }

    /// Remove an entry locally and tell the server which position it had.
    pub fn request_delete(&mut self, id: MessageId) -> Result<Command, Rejection> {
        let Some((index, _)) = self.transcript.remove_by_id(id) else {
            return Err(self.reject(Rejection::NoSuchMessage));
        };
        self.emit(RenderEvent::MessageDeleted { index });
        Ok(Command::DeleteMessage {
            message_index: index,
            message_id: Some(id.to_string()),
        })
    }

    /// Delete whatever entry currently sits at `index`.
    pub fn request_delete_at(&mut self, index: usize) -> Result<Command, Rejection> {
        match self.transcript.get(index).map(|m| m.id) {
            Some(id) => self.request_delete(id),
            None => Err(self.reject(Rejection::NoSuchMessage)),
        }
    }

    /// Ask for a new version of the last reply. A trailing reply is replaced
    /// by a fresh pending entry so new deltas don't land on the old text.
    pub fn request_regenerate(&mut self) -> Result<Command, Rejection> {
        self.ensure_idle()?;
        let Some(index) = self.transcript.last_assistant_text_index() else {
            return Err(self.reject(Rejection::NothingToRegenerate));
        };

        if index + 1 == self.transcript.len() {
            self.transcript.remove(index);
            self.emit(RenderEvent::MessageDeleted { index });
        }
        self.append(Message::assistant_pending());
        self.set_state(TurnState::AwaitingTextResponse);
        Ok(Command::Regenerate)
    }

    // ── Inbound ─────────────────────────────────────────────────────

    /// Apply one inbound event to completion.
    pub fn handle(&mut self, event: InboundEvent) {
        match event {
            InboundEvent::Frame(Frame::Delta(delta)) => self.on_delta(&delta),
            InboundEvent::Frame(Frame::Control(control)) => self.on_control(control),
            InboundEvent::Frame(Frame::Unrecognized) => {}
            InboundEvent::Error(message) => self.transport_error(&message),
            InboundEvent::Closed => self.connection_closed(),
        }
    }

    fn on_delta(&mut self, delta: &str) {
        match self.state {
            TurnState::AwaitingTextResponse => {
                let extension = self.transcript.extend_last(Role::Assistant, delta);
                let Some(message) = self.transcript.get(extension.index()) else {
                    return;
                };
                let event = match extension {
                    Extension::Extended(index) => RenderEvent::MessageMutated {
                        index,
                        delta: delta.to_string(),
                        content: message.content().to_string(),
                    },
                    Extension::Appended(index) => RenderEvent::MessageAppended {
                        index,
                        message: message.clone(),
                    },
                };
                self.emit(event);
            }
            TurnState::AwaitingFileResult => {
                self.emit(RenderEvent::ProgressText(delta.to_string()));
            }
            TurnState::Idle => {
                debug!("dropping delta received while idle ({} bytes)", delta.len());
            }
        }
    }

    fn on_control(&mut self, control: ControlFrame) {
        match control {
            ControlFrame::Completed => self.on_completed(),
            ControlFrame::FileProcessed(table) => self.on_file_processed(table),
            ControlFrame::Error(detail) => self.on_error(&detail),
            ControlFrame::ResetCompleted => self.on_reset_completed(),
            ControlFrame::MessageDeleted => debug!("server acknowledged delete"),
        }
    }

    fn on_completed(&mut self) {
        if self.state != TurnState::AwaitingTextResponse {
            debug!("ignoring completed while {}", self.state);
            return;
        }
        self.finalize_pending();
        if self.transcript.assistant_count() == 1 {
            self.append(Message::upload_prompt());
            self.emit(RenderEvent::UploadPromptRequested);
        }
        self.set_state(TurnState::Idle);
    }

    fn on_file_processed(&mut self, table: ResultTable) {
        if self.state != TurnState::AwaitingFileResult {
            debug!("ignoring file_processed while {}", self.state);
            return;
        }
        if let Some(index) = self.transcript.upload_prompt_index() {
            self.transcript.remove(index);
            self.emit(RenderEvent::MessageDeleted { index });
            self.emit(RenderEvent::UploadPromptDismissed);
        }
        self.pending_upload = None;
        self.set_progress_visible(false);
        self.append(Message::result_table(table.clone()));
        self.emit(RenderEvent::ResultTable(table));
        self.set_state(TurnState::Idle);
    }

    fn on_error(&mut self, detail: &str) {
        if self.state.is_idle() {
            warn!("server error outside a turn: {detail}");
            return;
        }
        warn!("turn failed: {detail}");
        self.fail_turn(error_text(detail));
    }

    fn on_reset_completed(&mut self) {
        self.transcript.clear();
        self.emit(RenderEvent::TranscriptCleared);
        self.pending_upload = None;
        self.set_progress_visible(false);
        self.append(Message::assistant(RESET_TEXT));
        self.set_state(TurnState::Idle);
    }

    /// Connection-level failure: always surfaced, always ends the turn.
    pub fn transport_error(&mut self, reason: &str) {
        warn!("transport error: {reason}");
        self.fail_turn(CONNECTION_ERROR_TEXT.to_string());
    }

    fn connection_closed(&mut self) {
        if !self.connected {
            return;
        }
        info!("connection closed while {}", self.state);
        self.connected = false;
        self.emit(RenderEvent::Disconnected);
    }

    /// Give up on a turn that has gone quiet. Returns the `stop` to send.
    pub fn turn_timed_out(&mut self) -> Option<Command> {
        if self.state.is_idle() {
            return None;
        }
        warn!("turn timed out while {}", self.state);
        self.fail_turn(TIMEOUT_TEXT.to_string());
        Some(Command::Stop)
    }

    // ── Internals ───────────────────────────────────────────────────

    /// Refuse (with a notice) when a turn is already in flight.
    pub fn ensure_idle(&self) -> Result<(), Rejection> {
        if self.state.is_idle() {
            Ok(())
        } else {
            Err(self.reject(Rejection::TurnInFlight))
        }
    }

    fn reject(&self, rejection: Rejection) -> Rejection {
        debug!("rejected while {}: {rejection:?}", self.state);
        self.emit(RenderEvent::Notice(rejection.to_string()));
        rejection
    }

    fn append(&mut self, message: Message) -> usize {
        let index = self.transcript.append(message.clone());
        self.emit(RenderEvent::MessageAppended { index, message });
        index
    }

    fn set_state(&mut self, state: TurnState) {
        if self.state != state {
            self.state = state;
            self.emit(RenderEvent::TurnStateChanged(state));
        }
    }

    fn set_progress_visible(&mut self, visible: bool) {
        if self.progress_visible != visible {
            self.progress_visible = visible;
            self.emit(RenderEvent::ProgressVisibility(visible));
        }
    }

    /// Close the open entry, if any.
    fn finalize_pending(&mut self) {
        if let Some(index) = self.transcript.pending_index() {
            if let Some(message) = self.transcript.get_mut(index) {
                message.status = MessageStatus::Normal;
            }
            self.emit(RenderEvent::MessageCompleted { index });
        }
    }

    /// Drop the open entry if nothing was streamed into it.
    fn discard_empty_pending(&mut self) {
        let Some(index) = self.transcript.pending_index() else {
            return;
        };
        if self
            .transcript
            .get(index)
            .is_some_and(|m| m.content().is_empty())
        {
            self.transcript.remove(index);
            self.emit(RenderEvent::MessageDeleted { index });
        }
    }

    fn end_turn(&mut self) {
        self.finalize_pending();
        self.pending_upload = None;
        self.set_progress_visible(false);
        self.set_state(TurnState::Idle);
    }

    fn fail_turn(&mut self, warning: String) {
        self.discard_empty_pending();
        self.finalize_pending();
        self.append(Message::warning(warning));
        self.end_turn();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::classify;
    use crate::transcript::MessageBody;
    use std::sync::{Arc, Mutex};

    /// Session whose render events land in a Vec instead of a terminal.
    fn capturing_session() -> (Session, Arc<Mutex<Vec<RenderEvent>>>) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let log_clone = log.clone();
        let session = Session::new(UploadEncoding::ByteArray)
            .with_renderer(move |event| log_clone.lock().unwrap().push(event));
        (session, log)
    }

    fn frame(session: &mut Session, text: &str) {
        session.handle(InboundEvent::Frame(classify(text)));
    }

    fn pdf() -> PendingUpload {
        PendingUpload::new("report.pdf", b"%PDF-1.4".to_vec())
    }

    #[test]
    fn test_new_session_is_idle_and_empty() {
        let session = Session::new(UploadEncoding::ByteArray);
        assert_eq!(session.state(), TurnState::Idle);
        assert!(session.transcript().is_empty());
        assert!(session.is_connected());
        assert!(!session.id().is_empty());
    }

    #[test]
    fn test_submit_emits_append_events() {
        let (mut session, log) = capturing_session();
        session.submit_user_message("Halo").unwrap();

        let events = log.lock().unwrap();
        assert!(matches!(
            &events[0],
            RenderEvent::MessageAppended { index: 0, message } if message.content() == "Halo"
        ));
        assert!(matches!(
            &events[1],
            RenderEvent::MessageAppended { index: 1, message } if message.is_pending()
        ));
        assert_eq!(
            events[2],
            RenderEvent::TurnStateChanged(TurnState::AwaitingTextResponse)
        );
    }

    #[test]
    fn test_rejection_emits_notice() {
        let (mut session, log) = capturing_session();
        assert_eq!(
            session.submit_user_message("   "),
            Err(Rejection::EmptyMessage)
        );
        assert_eq!(
            log.lock().unwrap().as_slice(),
            &[RenderEvent::Notice("Please write a message.".into())]
        );
        assert!(session.transcript().is_empty());
    }

    #[test]
    fn test_delta_events_carry_full_content() {
        let (mut session, log) = capturing_session();
        session.submit_user_message("Halo").unwrap();
        frame(&mut session, "Sel");
        frame(&mut session, "amat");

        let events = log.lock().unwrap();
        assert_eq!(
            events.last(),
            Some(&RenderEvent::MessageMutated {
                index: 1,
                delta: "amat".into(),
                content: "Selamat".into(),
            })
        );
    }

    #[test]
    fn test_completed_marks_entry_normal() {
        let (mut session, log) = capturing_session();
        session.submit_user_message("Halo").unwrap();
        frame(&mut session, "Hi");
        frame(&mut session, r#"{"status":"completed"}"#);

        assert_eq!(
            session.transcript().get(1).unwrap().status,
            MessageStatus::Normal
        );
        assert!(log
            .lock()
            .unwrap()
            .contains(&RenderEvent::MessageCompleted { index: 1 }));
    }

    #[test]
    fn test_first_reply_requests_upload_prompt_once() {
        let (mut session, log) = capturing_session();
        session.submit_user_message("Halo").unwrap();
        frame(&mut session, r#"{"status":"completed"}"#);
        assert_eq!(
            session.transcript().upload_prompt_index(),
            Some(2),
            "prompt follows the first reply"
        );

        session.submit_user_message("Lagi").unwrap();
        frame(&mut session, r#"{"status":"completed"}"#);

        let prompts = log
            .lock()
            .unwrap()
            .iter()
            .filter(|e| **e == RenderEvent::UploadPromptRequested)
            .count();
        assert_eq!(prompts, 1);
    }

    #[test]
    fn test_upload_shows_progress() {
        let (mut session, log) = capturing_session();
        let cmd = session.submit_file(pdf()).unwrap();
        assert_eq!(cmd.name(), "upload_file");
        assert_eq!(session.state(), TurnState::AwaitingFileResult);
        assert!(session.progress_visible());
        assert_eq!(session.pending_upload().map(|u| u.name.as_str()), Some("report.pdf"));

        let events = log.lock().unwrap();
        assert!(events.contains(&RenderEvent::ProgressVisibility(true)));
        assert!(events.contains(&RenderEvent::ProgressText(UPLOAD_STARTED_TEXT.into())));
    }

    #[test]
    fn test_empty_upload_rejected() {
        let mut session = Session::new(UploadEncoding::ByteArray);
        assert_eq!(
            session.submit_file(PendingUpload::new("x.pdf", Vec::new())),
            Err(Rejection::NoFile)
        );
        assert_eq!(session.state(), TurnState::Idle);
    }

    #[test]
    fn test_base64_session_encoding() {
        let mut session = Session::new(UploadEncoding::Base64);
        let cmd = session.submit_file(pdf()).unwrap();
        let wire = crate::protocol::encode(&cmd).unwrap();
        assert!(wire.contains("\"pdf_base64\""));
        assert!(!wire.contains("\"pdf_bytes\""));
    }

    #[test]
    fn test_file_processed_clears_upload_and_progress() {
        let (mut session, log) = capturing_session();
        session.submit_file(pdf()).unwrap();
        frame(&mut session, "Extracting page 1");
        frame(
            &mut session,
            r#"{"status":"file_processed","results":[{"Year":2020,"M-Score":-2.5}]}"#,
        );

        assert_eq!(session.state(), TurnState::Idle);
        assert!(session.pending_upload().is_none());
        assert!(!session.progress_visible());
        assert!(matches!(
            session.transcript().last().map(|m| &m.body),
            Some(MessageBody::ResultTable(_))
        ));

        let events = log.lock().unwrap();
        assert!(events.contains(&RenderEvent::ProgressText("Extracting page 1".into())));
        assert!(events.contains(&RenderEvent::ProgressVisibility(false)));
    }

    #[test]
    fn test_error_replaces_empty_pending_entry() {
        let mut session = Session::new(UploadEncoding::ByteArray);
        session.submit_user_message("Halo").unwrap();
        frame(&mut session, r#"{"error":"model crashed"}"#);

        let t = session.transcript();
        assert_eq!(t.len(), 2);
        assert_eq!(t.get(1).unwrap().status, MessageStatus::Warning);
        assert_eq!(t.get(1).unwrap().content(), "Sorry, an error occurred: model crashed");
    }

    #[test]
    fn test_error_keeps_partial_reply() {
        let mut session = Session::new(UploadEncoding::ByteArray);
        session.submit_user_message("Halo").unwrap();
        frame(&mut session, "Sebagian");
        frame(&mut session, r#"{"error":"cut off"}"#);

        let t = session.transcript();
        assert_eq!(t.len(), 3);
        assert_eq!(t.get(1).unwrap().content(), "Sebagian");
        assert_eq!(t.get(1).unwrap().status, MessageStatus::Normal);
        assert_eq!(t.get(2).unwrap().status, MessageStatus::Warning);
    }

    #[test]
    fn test_error_while_idle_ignored() {
        let mut session = Session::new(UploadEncoding::ByteArray);
        frame(&mut session, r#"{"error":"stray"}"#);
        assert!(session.transcript().is_empty());
    }

    #[test]
    fn test_stop_discards_empty_pending() {
        let mut session = Session::new(UploadEncoding::ByteArray);
        session.submit_user_message("Halo").unwrap();
        assert_eq!(session.request_stop(), Ok(Command::Stop));
        assert_eq!(session.transcript().len(), 1);
    }

    #[test]
    fn test_stop_when_idle_rejected() {
        let mut session = Session::new(UploadEncoding::ByteArray);
        assert_eq!(session.request_stop(), Err(Rejection::NothingToStop));
    }

    #[test]
    fn test_stop_during_upload_drops_pending_upload() {
        let mut session = Session::new(UploadEncoding::ByteArray);
        session.submit_file(pdf()).unwrap();
        session.request_stop().unwrap();
        assert!(session.pending_upload().is_none());
        assert!(!session.progress_visible());
        // A late result for the stopped upload is ignored.
        frame(
            &mut session,
            r#"{"status":"file_processed","results":[{"Year":2020}]}"#,
        );
        assert!(session.transcript().is_empty());
    }

    #[test]
    fn test_reset_request_does_not_touch_transcript() {
        let mut session = Session::new(UploadEncoding::ByteArray);
        session.submit_user_message("Halo").unwrap();
        assert_eq!(session.request_reset(), Command::Reset);
        assert_eq!(session.transcript().len(), 2);
        assert_eq!(session.state(), TurnState::AwaitingTextResponse);
    }

    #[test]
    fn test_reset_completed_during_upload() {
        let mut session = Session::new(UploadEncoding::ByteArray);
        session.submit_file(pdf()).unwrap();
        frame(&mut session, r#"{"status":"reset_completed"}"#);
        assert_eq!(session.state(), TurnState::Idle);
        assert!(session.pending_upload().is_none());
        assert_eq!(session.transcript().len(), 1);
        assert_eq!(session.transcript().get(0).unwrap().content(), RESET_TEXT);
    }

    #[test]
    fn test_delete_sends_current_position_and_id() {
        let (mut session, log) = capturing_session();
        session.submit_user_message("satu").unwrap();
        frame(&mut session, "a");
        frame(&mut session, r#"{"status":"completed"}"#);
        let target = session.transcript().get(1).unwrap().id;

        let cmd = session.request_delete(target).unwrap();
        assert_eq!(
            cmd,
            Command::DeleteMessage {
                message_index: 1,
                message_id: Some(target.to_string()),
            }
        );
        assert!(log
            .lock()
            .unwrap()
            .contains(&RenderEvent::MessageDeleted { index: 1 }));
        assert_eq!(session.request_delete(target), Err(Rejection::NoSuchMessage));
    }

    #[test]
    fn test_delete_at_out_of_range() {
        let mut session = Session::new(UploadEncoding::ByteArray);
        assert_eq!(session.request_delete_at(0), Err(Rejection::NoSuchMessage));
    }

    #[test]
    fn test_delete_allowed_mid_turn() {
        let mut session = Session::new(UploadEncoding::ByteArray);
        session.submit_user_message("Halo").unwrap();
        assert!(session.request_delete_at(0).is_ok());
        assert_eq!(session.state(), TurnState::AwaitingTextResponse);
        frame(&mut session, "x");
        assert_eq!(session.transcript().last().unwrap().content(), "x");
    }

    #[test]
    fn test_regenerate_replaces_trailing_reply() {
        let mut session = Session::new(UploadEncoding::ByteArray);
        session.submit_user_message("Halo").unwrap();
        frame(&mut session, "versi lama");
        frame(&mut session, r#"{"status":"completed"}"#);
        // Drop the upload prompt so the reply is last.
        let prompt = session.transcript().upload_prompt_index().unwrap();
        session.request_delete_at(prompt).unwrap();

        assert_eq!(session.request_regenerate(), Ok(Command::Regenerate));
        assert_eq!(session.state(), TurnState::AwaitingTextResponse);
        frame(&mut session, "versi baru");
        frame(&mut session, r#"{"status":"completed"}"#);

        let t = session.transcript();
        assert_eq!(t.get(0).unwrap().content(), "Halo");
        assert_eq!(t.get(1).unwrap().content(), "versi baru");
        // Sole reply again, so the upload prompt comes back.
        assert_eq!(t.upload_prompt_index(), Some(2));
        assert_eq!(t.len(), 3);
    }

    #[test]
    fn test_regenerate_after_prompt_appends() {
        let mut session = Session::new(UploadEncoding::ByteArray);
        session.submit_user_message("Halo").unwrap();
        frame(&mut session, "jawaban");
        frame(&mut session, r#"{"status":"completed"}"#);

        session.request_regenerate().unwrap();
        frame(&mut session, "ulang");
        frame(&mut session, r#"{"status":"completed"}"#);

        let t = session.transcript();
        assert_eq!(t.len(), 4);
        assert_eq!(t.get(1).unwrap().content(), "jawaban");
        assert_eq!(t.get(2).unwrap().body, MessageBody::UploadPrompt);
        assert_eq!(t.get(3).unwrap().content(), "ulang");
    }

    #[test]
    fn test_regenerate_without_reply_rejected() {
        let mut session = Session::new(UploadEncoding::ByteArray);
        assert_eq!(
            session.request_regenerate(),
            Err(Rejection::NothingToRegenerate)
        );
    }

    #[test]
    fn test_transport_error_always_surfaces() {
        let mut session = Session::new(UploadEncoding::ByteArray);
        session.handle(InboundEvent::Error("reset by peer".into()));
        assert_eq!(session.state(), TurnState::Idle);
        assert_eq!(
            session.transcript().last().unwrap().content(),
            CONNECTION_ERROR_TEXT
        );
    }

    #[test]
    fn test_closed_reports_once_and_keeps_state() {
        let (mut session, log) = capturing_session();
        session.submit_user_message("Halo").unwrap();
        session.handle(InboundEvent::Closed);
        session.handle(InboundEvent::Closed);

        assert!(!session.is_connected());
        assert_eq!(session.state(), TurnState::AwaitingTextResponse);
        let disconnects = log
            .lock()
            .unwrap()
            .iter()
            .filter(|e| **e == RenderEvent::Disconnected)
            .count();
        assert_eq!(disconnects, 1);
    }

    #[test]
    fn test_timeout_stops_turn() {
        let mut session = Session::new(UploadEncoding::ByteArray);
        assert_eq!(session.turn_timed_out(), None);

        session.submit_user_message("Halo").unwrap();
        assert_eq!(session.turn_timed_out(), Some(Command::Stop));
        assert_eq!(session.state(), TurnState::Idle);
        assert_eq!(session.transcript().last().unwrap().content(), TIMEOUT_TEXT);
    }

    #[test]
    fn test_unrecognized_frame_is_noop() {
        let (mut session, log) = capturing_session();
        session.submit_user_message("Halo").unwrap();
        let before = log.lock().unwrap().len();
        frame(&mut session, r#"{"status":"thinking"}"#);
        assert_eq!(log.lock().unwrap().len(), before);
        assert_eq!(session.state(), TurnState::AwaitingTextResponse);
    }

    #[test]
    fn test_turn_state_display() {
        assert_eq!(TurnState::Idle.to_string(), "idle");
        assert_eq!(TurnState::AwaitingFileResult.to_string(), "processing file");
    }
}
