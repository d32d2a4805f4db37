// src/cli/chat.rs — Interactive chat driver
//
// One loop owns the session. It waits on three sources at once: the
// connection, the optional turn deadline, and lines typed by the user. Each
// event runs to completion before the next one is taken.

use std::ops::ControlFlow;
use std::path::PathBuf;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::infra::config::{Config, UploadConfig};
use crate::protocol::Command;
use crate::session::{PendingUpload, Session};
use crate::transcript::{MessageBody, MessageStatus, Role};
use crate::transport::{Transport, WsTransport};
use crate::util::one_line;

/// A parsed input line.
#[derive(Debug, Clone, PartialEq)]
pub enum UserInput {
    Message(String),
    Upload(PathBuf),
    Stop,
    Reset,
    /// 1-based position as listed by `/history`.
    Delete(usize),
    Regenerate,
    History,
    Status,
    Help,
    Quit,
    Invalid(String),
}

/// Interpret one line typed by the user. Anything not starting with `/`
/// is a chat message, including an empty line.
pub fn parse_input(line: &str) -> UserInput {
    let trimmed = line.trim();
    if trimmed == "quit" || trimmed == "exit" {
        return UserInput::Quit;
    }
    if !trimmed.starts_with('/') {
        return UserInput::Message(trimmed.to_string());
    }

    let (cmd, arg) = match trimmed.split_once(' ') {
        Some((cmd, arg)) => (cmd, arg.trim()),
        None => (trimmed, ""),
    };

    match cmd {
        "/upload" if arg.is_empty() => UserInput::Invalid("Usage: /upload <path-to-pdf>".into()),
        "/upload" => UserInput::Upload(PathBuf::from(arg)),
        "/stop" => UserInput::Stop,
        "/reset" | "/new" => UserInput::Reset,
        "/delete" => match arg.parse::<usize>() {
            Ok(n) if n > 0 => UserInput::Delete(n),
            _ => UserInput::Invalid("Usage: /delete <n> (see /history)".into()),
        },
        "/regenerate" | "/retry" => UserInput::Regenerate,
        "/history" => UserInput::History,
        "/status" => UserInput::Status,
        "/help" => UserInput::Help,
        "/quit" | "/exit" => UserInput::Quit,
        other => UserInput::Invalid(format!("Unknown command: {other}. Type /help for commands.")),
    }
}

pub struct ChatDriver<T: Transport> {
    session: Session,
    transport: T,
    upload: UploadConfig,
    turn_timeout: Option<Duration>,
}

impl<T: Transport> ChatDriver<T> {
    pub fn new(session: Session, transport: T, config: &Config) -> Self {
        Self {
            session,
            transport,
            upload: config.upload.clone(),
            turn_timeout: config.session.turn_timeout_secs.map(Duration::from_secs),
        }
    }

    /// Override the turn timeout with a finer-grained duration.
    pub fn with_turn_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.turn_timeout = timeout;
        self
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Run until the user quits or input ends.
    pub async fn run(&mut self, mut input: mpsc::Receiver<String>) {
        let mut deadline: Option<Instant> = None;
        let mut inbound_live = true;

        loop {
            let sleep_until = deadline;
            let mut inbound_activity = false;

            tokio::select! {
                biased;

                event = self.transport.next_event(), if inbound_live => match event {
                    Some(event) => {
                        inbound_activity = true;
                        self.session.handle(event);
                    }
                    None => inbound_live = false,
                },

                _ = async {
                    match sleep_until {
                        Some(at) => tokio::time::sleep_until(at).await,
                        None => std::future::pending::<()>().await,
                    }
                } => {
                    if let Some(stop) = self.session.turn_timed_out() {
                        // The timeout warning already ended the turn.
                        if self.transport.is_open() {
                            self.dispatch(stop).await;
                        } else {
                            tracing::debug!("connection closed; not sending stop");
                        }
                    }
                },

                line = input.recv() => match line {
                    Some(line) => {
                        if self.apply(parse_input(&line)).await.is_break() {
                            break;
                        }
                    }
                    None => break,
                },
            }

            deadline = match self.turn_timeout {
                Some(timeout) if !self.session.state().is_idle() => {
                    if inbound_activity || deadline.is_none() {
                        Some(Instant::now() + timeout)
                    } else {
                        deadline
                    }
                }
                _ => None,
            };
        }
    }

    /// Apply one user action.
    pub async fn apply(&mut self, input: UserInput) -> ControlFlow<()> {
        let command = match input {
            UserInput::Message(text) => self.session.submit_user_message(&text).ok(),
            UserInput::Upload(path) => self.prepare_upload(path).await,
            UserInput::Stop => self.session.request_stop().ok(),
            UserInput::Reset => Some(self.session.request_reset()),
            UserInput::Delete(n) => n
                .checked_sub(1)
                .and_then(|index| self.session.request_delete_at(index).ok()),
            UserInput::Regenerate => self.session.request_regenerate().ok(),
            UserInput::History => {
                print_history(&self.session);
                None
            }
            UserInput::Status => {
                self.print_status();
                None
            }
            UserInput::Help => {
                print_help();
                None
            }
            UserInput::Quit => return ControlFlow::Break(()),
            UserInput::Invalid(message) => {
                eprintln!("  {message}");
                None
            }
        };

        if let Some(command) = command {
            self.dispatch(command).await;
        }
        ControlFlow::Continue(())
    }

    async fn prepare_upload(&mut self, path: PathBuf) -> Option<Command> {
        if self.session.ensure_idle().is_err() {
            return None;
        }
        match PendingUpload::from_path(&path, self.upload.max_bytes()).await {
            Ok(upload) => self.session.submit_file(upload).ok(),
            Err(e) => {
                eprintln!("[notice] {e}");
                None
            }
        }
    }

    /// Send a command; a failed send ends the turn through the transport-error path.
    async fn dispatch(&mut self, command: Command) {
        if let Err(e) = self.transport.send(&command).await {
            tracing::warn!("could not send {}: {e}", command.name());
            self.session.transport_error(&e.to_string());
        }
    }

    fn print_status(&self) {
        let session = &self.session;
        eprintln!("  Session: {}", session.id());
        eprintln!("  State: {}", session.state());
        eprintln!(
            "  Connection: {}",
            if session.is_connected() && self.transport.is_open() {
                "open"
            } else {
                "closed"
            }
        );
        eprintln!("  Messages: {}", session.transcript().len());
        if let Some(upload) = session.pending_upload() {
            eprintln!("  Processing: {} ({} bytes)", upload.name, upload.len());
        }
        match self.turn_timeout {
            Some(t) => eprintln!("  Turn timeout: {}s", t.as_secs()),
            None => eprintln!("  Turn timeout: none"),
        }
    }
}

fn print_history(session: &Session) {
    let transcript = session.transcript();
    if transcript.is_empty() {
        eprintln!("  No messages yet.");
        return;
    }
    for (i, message) in transcript.iter().enumerate() {
        let who = match message.role {
            Role::User => "you",
            Role::Assistant => "assistant",
        };
        let marker = match message.status {
            MessageStatus::Normal => "",
            MessageStatus::Warning => " [warning]",
            MessageStatus::Pending => " [streaming]",
        };
        let summary = match &message.body {
            MessageBody::Text(text) => one_line(text, 70),
            MessageBody::UploadPrompt => "(upload prompt)".into(),
            MessageBody::ResultTable(table) => format!("(result table, {} rows)", table.rows.len()),
        };
        eprintln!(
            "  {}. {} {}{}: {}",
            i + 1,
            message.created_at.format("%H:%M:%S"),
            who,
            marker,
            summary
        );
    }
}

fn print_help() {
    eprintln!("Slash commands:");
    eprintln!("  /upload <path>     Send a PDF for Beneish M-Score analysis");
    eprintln!("  /stop              Stop the running request");
    eprintln!("  /regenerate        Ask for a new version of the last reply");
    eprintln!("  /delete <n>        Delete message n (numbers from /history)");
    eprintln!("  /reset             Start a new conversation");
    eprintln!("  /history           List the messages in this conversation");
    eprintln!("  /status            Show session status");
    eprintln!("  /help              Show this help");
    eprintln!("  /quit, quit, exit  End session");
}

/// Read stdin on a plain thread; the runtime only sees finished lines.
fn spawn_stdin_reader() -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel(16);
    std::thread::spawn(move || {
        use std::io::BufRead;
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            if tx.blocking_send(line).is_err() {
                break;
            }
        }
    });
    rx
}

/// Connect and run the interactive session.
pub async fn run_chat(config: &Config) -> anyhow::Result<()> {
    let transport = WsTransport::connect(&config.server.url).await?;

    eprintln!(
        "auditchat v{} | {} | type /help for commands\n",
        env!("CARGO_PKG_VERSION"),
        transport.url(),
    );

    let session =
        Session::new(config.upload.encoding).with_renderer(super::render::terminal_renderer());
    let mut driver = ChatDriver::new(session, transport, config);
    driver.run(spawn_stdin_reader()).await;

    if let Err(e) = driver.transport_mut().close().await {
        tracing::debug!("close failed: {e}");
    }

    eprintln!(
        "\nSession ended: {} message(s)",
        driver.session().transcript().len()
    );
    Ok(())
}
