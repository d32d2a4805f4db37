// src/transcript/mod.rs — Ordered conversation transcript
//
// Insertion order is display order. Positions shift down on removal; every
// entry also carries a `MessageId` that never changes.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::protocol::ResultTable;

/// Stable identity of a transcript entry, assigned at creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MessageId(Uuid);

impl MessageId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageStatus {
    Normal,
    Warning,
    /// Still accepting streamed deltas.
    Pending,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MessageBody {
    Text(String),
    /// Placeholder entry asking the user for a PDF.
    UploadPrompt,
    ResultTable(ResultTable),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub id: MessageId,
    pub role: Role,
    pub status: MessageStatus,
    pub body: MessageBody,
    pub created_at: DateTime<Utc>,
}

impl Message {
    fn new(role: Role, status: MessageStatus, body: MessageBody) -> Self {
        Self {
            id: MessageId::new(),
            role,
            status,
            body,
            created_at: Utc::now(),
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Role::User, MessageStatus::Normal, MessageBody::Text(text.into()))
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(
            Role::Assistant,
            MessageStatus::Normal,
            MessageBody::Text(text.into()),
        )
    }

    /// Empty assistant entry that streamed deltas will fill.
    pub fn assistant_pending() -> Self {
        Self::new(
            Role::Assistant,
            MessageStatus::Pending,
            MessageBody::Text(String::new()),
        )
    }

    pub fn warning(text: impl Into<String>) -> Self {
        Self::new(
            Role::Assistant,
            MessageStatus::Warning,
            MessageBody::Text(text.into()),
        )
    }

    pub fn upload_prompt() -> Self {
        Self::new(Role::Assistant, MessageStatus::Normal, MessageBody::UploadPrompt)
    }

    pub fn result_table(table: ResultTable) -> Self {
        Self::new(
            Role::Assistant,
            MessageStatus::Normal,
            MessageBody::ResultTable(table),
        )
    }

    /// Text content; empty for non-text bodies.
    pub fn content(&self) -> &str {
        match &self.body {
            MessageBody::Text(text) => text,
            _ => "",
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == MessageStatus::Pending
    }

    pub fn is_text(&self) -> bool {
        matches!(self.body, MessageBody::Text(_))
    }
}

/// What `extend_last` did with a delta.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Extension {
    /// Delta was appended to the existing entry at this index.
    Extended(usize),
    /// No matching open entry; a new one was created at this index.
    Appended(usize),
}

impl Extension {
    pub fn index(self) -> usize {
        match self {
            Extension::Extended(i) | Extension::Appended(i) => i,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Transcript {
    entries: Vec<Message>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry and return its index.
    pub fn append(&mut self, message: Message) -> usize {
        self.entries.push(message);
        self.entries.len() - 1
    }

    /// Append `delta` to the last entry when it is the open (pending) text
    /// entry from `role`; otherwise start a new pending entry holding the delta.
    /// Finished entries never change.
    pub fn extend_last(&mut self, role: Role, delta: &str) -> Extension {
        if let Some(last) = self.entries.last_mut() {
            if last.role == role && last.is_pending() {
                if let MessageBody::Text(text) = &mut last.body {
                    text.push_str(delta);
                    return Extension::Extended(self.entries.len() - 1);
                }
            }
        }
        let mut message = Message::assistant_pending();
        message.role = role;
        message.body = MessageBody::Text(delta.to_string());
        Extension::Appended(self.append(message))
    }

    /// Remove the entry at `index`; later entries shift down by one.
    pub fn remove(&mut self, index: usize) -> Option<Message> {
        if index < self.entries.len() {
            Some(self.entries.remove(index))
        } else {
            None
        }
    }

    /// Remove by stable id, returning the position it had.
    pub fn remove_by_id(&mut self, id: MessageId) -> Option<(usize, Message)> {
        let index = self.position(id)?;
        self.remove(index).map(|m| (index, m))
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn position(&self, id: MessageId) -> Option<usize> {
        self.entries.iter().position(|m| m.id == id)
    }

    pub fn get(&self, index: usize) -> Option<&Message> {
        self.entries.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut Message> {
        self.entries.get_mut(index)
    }

    pub fn last(&self) -> Option<&Message> {
        self.entries.last()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Message> {
        self.entries.iter()
    }

    pub fn assistant_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|m| m.role == Role::Assistant)
            .count()
    }

    /// Index of the open (pending) entry, if any. Only the last entry can be open.
    pub fn pending_index(&self) -> Option<usize> {
        match self.entries.last() {
            Some(m) if m.is_pending() => Some(self.entries.len() - 1),
            _ => None,
        }
    }

    pub fn upload_prompt_index(&self) -> Option<usize> {
        self.entries
            .iter()
            .rposition(|m| m.body == MessageBody::UploadPrompt)
    }

    /// Last assistant entry with a text body that is not a warning.
    pub fn last_assistant_text_index(&self) -> Option<usize> {
        self.entries.iter().rposition(|m| {
            m.role == Role::Assistant && m.is_text() && m.status != MessageStatus::Warning
        })
    }
}
