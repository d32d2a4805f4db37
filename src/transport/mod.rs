// src/transport/mod.rs — Connection to the assistant backend

pub mod ws;

use async_trait::async_trait;

use crate::infra::errors::AuditChatError;
use crate::protocol::{Command, Frame};
pub use ws::WsTransport;

/// Everything the connection can hand to the session.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundEvent {
    /// A classified text frame.
    Frame(Frame),
    /// The connection failed. Reported at most once.
    Error(String),
    /// The connection is gone for good.
    Closed,
}

/// One long-lived bidirectional connection.
///
/// `next_event` must be cancel-safe: the chat driver polls it inside
/// `tokio::select!` alongside user input.
#[async_trait]
pub trait Transport: Send {
    /// Encode and transmit a command. Fails with `NotConnected` once closed.
    async fn send(&mut self, command: &Command) -> Result<(), AuditChatError>;

    /// Next inbound event, or `None` after `Closed` has been delivered.
    async fn next_event(&mut self) -> Option<InboundEvent>;

    fn is_open(&self) -> bool;

    async fn close(&mut self) -> Result<(), AuditChatError>;
}
