// src/infra/errors.rs — Error types for auditchat

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AuditChatError {
    // Transport errors (resolve the current turn)
    #[error("Could not connect to '{url}': {message}")]
    Connect { url: String, message: String },

    #[error("Connection is not open")]
    NotConnected,

    #[error("Send failed: {0}")]
    Send(String),

    #[error("Could not encode command: {0}")]
    Encode(#[from] serde_json::Error),

    // User errors
    #[error("Invalid upload '{path}': {reason}")]
    InvalidUpload { path: String, reason: String },

    // Infra
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl AuditChatError {
    /// Errors that come from the connection rather than from local input.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            AuditChatError::Connect { .. } | AuditChatError::NotConnected | AuditChatError::Send(_)
        )
    }
}
