// src/session/upload.rs — A PDF waiting to be analysed

use base64::Engine;
use std::path::Path;

use crate::infra::config::UploadEncoding;
use crate::infra::errors::AuditChatError;
use crate::protocol::{Command, PdfPayload};

/// Every PDF starts with this signature.
pub const PDF_MAGIC: &[u8] = b"%PDF-";

/// File bytes selected for analysis. Lives only while the session waits for
/// the result.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingUpload {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl PendingUpload {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes,
        }
    }

    /// Read and validate a PDF from disk.
    pub async fn from_path(path: &Path, max_bytes: u64) -> Result<Self, AuditChatError> {
        let display = path.display().to_string();
        let invalid = |reason: String| AuditChatError::InvalidUpload {
            path: display.clone(),
            reason,
        };

        let meta = tokio::fs::metadata(path)
            .await
            .map_err(|e| invalid(e.to_string()))?;
        if !meta.is_file() {
            return Err(invalid("not a file".into()));
        }
        if meta.len() > max_bytes {
            return Err(invalid(format!(
                "{} bytes exceeds the {} byte limit",
                meta.len(),
                max_bytes
            )));
        }

        let bytes = tokio::fs::read(path).await?;
        if bytes.is_empty() {
            return Err(invalid("file is empty".into()));
        }
        if !bytes.starts_with(PDF_MAGIC) {
            return Err(invalid("not a PDF document".into()));
        }

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or(display.clone());
        Ok(Self { name, bytes })
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Build the `upload_file` command in the requested encoding.
    pub fn to_command(&self, encoding: UploadEncoding) -> Command {
        let pdf = match encoding {
            UploadEncoding::ByteArray => PdfPayload::Bytes(self.bytes.clone()),
            UploadEncoding::Base64 => {
                PdfPayload::Base64(base64::engine::general_purpose::STANDARD.encode(&self.bytes))
            }
        };
        Command::UploadFile { pdf }
    }
}
