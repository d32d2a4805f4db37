// src/cli/mod.rs — CLI definition (clap derive)

pub mod chat;
pub mod render;

use clap::Parser;

use crate::infra::config::{Config, UploadEncoding};

#[derive(Parser, Debug)]
#[command(
    name = "auditchat",
    about = "Chat with the document-analysis assistant and upload a PDF for a Beneish M-Score report",
    version
)]
pub struct Cli {
    /// WebSocket endpoint of the assistant backend
    #[arg(short, long)]
    pub url: Option<String>,

    /// Config file path
    #[arg(long)]
    pub config: Option<String>,

    /// Stop a turn after this many seconds without any frame from the server
    #[arg(short, long)]
    pub timeout: Option<u64>,

    /// Send uploads as base64 instead of a byte array
    #[arg(long)]
    pub base64: bool,

    /// Debug logging on stderr
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    /// Flags win over the config file.
    pub fn apply_overrides(&self, config: &mut Config) {
        if let Some(ref url) = self.url {
            config.server.url = url.clone();
        }
        if let Some(secs) = self.timeout {
            config.session.turn_timeout_secs = Some(secs);
        }
        if self.base64 {
            config.upload.encoding = UploadEncoding::Base64;
        }
    }
}
