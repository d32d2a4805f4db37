// src/infra/config.rs — Configuration loading (TOML)

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::infra::errors::AuditChatError;
use crate::infra::paths;

pub const DEFAULT_SERVER_URL: &str = "ws://localhost:1010/ws/chat";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub session: SessionConfig,

    #[serde(default)]
    pub upload: UploadConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub url: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_SERVER_URL.into(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Abandon a turn that has produced no terminal frame after this many
    /// seconds. Unset means wait forever.
    #[serde(default)]
    pub turn_timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadEncoding {
    /// `pdf_bytes`: one JSON integer per byte.
    #[default]
    ByteArray,
    /// `pdf_base64`: standard base64 string.
    Base64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    #[serde(default)]
    pub encoding: UploadEncoding,
    #[serde(default = "default_max_file_mb")]
    pub max_file_mb: u64,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            encoding: UploadEncoding::default(),
            max_file_mb: default_max_file_mb(),
        }
    }
}

impl UploadConfig {
    pub fn max_bytes(&self) -> u64 {
        self.max_file_mb.saturating_mul(1024 * 1024)
    }
}

fn default_max_file_mb() -> u64 {
    50
}

impl Config {
    /// Load config from file, falling back to defaults.
    pub fn load() -> anyhow::Result<Self> {
        let path = paths::config_file_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content).map_err(|e| {
            AuditChatError::Config(format!("{}: {}", path.display(), e.message()))
        })?;
        Ok(config)
    }
}
