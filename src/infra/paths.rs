// src/infra/paths.rs — Config path resolution
//
// AUDITCHAT_HOME overrides everything. Otherwise config lives in ~/.auditchat/.

use std::path::PathBuf;

/// Returns the AUDITCHAT_HOME override, if set.
fn auditchat_home() -> Option<PathBuf> {
    std::env::var_os("AUDITCHAT_HOME").map(PathBuf::from)
}

/// Home directory, if the platform can tell us one.
pub fn dirs_home() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|dirs| dirs.home_dir().to_path_buf())
}

/// Configuration directory: $AUDITCHAT_HOME/ or ~/.auditchat/
pub fn config_dir() -> PathBuf {
    if let Some(home) = auditchat_home() {
        return home;
    }
    dirs_home()
        .map(|home| home.join(".auditchat"))
        .unwrap_or_else(|| PathBuf::from(".auditchat"))
}

/// Config file path
pub fn config_file_path() -> PathBuf {
    config_dir().join("config.toml")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_file_lives_in_config_dir() {
        let path = config_file_path();
        assert_eq!(path.file_name().and_then(|n| n.to_str()), Some("config.toml"));
        assert_eq!(path.parent(), Some(config_dir().as_path()));
    }
}
