//! Configuration loading and the typed config structure.
//!
//! The canonical configuration lives in `pegboard.yaml` next to the binary.
//! Every field has a default, and a missing file yields the default
//! configuration, so the server runs with no setup at all.

use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level server configuration. Mirrors the structure of `pegboard.yaml`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// The host address to bind to (e.g. `0.0.0.0`).
    pub host: String,
    /// The TCP port to listen on.
    pub port: u16,
    /// Directory served under `/public`.
    pub public_dir: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: String::from("0.0.0.0"),
            port: 8080,
            public_dir: PathBuf::from("public"),
        }
    }
}

/// Load the configuration from `path`, falling back to defaults when the
/// file does not exist.
pub fn load(path: &Path) -> Result<ServerConfig, ConfigError> {
    if !path.exists() {
        tracing::info!(path = %path.display(), "no config file, using defaults");
        return Ok(ServerConfig::default());
    }
    let text = std::fs::read_to_string(path)?;
    Ok(serde_yml::from_str(&text)?)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sensible() {
        let config = ServerConfig::default();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 8080);
        assert_eq!(config.public_dir, PathBuf::from("public"));
    }

    #[test]
    fn partial_yaml_keeps_remaining_defaults() {
        let config: ServerConfig = serde_yml::from_str("port: 81\n").unwrap();
        assert_eq!(config.port, 81);
        assert_eq!(config.host, "0.0.0.0");
    }

    #[test]
    fn missing_file_yields_defaults() {
        let config = load(Path::new("does/not/exist.yaml")).unwrap();
        assert_eq!(config, ServerConfig::default());
    }
}
