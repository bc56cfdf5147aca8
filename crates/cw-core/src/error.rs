use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ChainError {
    #[error("no suitable provider for chain '{name}': {}", .reasons.join("; "))]
    NoProviderSelected { name: String, reasons: Vec<String> },

    #[error("invalid chain name '{name}': {reason}")]
    InvalidName { name: String, reason: String },

    #[error("unknown protocol '{0}' (expected IPv4, IPv6 or ethernet)")]
    UnknownProtocol(String),
}

impl ChainError {
    pub(crate) fn invalid_name(name: &str, reason: impl Into<String>) -> Self {
        ChainError::InvalidName {
            name: name.to_string(),
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid tool override '{0}' (expected NAME=PATH)")]
    InvalidToolOverride(String),
}
