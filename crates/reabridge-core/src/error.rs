//! Error types for reabridge-core

use thiserror::Error;

/// Result type alias for reabridge-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the bridge core
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid host/port or malformed configuration value
    #[error("Configuration error: {0}")]
    Config(String),

    /// Socket bind, resolve or send failure
    #[error("Transport error: {0}")]
    Transport(String),

    /// Command argument rejected before any network activity
    #[error("not applied: {0}")]
    Validation(String),

    /// Malformed inbound datagram
    #[error("Decode error: {0}")]
    Decode(String),

    /// Knowledge document could not be loaded or has the wrong shape
    #[error("Knowledge base error: {0}")]
    Knowledge(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),
}

impl Error {
    /// Whether this error was raised by local validation (nothing was sent).
    pub fn is_validation(&self) -> bool {
        matches!(self, Error::Validation(_))
    }

    pub(crate) fn transport(context: &str, err: impl std::fmt::Display) -> Self {
        Error::Transport(format!("{}: {}", context, err))
    }
}
