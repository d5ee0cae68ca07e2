//! Error types for ai-chatter

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for ai-chatter operations
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// A config file exists but does not hold a JSON object
    #[error("Invalid JSON in config file at {}: {source}", path.display())]
    InvalidConfigJson {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// No API key could be found in any settings layer
    #[error("No API key provided in settings. Pass --api-key, set AI_CHATTER_API_KEY or add \"api_key\" to a config file")]
    MissingApiKey,

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Database errors
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Session invariant violations
    #[error("Session error: {0}")]
    Session(String),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// Not found errors
    #[error("Not found: {0}")]
    NotFound(String),
}

/// A specialized Result type for ai-chatter operations
pub type Result<T> = std::result::Result<T, Error>;

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_config_json_names_file() {
        let source = serde_json::from_str::<serde_json::Value>("{oops").unwrap_err();
        let err = Error::InvalidConfigJson {
            path: PathBuf::from("/tmp/cfg/config.json"),
            source,
        };
        assert!(err.to_string().contains("/tmp/cfg/config.json"));
    }
}
