//! Error types for the kokkai engine

use thiserror::Error;

/// Result type alias for engine operations
pub type KokkaiResult<T> = Result<T, KokkaiError>;

/// Main error type for the kokkai engine
#[derive(Error, Debug, Clone)]
pub enum KokkaiError {
    /// Configuration related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Authentication related errors
    #[error("Auth error: {0}")]
    Auth(String),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(String),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(String),

    /// Generic error with context
    #[error("Error: {0}")]
    Other(String),
}

impl KokkaiError {
    /// Create a new configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a new auth error
    pub fn auth(message: impl Into<String>) -> Self {
        Self::Auth(message.into())
    }
}

impl From<anyhow::Error> for KokkaiError {
    fn from(error: anyhow::Error) -> Self {
        Self::Other(error.to_string())
    }
}

impl From<serde_json::Error> for KokkaiError {
    fn from(error: serde_json::Error) -> Self {
        Self::Json(error.to_string())
    }
}

impl From<reqwest::Error> for KokkaiError {
    fn from(error: reqwest::Error) -> Self {
        Self::Http(error.to_string())
    }
}

impl From<url::ParseError> for KokkaiError {
    fn from(error: url::ParseError) -> Self {
        Self::Config(error.to_string())
    }
}
