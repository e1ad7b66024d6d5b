//! # Realtime Error Types
//!
//! Unified error handling for the status, push and notification layers.

use thiserror::Error;

/// Result type used throughout the crate
pub type RealtimeResult<T> = Result<T, RealtimeError>;

/// Error types for realtime operations
#[derive(Debug, Error)]
pub enum RealtimeError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON serialization/deserialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Push transport error: {0}")]
    Transport(String),

    #[error("Push handshake failed: {0}")]
    Handshake(String),

    #[error("Push protocol violation: {0}")]
    Protocol(String),

    #[error("{operation} failed: {reason}")]
    UserAction { operation: String, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl RealtimeError {
    /// Create an API error from an HTTP status and body
    pub fn api_error(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn config_error(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Wrap the failure of a user-initiated mutation for display
    pub fn user_action(operation: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::UserAction {
            operation: operation.into(),
            reason: reason.to_string(),
        }
    }

    /// Whether the failure is a connectivity problem that heals by retrying
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            RealtimeError::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            RealtimeError::Api { status, .. } => *status >= 500,
            RealtimeError::Transport(_) | RealtimeError::Handshake(_) => true,
            RealtimeError::Io(_) => true,
            _ => false,
        }
    }
}

impl From<config::ConfigError> for RealtimeError {
    fn from(error: config::ConfigError) -> Self {
        Self::Configuration(error.to_string())
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for RealtimeError {
    fn from(error: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::Transport(error.to_string())
    }
}
