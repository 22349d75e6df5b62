//! Error types for turnkit.

use thiserror::Error;

pub use crate::permission::PermissionError;

/// Primary error type for all turnkit operations.
#[derive(Error, Debug)]
pub enum TurnkitError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("HTTP error (status {status}): {message}")]
    Http { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Stream error: {0}")]
    Stream(String),

    #[error("Permission error: {0}")]
    Permission(#[from] PermissionError),

    #[error("Invalid state: {0}")]
    InvalidState(String),
}

impl TurnkitError {
    /// Create an HTTP status error.
    pub fn http(status: u16, message: impl Into<String>) -> Self {
        Self::Http {
            status,
            message: message.into(),
        }
    }

    /// Whether this error is potentially retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network(_) => true,
            Self::Http { status, .. } => *status == 429 || (500..=599).contains(status),
            Self::Permission(PermissionError::Timeout { .. }) => true,
            _ => false,
        }
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, TurnkitError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_errors_are_retryable() {
        assert!(TurnkitError::http(503, "unavailable").is_retryable());
        assert!(TurnkitError::http(429, "slow down").is_retryable());
        assert!(!TurnkitError::http(400, "bad request").is_retryable());
    }

    #[test]
    fn permission_errors_convert() {
        let err: TurnkitError = PermissionError::NoHandler.into();
        assert!(matches!(err, TurnkitError::Permission(PermissionError::NoHandler)));
        assert!(!err.is_retryable());
        assert_eq!(
            err.to_string(),
            "Permission error: no permission handler registered"
        );
    }
}
