//! Global error types for the Kinnect client.
//!
//! All error categories across the client are unified into a single
//! `KnError` enum with conversions from underlying library errors.
//!
//! The taxonomy follows a strict propagation policy:
//! - Transport errors self-heal via reconnection and are surfaced as
//!   connection events, never thrown to callers.
//! - `AuthRequired` fails fast before any network I/O.
//! - `Api` and `Network` failures on request/response operations propagate
//!   to the caller; retrying them is a caller concern.
//! - Fire-and-forget realtime emissions never produce caller-visible errors.

use thiserror::Error;

/// Convenience type alias for Results using KnError.
pub type KnResult<T> = Result<T, KnError>;

/// Unified error type covering all error categories in Kinnect.
#[derive(Error, Debug)]
pub enum KnError {
    // -- Configuration errors --
    /// Failed to load or parse application configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// A required configuration value is missing.
    #[error("missing configuration: {0}")]
    MissingConfig(String),

    // -- Network errors --
    /// REST call could not complete (DNS resolution, connect failure, etc).
    #[error("network error: {0}")]
    Network(String),

    /// HTTP request timed out.
    #[error("request timeout: {0}")]
    Timeout(String),

    /// Realtime transport error (connect failure or unexpected drop).
    #[error("transport error: {0}")]
    Transport(String),

    /// Realtime transport disconnected unexpectedly.
    #[error("transport disconnected")]
    TransportDisconnected,

    /// Server returned a non-2xx response, with the server-provided message.
    #[error("api error (status {status}): {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Error message from the server.
        message: String,
    },

    /// An operation requiring a session token was attempted without one.
    #[error("authentication required: {0}")]
    AuthRequired(String),

    // -- Message errors --
    /// Failed to send a message.
    #[error("send failed: {0}")]
    SendFailed(String),

    /// Message not found.
    #[error("message not found: {0}")]
    MessageNotFound(String),

    /// Chat not found.
    #[error("chat not found: {0}")]
    ChatNotFound(String),

    // -- File/IO errors --
    /// File system operation failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    // -- Service errors --
    /// A service failed to initialize.
    #[error("service init error: {0}")]
    ServiceInit(String),

    /// A service is not yet initialized.
    #[error("service not initialized: {0}")]
    ServiceNotInitialized(String),

    /// A service operation failed.
    #[error("service error: {0}")]
    Service(String),

    // -- Generic --
    /// An unexpected internal error.
    #[error("internal error: {0}")]
    Internal(String),

    /// Wrapping anyhow errors for interop.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<serde_json::Error> for KnError {
    fn from(e: serde_json::Error) -> Self {
        KnError::Serialization(e.to_string())
    }
}

impl From<toml::de::Error> for KnError {
    fn from(e: toml::de::Error) -> Self {
        KnError::Config(e.to_string())
    }
}

impl KnError {
    /// Whether this error is worth an automatic retry at the HTTP layer.
    pub fn is_retryable(&self) -> bool {
        matches!(self, KnError::Network(_) | KnError::Timeout(_))
    }

    /// Whether the caller should re-authenticate before retrying.
    pub fn is_auth_error(&self) -> bool {
        match self {
            KnError::AuthRequired(_) => true,
            KnError::Api { status, .. } => *status == 401 || *status == 403,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = KnError::Config("bad value".to_string());
        assert_eq!(err.to_string(), "configuration error: bad value");

        let err = KnError::Api {
            status: 404,
            message: "chat does not exist".into(),
        };
        assert_eq!(err.to_string(), "api error (status 404): chat does not exist");
    }

    #[test]
    fn test_retryable_classification() {
        assert!(KnError::Network("connection refused".into()).is_retryable());
        assert!(KnError::Timeout("30s elapsed".into()).is_retryable());
        assert!(!KnError::AuthRequired("no token".into()).is_retryable());
        assert!(!KnError::Api { status: 400, message: String::new() }.is_retryable());
    }

    #[test]
    fn test_auth_error_classification() {
        assert!(KnError::AuthRequired("no token".into()).is_auth_error());
        assert!(KnError::Api { status: 401, message: String::new() }.is_auth_error());
        assert!(!KnError::Api { status: 500, message: String::new() }.is_auth_error());
    }
}
