//! Unified error types for the gramkit core.
//!
//! Framework-level errors (storage, dispatch, middleware) live in
//! `gramkit-framework`; this module only covers talking to the Bot API.

use thiserror::Error;

// =============================================================================
// Transport Errors
// =============================================================================

/// Errors raised while moving bytes to and from the Bot API.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    /// The request could not be sent or the response could not be read.
    #[error("request to '{method}' failed: {reason}")]
    RequestFailed {
        /// The Bot API method being called.
        method: String,
        /// Reason for failure.
        reason: String,
    },

    /// The server answered with a non-2xx status and no usable API envelope.
    #[error("HTTP {status} from '{method}': {body}")]
    HttpStatus {
        /// The Bot API method being called.
        method: String,
        /// HTTP status code.
        status: u16,
        /// Raw response body.
        body: String,
    },

    /// Invalid configuration.
    #[error("invalid transport configuration: {0}")]
    InvalidConfig(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(String),
}

impl TransportError {
    /// Creates a request failure for `method`.
    pub fn request_failed(method: impl Into<String>, reason: impl ToString) -> Self {
        Self::RequestFailed {
            method: method.into(),
            reason: reason.to_string(),
        }
    }
}

impl From<std::io::Error> for TransportError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

// =============================================================================
// API Errors
// =============================================================================

/// Error type for Bot API calls.
#[derive(Debug, Clone, Error)]
pub enum ApiError {
    /// The API answered with `ok: false`.
    #[error("API error ({error_code}): {description}")]
    Api {
        /// Telegram's numeric error code.
        error_code: i64,
        /// Human-readable description from the API.
        description: String,
    },

    /// Failed to serialize a request or deserialize a result.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Transport error.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The bot implementation does not support this operation.
    #[error("operation '{0}' is not supported by this bot")]
    NotSupported(String),

    /// Other error.
    #[error("{0}")]
    Other(String),
}

impl ApiError {
    /// Creates an API error from an `ok: false` envelope.
    pub fn api(error_code: i64, description: impl Into<String>) -> Self {
        Self::Api {
            error_code,
            description: description.into(),
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;

/// Result type for API calls.
pub type ApiResult<T> = Result<T, ApiError>;

/// Boxed error used at user-code boundaries (handlers, update sinks).
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;
