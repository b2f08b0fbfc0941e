//! Error types for the gramkit framework.

use gramkit_core::{ApiError, BoxError};
use thiserror::Error;

/// Errors raised by a conversation-state backend.
#[derive(Debug, Error)]
pub enum StorageError {
    /// A stored record could not be encoded or decoded.
    #[error("state record serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The backend itself failed.
    #[error("storage backend error: {0}")]
    Backend(String),

    #[cfg(feature = "redis-storage")]
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),
}

impl StorageError {
    pub fn backend(msg: impl Into<String>) -> Self {
        Self::Backend(msg.into())
    }
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Returned by a middleware to stop an update before routing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MiddlewareError {
    /// The sender sent updates faster than the configured rate.
    #[error("user {user_id} is throttled")]
    Throttled { user_id: i64 },

    /// The sender is missing or not on the allow-list.
    #[error("unauthorized update (user: {user_id:?})")]
    Unauthorized { user_id: Option<i64> },

    #[error("{0}")]
    Other(String),
}

impl MiddlewareError {
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }
}

/// Errors that abort the processing of one update.
///
/// Handler failures are not part of this enum: they are logged at the
/// dispatch boundary and never reach the caller.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("middleware rejected update: {0}")]
    Middleware(#[from] MiddlewareError),

    #[error("failed to load conversation state: {0}")]
    Storage(#[from] StorageError),
}

/// A failure returned by a user handler, tagged with the route it came from.
#[derive(Debug, Error)]
#[error("handler '{route}' failed: {source}")]
pub struct HandlerError {
    pub route: String,
    #[source]
    pub source: BoxError,
}

impl HandlerError {
    pub fn new(route: impl Into<String>, source: BoxError) -> Self {
        Self {
            route: route.into(),
            source,
        }
    }
}

/// Errors returned by the domain extension helpers.
#[derive(Debug, Error)]
pub enum ExtensionError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Input rejected by the helper's policy.
    #[error("invalid input: {0}")]
    Invalid(String),

    /// A configured per-user or per-chat limit was reached.
    #[error("limit reached: {0}")]
    LimitReached(String),

    #[error("not found: {0}")]
    NotFound(String),
}

impl ExtensionError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::Invalid(msg.into())
    }

    pub fn limit(msg: impl Into<String>) -> Self {
        Self::LimitReached(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }
}

pub type ExtensionResult<T> = Result<T, ExtensionError>;
