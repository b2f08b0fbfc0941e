//! Runtime error types.

use thiserror::Error;

use crate::config::ConfigError;

/// Errors that can occur while starting or running a bot.
#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The HTTP client or webhook listener could not be set up.
    #[error("Transport error: {0}")]
    Transport(#[from] gramkit_core::TransportError),

    /// A Bot API call made during startup failed.
    #[error("API error: {0}")]
    Api(#[from] gramkit_core::ApiError),

    #[error("Storage error: {0}")]
    Storage(#[from] gramkit_framework::StorageError),

    /// The configuration asks for something this build leaves out.
    #[error("Feature not enabled: {0}")]
    FeatureDisabled(&'static str),
}

/// Result type for runtime operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;
