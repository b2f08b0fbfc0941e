//! Configuration module for the gramkit runtime.
//!
//! Settings are layered by [`ConfigLoader`] from defaults, files and
//! `GRAMKIT_*` environment variables, then checked by [`validate_config`].

pub mod error;
pub mod loader;
pub mod schema;
pub mod validation;

pub use error::{ConfigError, ConfigResult};
pub use loader::{ConfigLoader, Profile, load_config, load_config_from_file};
pub use schema::{
    BotConfig, GramkitConfig, LogFormat, LogLevel, LogOutput, LoggingConfig,
    PollingSettings, SpanEventConfig, StorageConfig, WebhookConfig,
};
pub use validation::validate_config;
