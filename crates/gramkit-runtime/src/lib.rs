//! gramkit runtime - configuration, logging and the run loop.
//!
//! This crate provides:
//! - Layered configuration (`GramkitConfig`, `ConfigLoader`)
//! - Logging setup on `tracing-subscriber` (`LoggingBuilder`)
//! - The `BotRuntime`, which picks polling or webhook delivery from the
//!   configuration and stops on Ctrl+C / SIGTERM
//!
//! ```ignore
//! use gramkit_runtime::{BotRuntime, logging};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = gramkit_runtime::config::load_config()?;
//!     logging::init_from_config(&config.logging);
//!
//!     let mut runtime = BotRuntime::from_config(config).await?;
//!     runtime.dispatcher_mut().register_handler(my_route);
//!     runtime.run().await?;
//!     Ok(())
//! }
//! ```
//!
//! # Features
//!
//! - `toml-config` (default) / `yaml-config`: configuration file formats
//! - `json-log`: JSON log output
//! - `redis-storage`: Redis-backed conversation state

pub mod config;
pub mod error;
pub mod logging;
pub mod runtime;

pub use config::{ConfigError, ConfigLoader, ConfigResult, GramkitConfig};
pub use error::{RuntimeError, RuntimeResult};
pub use logging::{LoggingBuilder, SpanEvents};
pub use runtime::{BotRuntime, RunMode, RuntimeBuilder};

// Re-export tracing for use by other crates
pub use tracing;
pub use tracing_subscriber;

/// Logging macros and span helpers.
pub mod prelude {
    pub use tracing::{Level, debug, error, info, instrument, span, trace, warn};
}
