//! # gramkit transport
//!
//! Network transports for the gramkit bot framework.
//!
//! ## Features
//!
//! - `http-client` (default): [`HttpBot`], a `reqwest`-backed [`Bot`](gramkit_core::Bot)
//! - `http-server` (default): [`WebhookServer`], an `axum` webhook receiver
//! - `full`: both
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────┐
//! │  gramkit-framework   │  (dispatcher, handlers)
//! ├──────────────────────┤
//! │  gramkit-core        │  (Bot / UpdateHandler traits)
//! ├──────────────────────┤
//! │  gramkit-transport   │  <- This crate (implementations)
//! ├──────────────────────┤
//! │  Bot API over HTTPS  │
//! └──────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use gramkit_transport::http::{HttpBot, WebhookServer, WebhookServerConfig};
//!
//! let bot = HttpBot::new(token)?;
//! bot.set_webhook("https://example.com/webhook", Some("s3cret")).await?;
//!
//! let server = WebhookServer::new(
//!     WebhookServerConfig { secret_token: Some("s3cret".into()), ..Default::default() },
//!     Arc::new(dispatcher),
//! );
//! let handle = server.listen().await?;
//! ```

#[cfg(any(feature = "http-client", feature = "http-server"))]
pub mod http;

#[cfg(feature = "http-client")]
pub use http::HttpBot;

#[cfg(feature = "http-server")]
pub use http::{ListenerHandle, WebhookServer, WebhookServerConfig};
