//! HTTP transports.
//!
//! This module provides the Bot API client and the webhook server.

#[cfg(feature = "http-client")]
mod client;
#[cfg(feature = "http-client")]
pub use client::{DEFAULT_API_URL, DEFAULT_TIMEOUT, HttpBot, HttpBotBuilder};

#[cfg(feature = "http-server")]
mod server;
#[cfg(feature = "http-server")]
pub use server::{ListenerHandle, SECRET_TOKEN_HEADER, WebhookServer, WebhookServerConfig};
