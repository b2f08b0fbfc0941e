//! Configuration schema definitions.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use gramkit_framework::PollingConfig;
use gramkit_transport::WebhookServerConfig;
use gramkit_transport::http::DEFAULT_API_URL;

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GramkitConfig {
    /// Bot credentials and API endpoint.
    #[serde(default)]
    pub bot: BotConfig,

    /// Conversation-state backend.
    #[serde(default)]
    pub storage: StorageConfig,

    /// `getUpdates` loop settings, used when no webhook URL is set.
    #[serde(default)]
    pub polling: PollingSettings,

    #[serde(default)]
    pub webhook: WebhookConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl GramkitConfig {
    /// Whether updates arrive through a webhook rather than polling.
    pub fn uses_webhook(&self) -> bool {
        self.webhook.url.is_some()
    }
}

// =============================================================================
// Bot
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotConfig {
    /// Token issued by BotFather.
    #[serde(default)]
    pub token: String,

    /// Base URL of the Bot API server.
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// HTTP request timeout in seconds. Must exceed the long-poll timeout.
    #[serde(default = "default_request_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            token: String::new(),
            api_url: default_api_url(),
            timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl BotConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn default_api_url() -> String {
    DEFAULT_API_URL.to_string()
}

fn default_request_timeout_secs() -> u64 {
    60
}

// =============================================================================
// Storage
// =============================================================================

/// Without a Redis URL, state lives in process memory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub redis_url: Option<String>,

    /// Key prefix for the Redis backend.
    #[serde(default = "default_storage_prefix")]
    pub prefix: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            redis_url: None,
            prefix: default_storage_prefix(),
        }
    }
}

fn default_storage_prefix() -> String {
    "gramkit".to_string()
}

// =============================================================================
// Polling
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollingSettings {
    /// Pause between two fetches in milliseconds.
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,

    /// Long-poll timeout passed to `getUpdates`, in seconds.
    #[serde(default = "default_poll_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default)]
    pub limit: Option<u32>,

    #[serde(default)]
    pub allowed_updates: Option<Vec<String>>,
}

impl Default for PollingSettings {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
            timeout_secs: default_poll_timeout_secs(),
            limit: None,
            allowed_updates: None,
        }
    }
}

impl PollingSettings {
    pub fn to_polling_config(&self) -> PollingConfig {
        PollingConfig {
            interval: Duration::from_millis(self.interval_ms),
            timeout_secs: self.timeout_secs,
            limit: self.limit,
            allowed_updates: self.allowed_updates.clone(),
        }
    }
}

fn default_interval_ms() -> u64 {
    1000
}

fn default_poll_timeout_secs() -> u64 {
    30
}

// =============================================================================
// Webhook
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookConfig {
    /// Public URL registered with `setWebhook`. Enables webhook mode.
    #[serde(default)]
    pub url: Option<String>,

    /// Local bind address.
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_webhook_path")]
    pub path: String,

    /// Compared against the `X-Telegram-Bot-Api-Secret-Token` header.
    #[serde(default)]
    pub secret_token: Option<String>,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            url: None,
            host: default_host(),
            port: default_port(),
            path: default_webhook_path(),
            secret_token: None,
        }
    }
}

impl WebhookConfig {
    pub fn to_server_config(&self) -> WebhookServerConfig {
        WebhookServerConfig {
            host: self.host.clone(),
            port: self.port,
            path: self.path.clone(),
            secret_token: self.secret_token.clone(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8443
}

fn default_webhook_path() -> String {
    "/webhook".to_string()
}

// =============================================================================
// Logging
// =============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }

    pub fn to_tracing_level(self) -> tracing::Level {
        match self {
            Self::Trace => tracing::Level::TRACE,
            Self::Debug => tracing::Level::DEBUG,
            Self::Info => tracing::Level::INFO,
            Self::Warn => tracing::Level::WARN,
            Self::Error => tracing::Level::ERROR,
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Single line per event.
    #[default]
    Compact,
    /// Default `tracing-subscriber` layout.
    Full,
    /// Multi-line, human oriented.
    Pretty,
    /// One JSON object per event.
    #[cfg(feature = "json-log")]
    Json,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogOutput {
    #[default]
    Stdout,
    Stderr,
    /// Requires `file_path`.
    File,
}

/// Which span lifecycle events are logged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpanEventConfig {
    #[serde(default)]
    pub new: bool,
    #[serde(default)]
    pub enter: bool,
    #[serde(default)]
    pub exit: bool,
    #[serde(default)]
    pub close: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub level: LogLevel,

    #[serde(default)]
    pub format: LogFormat,

    #[serde(default)]
    pub output: LogOutput,

    #[serde(default)]
    pub span_events: SpanEventConfig,

    #[serde(default)]
    pub file_path: Option<PathBuf>,

    #[serde(default)]
    pub thread_ids: bool,

    /// Include source file and line of each event.
    #[serde(default)]
    pub file_location: bool,

    /// Per-target levels, e.g. `gramkit_transport = "debug"`.
    #[serde(default)]
    pub filters: HashMap<String, LogLevel>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = GramkitConfig::default();
        assert_eq!(config.bot.api_url, DEFAULT_API_URL);
        assert_eq!(config.bot.timeout(), Duration::from_secs(60));
        assert_eq!(config.storage.prefix, "gramkit");
        assert_eq!(config.webhook.port, 8443);
        assert_eq!(config.webhook.path, "/webhook");
        assert!(!config.uses_webhook());
        assert_eq!(config.logging.level, LogLevel::Info);
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let config: GramkitConfig = serde_json::from_value(serde_json::json!({
            "bot": {"token": "123:abc"},
            "webhook": {"url": "https://example.com/hook", "port": 9000},
            "logging": {"level": "debug", "filters": {"gramkit_transport": "trace"}}
        }))
        .unwrap();

        assert_eq!(config.bot.token, "123:abc");
        assert_eq!(config.bot.timeout_secs, 60);
        assert!(config.uses_webhook());
        assert_eq!(config.webhook.host, "0.0.0.0");
        assert_eq!(config.webhook.port, 9000);
        assert_eq!(config.logging.level, LogLevel::Debug);
        assert_eq!(config.logging.filters["gramkit_transport"], LogLevel::Trace);
    }

    #[test]
    fn test_conversions() {
        let polling = PollingSettings {
            interval_ms: 250,
            limit: Some(10),
            ..Default::default()
        }
        .to_polling_config();
        assert_eq!(polling.interval, Duration::from_millis(250));
        assert_eq!(polling.timeout_secs, 30);
        assert_eq!(polling.limit, Some(10));

        let server = WebhookConfig {
            secret_token: Some("s3cret".into()),
            ..Default::default()
        }
        .to_server_config();
        assert_eq!(server.bind_addr(), "0.0.0.0:8443");
        assert_eq!(server.secret_token.as_deref(), Some("s3cret"));
    }
}
