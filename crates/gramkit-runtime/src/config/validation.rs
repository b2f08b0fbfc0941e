//! Configuration validation utilities.

use super::error::{ConfigError, ConfigResult};
use super::schema::{BotConfig, GramkitConfig, PollingSettings, StorageConfig, WebhookConfig};

/// Validates the entire configuration.
pub fn validate_config(config: &GramkitConfig) -> ConfigResult<()> {
    validate_bot_config(&config.bot)?;
    validate_polling_config(&config.polling, &config.bot)?;
    validate_webhook_config(&config.webhook)?;
    validate_storage_config(&config.storage)?;
    Ok(())
}

fn validate_bot_config(bot: &BotConfig) -> ConfigResult<()> {
    if bot.token.trim().is_empty() {
        return Err(ConfigError::missing_field("bot.token"));
    }
    validate_http_url(&bot.api_url)?;
    if bot.timeout_secs == 0 {
        return Err(ConfigError::validation("Request timeout must be greater than 0"));
    }
    Ok(())
}

fn validate_polling_config(polling: &PollingSettings, bot: &BotConfig) -> ConfigResult<()> {
    if polling.interval_ms == 0 {
        return Err(ConfigError::validation(
            "Polling interval must be greater than 0",
        ));
    }
    // A request must outlive the long poll it carries.
    if bot.timeout_secs <= polling.timeout_secs {
        return Err(ConfigError::validation(format!(
            "Request timeout ({}s) must exceed the polling timeout ({}s)",
            bot.timeout_secs, polling.timeout_secs
        )));
    }
    if polling.limit.is_some_and(|limit| !(1..=100).contains(&limit)) {
        return Err(ConfigError::validation(
            "Polling limit must be between 1 and 100",
        ));
    }
    Ok(())
}

fn validate_webhook_config(webhook: &WebhookConfig) -> ConfigResult<()> {
    if let Some(url) = &webhook.url {
        validate_http_url(url)?;
    }
    if webhook.port == 0 {
        return Err(ConfigError::InvalidPort(webhook.port));
    }
    if !webhook.path.starts_with('/') {
        return Err(ConfigError::validation(format!(
            "Webhook path must start with '/': {}",
            webhook.path
        )));
    }
    Ok(())
}

fn validate_storage_config(storage: &StorageConfig) -> ConfigResult<()> {
    if let Some(url) = &storage.redis_url
        && !url.starts_with("redis://")
        && !url.starts_with("rediss://")
    {
        return Err(ConfigError::invalid_url(
            url,
            "Redis URL must start with redis:// or rediss://",
        ));
    }
    Ok(())
}

/// Validates an HTTP(S) URL.
fn validate_http_url(url: &str) -> ConfigResult<()> {
    if url.is_empty() {
        return Err(ConfigError::invalid_url(url, "URL cannot be empty"));
    }
    if !url.starts_with("http://") && !url.starts_with("https://") {
        return Err(ConfigError::invalid_url(
            url,
            "URL must start with http:// or https://",
        ));
    }
    Ok(())
}
