//! Bot runtime: wires the HTTP client, state storage and dispatcher, then
//! receives updates by polling or through a webhook until shutdown.
//!
//! ```text
//!   GramkitConfig ──▶ BotRuntime::from_config
//!                       │  HttpBot  +  Memory/Redis storage  +  Dispatcher
//!                       ▼
//!                     run_until(shutdown)
//!                       ├─ webhook.url set ─▶ setWebhook ─▶ WebhookServer ─▶ deleteWebhook
//!                       └─ otherwise ───────▶ deleteWebhook ─▶ getUpdates loop
//! ```
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use gramkit_runtime::BotRuntime;
//!
//! let mut runtime = BotRuntime::builder().config_file("gramkit.toml").build().await?;
//! runtime.dispatcher_mut().register_handler(start_route);
//! runtime.run().await?;
//! ```

use std::future::Future;
use std::path::Path;
use std::sync::Arc;

use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::{ConfigLoader, GramkitConfig, StorageConfig, validate_config};
use crate::error::RuntimeResult;
use gramkit_core::BoxedBot;
use gramkit_framework::{BoxedStorage, Dispatcher, MemoryStorage};
use gramkit_transport::{HttpBot, WebhookServer};

/// How the runtime receives updates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    Polling,
    Webhook,
}

/// Owns a configured [`Dispatcher`] and drives it until shutdown.
pub struct BotRuntime {
    config: GramkitConfig,
    dispatcher: Dispatcher,
}

impl BotRuntime {
    pub fn builder() -> RuntimeBuilder {
        RuntimeBuilder::new()
    }

    /// Validates `config`, then creates the HTTP client and the state backend.
    ///
    /// A Redis URL needs the `redis-storage` feature; without one, state is
    /// kept in memory.
    pub async fn from_config(config: GramkitConfig) -> RuntimeResult<Self> {
        validate_config(&config)?;

        let bot = HttpBot::builder(config.bot.token.clone())
            .api_url(config.bot.api_url.clone())
            .timeout(config.bot.timeout())
            .build()?;
        let storage = open_storage(&config.storage).await?;

        info!(
            api_url = %config.bot.api_url,
            redis = config.storage.redis_url.is_some(),
            "Runtime initialized"
        );
        Ok(Self {
            dispatcher: Dispatcher::new(Arc::new(bot)).with_storage(storage),
            config,
        })
    }

    /// Uses an existing bot and in-memory state. The config is not validated.
    pub fn with_bot(config: GramkitConfig, bot: BoxedBot) -> Self {
        Self {
            dispatcher: Dispatcher::new(bot),
            config,
        }
    }

    pub fn config(&self) -> &GramkitConfig {
        &self.config
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Where routes and middlewares are registered before running.
    pub fn dispatcher_mut(&mut self) -> &mut Dispatcher {
        &mut self.dispatcher
    }

    pub fn mode(&self) -> RunMode {
        if self.config.uses_webhook() {
            RunMode::Webhook
        } else {
            RunMode::Polling
        }
    }

    /// Runs until Ctrl+C or SIGTERM.
    pub async fn run(self) -> RuntimeResult<()> {
        self.run_until(wait_for_shutdown()).await
    }

    /// Runs until `shutdown` completes, then closes the state backend.
    pub async fn run_until<F>(self, shutdown: F) -> RuntimeResult<()>
    where
        F: Future<Output = ()>,
    {
        let mode = self.mode();
        let Self { config, dispatcher } = self;
        let dispatcher = Arc::new(dispatcher);

        info!(?mode, "Starting bot");
        let result = match mode {
            RunMode::Webhook => run_webhook(&config, Arc::clone(&dispatcher), shutdown).await,
            RunMode::Polling => run_polling(&config, &dispatcher, shutdown).await,
        };

        if let Err(e) = dispatcher.storage().close().await {
            warn!(error = %e, "Failed to close storage");
        }
        info!("Bot stopped");
        result
    }
}

async fn open_storage(config: &StorageConfig) -> RuntimeResult<BoxedStorage> {
    match &config.redis_url {
        None => Ok(Arc::new(MemoryStorage::new())),
        #[cfg(feature = "redis-storage")]
        Some(url) => {
            let storage =
                gramkit_framework::storage::RedisStorage::connect_with_prefix(url, &config.prefix)
                    .await?;
            debug!(prefix = %config.prefix, "Connected to Redis");
            Ok(Arc::new(storage))
        }
        #[cfg(not(feature = "redis-storage"))]
        Some(_) => Err(crate::error::RuntimeError::FeatureDisabled("redis-storage")),
    }
}

async fn run_webhook<F>(
    config: &GramkitConfig,
    dispatcher: Arc<Dispatcher>,
    shutdown: F,
) -> RuntimeResult<()>
where
    F: Future<Output = ()>,
{
    let Some(url) = config.webhook.url.as_deref() else {
        return Err(crate::config::ConfigError::missing_field("webhook.url").into());
    };
    let bot = Arc::clone(dispatcher.bot());

    bot.set_webhook(url, config.webhook.secret_token.as_deref())
        .await?;
    info!(url, "Webhook registered");

    let server = WebhookServer::new(config.webhook.to_server_config(), dispatcher);
    let handle = server.listen().await?;

    shutdown.await;
    info!("Shutdown requested");
    handle.stop().await;

    if let Err(e) = bot.delete_webhook(false).await {
        warn!(error = %e, "Failed to remove webhook");
    }
    Ok(())
}

async fn run_polling<F>(
    config: &GramkitConfig,
    dispatcher: &Dispatcher,
    shutdown: F,
) -> RuntimeResult<()>
where
    F: Future<Output = ()>,
{
    // getUpdates is refused while a webhook is registered.
    dispatcher.bot().delete_webhook(false).await?;

    debug!("Webhook cleared");

    let polling = config.polling.to_polling_config();
    let cancel = CancellationToken::new();
    tokio::join!(dispatcher.run_polling(&polling, cancel.clone()), async {
        shutdown.await;
        info!("Shutdown requested");
        cancel.cancel();
    });
    Ok(())
}

/// Resolves on Ctrl+C, or SIGTERM on unix.
async fn wait_for_shutdown() {
    #[cfg(unix)]
    {
        let mut sigterm = match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(sigterm) => sigterm,
            Err(e) => {
                error!(error = %e, "Failed to register SIGTERM handler");
                wait_for_ctrl_c().await;
                return;
            }
        };

        tokio::select! {
            _ = signal::ctrl_c() => {
                info!("Received Ctrl+C, shutting down");
            }
            _ = sigterm.recv() => {
                info!("Received SIGTERM, shutting down");
            }
        }
    }

    #[cfg(not(unix))]
    wait_for_ctrl_c().await;
}

async fn wait_for_ctrl_c() {
    match signal::ctrl_c().await {
        Ok(()) => info!("Received Ctrl+C, shutting down"),
        // Without a signal handler the bot can only be stopped externally.
        Err(e) => {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    }
}

// =============================================================================
// RuntimeBuilder
// =============================================================================

/// Loads configuration, then builds a [`BotRuntime`] from it.
///
/// ```rust,ignore
/// let runtime = BotRuntime::builder()
///     .config_file("deploy/gramkit.toml")
///     .profile("production")
///     .build()
///     .await?;
/// ```
pub struct RuntimeBuilder {
    config_loader: ConfigLoader,
}

impl RuntimeBuilder {
    pub fn new() -> Self {
        Self {
            config_loader: ConfigLoader::new(),
        }
    }

    pub fn config_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_loader = self.config_loader.file(path);
        self
    }

    pub fn profile(mut self, profile: impl AsRef<str>) -> Self {
        self.config_loader = self.config_loader.profile(profile);
        self
    }

    pub fn search_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_loader = self.config_loader.search_path(path);
        self
    }

    pub fn without_env(mut self) -> Self {
        self.config_loader = self.config_loader.without_env();
        self
    }

    pub fn merge(mut self, config: GramkitConfig) -> Self {
        self.config_loader = self.config_loader.merge(config);
        self
    }

    /// Values that win over files and environment, such as CLI flags.
    pub fn overrides<T: serde::Serialize>(mut self, values: T) -> Self {
        self.config_loader = self.config_loader.overrides(values);
        self
    }

    pub fn load_config(self) -> RuntimeResult<GramkitConfig> {
        Ok(self.config_loader.load()?)
    }

    pub async fn build(self) -> RuntimeResult<BotRuntime> {
        let config = self.load_config()?;
        BotRuntime::from_config(config).await
    }
}

impl Default for RuntimeBuilder {
    fn default() -> Self {
        Self::new()
    }
}
