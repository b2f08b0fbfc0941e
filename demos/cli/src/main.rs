//! Command-line runner for a minimal gramkit bot.
//!
//! Uses webhook delivery when `--webhook-url` is given, long polling
//! otherwise. Flags override the configuration file and `GRAMKIT_*`
//! environment variables.
//!
//! # Usage
//!
//! ```bash
//! gramkit --token 123:abc
//! gramkit --token 123:abc --webhook-url https://bot.example.com/webhook --webhook-port 8443
//! gramkit --config deploy/gramkit.toml --redis-url redis://localhost
//! ```

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use gramkit::prelude::*;
use serde_json::{Map, Value, json};
use tracing::info;

const NAME_STATE: &str = "Form:name";
const AGE_STATE: &str = "Form:age";

#[derive(Debug, Parser)]
#[command(name = "gramkit", version, about = "Run a gramkit Telegram bot")]
struct Args {
    /// Telegram Bot API token.
    #[arg(long, required_unless_present = "config")]
    token: Option<String>,

    /// Redis URL for conversation state (in memory when omitted).
    #[arg(long)]
    redis_url: Option<String>,

    /// Public webhook URL. Enables webhook mode.
    #[arg(long)]
    webhook_url: Option<String>,

    /// Local webhook port [default: 8443].
    #[arg(long)]
    webhook_port: Option<u16>,

    /// Configuration file.
    #[arg(long)]
    config: Option<PathBuf>,
}

impl Args {
    /// Only the flags actually given, shaped like the configuration file.
    fn overrides(&self) -> Value {
        let mut overrides = Map::new();
        if let Some(token) = &self.token {
            overrides.insert("bot".into(), json!({ "token": token }));
        }
        if let Some(url) = &self.redis_url {
            overrides.insert("storage".into(), json!({ "redis_url": url }));
        }

        let mut webhook = Map::new();
        if let Some(url) = &self.webhook_url {
            webhook.insert("url".into(), json!(url));
        }
        if let Some(port) = self.webhook_port {
            webhook.insert("port".into(), json!(port));
        }
        if !webhook.is_empty() {
            overrides.insert("webhook".into(), Value::Object(webhook));
        }
        Value::Object(overrides)
    }
}

// ============================================================================
// Handlers
// ============================================================================

async fn start(ctx: EventContext<Message>) -> Result<(), BoxError> {
    let name = ctx
        .from
        .as_ref()
        .map_or("there", |user| user.first_name.as_str());
    ctx.reply(&format!("Hello, {name}! Send /help to see what I can do."))
        .await?;
    Ok(())
}

async fn help(ctx: EventContext<Message>) -> Result<(), BoxError> {
    ctx.reply(
        "/start - Greeting\n\
         /name - Tell me your name and age\n\
         /cancel - Abort the current conversation\n\
         /help - This help\n\
         Anything else is echoed back.",
    )
    .await?;
    Ok(())
}

async fn ask_name(ctx: EventContext<Message>) -> Result<(), BoxError> {
    ctx.fsm().set_state(Some(State::new(NAME_STATE))).await?;
    ctx.reply("What is your name?").await?;
    Ok(())
}

async fn got_name(ctx: EventContext<Message>) -> Result<(), BoxError> {
    let fsm = ctx.fsm();
    let name = ctx.text.clone().unwrap_or_default();
    fsm.set("name", name.clone()).await?;
    fsm.set_state(Some(State::new(AGE_STATE))).await?;
    ctx.reply(&format!("Nice to meet you, {name}. How old are you?"))
        .await?;
    Ok(())
}

async fn got_age(ctx: EventContext<Message>) -> Result<(), BoxError> {
    let Some(age) = ctx.text.as_deref().and_then(|t| t.trim().parse::<u32>().ok()) else {
        ctx.reply("Please send your age as a number.").await?;
        return Ok(());
    };

    let fsm = ctx.fsm();
    // Read before finish() wipes the conversation data.
    let name = fsm
        .get("name")
        .await?
        .and_then(|v| v.as_str().map(str::to_string))
        .unwrap_or_default();
    fsm.finish().await?;
    ctx.reply(&format!("Thanks, {name}! You are {age}.")).await?;
    Ok(())
}

async fn cancel(ctx: EventContext<Message>) -> Result<(), BoxError> {
    ctx.fsm().finish().await?;
    ctx.reply("Cancelled.").await?;
    Ok(())
}

async fn echo(ctx: EventContext<Message>) -> Result<(), BoxError> {
    if let Some(text) = &ctx.text {
        ctx.reply(text).await?;
    }
    Ok(())
}

/// First match wins: conversation routes go before the catch-all echo.
fn register_routes(dispatcher: &mut Dispatcher) {
    dispatcher.register_middleware(LoggingMiddleware);
    dispatcher.register_handler(
        Route::new(cancel)
            .name("cancel")
            .filter(Command::new("cancel"))
            .state("*"),
    );
    dispatcher.register_handler(Route::new(got_name).name("got_name").state(NAME_STATE));
    dispatcher.register_handler(Route::new(got_age).name("got_age").state(AGE_STATE));
    dispatcher.register_handler(Route::new(start).name("start").filter(Command::new("start")));
    dispatcher.register_handler(Route::new(help).name("help").filter(Command::new("help")));
    dispatcher.register_handler(Route::new(ask_name).name("name").filter(Command::new("name")));
    dispatcher.register_handler(Route::new(echo).name("echo"));
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut builder = BotRuntime::builder().overrides(args.overrides());
    if let Some(path) = &args.config {
        builder = builder.config_file(path);
    }
    let config = builder.load_config().context("failed to load configuration")?;
    logging::init_from_config(&config.logging);

    let mut runtime = BotRuntime::from_config(config)
        .await
        .context("failed to start bot")?;

    register_routes(runtime.dispatcher_mut());

    info!(mode = ?runtime.mode(), "Bot starting");
    runtime.run().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use gramkit::core::ApiResult;
    use std::sync::{Arc, Mutex};

    /// Records every text the bot sends.
    #[derive(Default)]
    struct RecordingBot {
        sent: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Bot for RecordingBot {
        async fn call_api(&self, method: &str, params: Value) -> ApiResult<Value> {
            assert_eq!(method, "sendMessage");
            self.sent
                .lock()
                .unwrap()
                .push(params["text"].as_str().unwrap_or_default().to_string());
            Ok(json!({
                "message_id": 1,
                "date": 0,
                "chat": {"id": 7, "type": "private"}
            }))
        }
    }

    fn text_update(update_id: i64, text: &str) -> Update {
        serde_json::from_value(json!({
            "update_id": update_id,
            "message": {
                "message_id": update_id,
                "date": 0,
                "chat": {"id": 7, "type": "private"},
                "from": {"id": 7, "is_bot": false, "first_name": "Ada"},
                "text": text
            }
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn test_name_form_keeps_name_until_done() {
        let bot = Arc::new(RecordingBot::default());
        let mut dispatcher = Dispatcher::new(bot.clone());
        register_routes(&mut dispatcher);

        for (id, text) in [(1, "/name"), (2, "Ada"), (3, "old"), (4, "36"), (5, "hi")] {
            dispatcher.process_update(text_update(id, text)).await.unwrap();
        }

        let sent = bot.sent.lock().unwrap();
        assert_eq!(
            *sent,
            [
                "What is your name?",
                "Nice to meet you, Ada. How old are you?",
                "Please send your age as a number.",
                "Thanks, Ada! You are 36.",
                "hi",
            ]
        );
    }

    #[tokio::test]
    async fn test_cancel_leaves_form() {
        let bot = Arc::new(RecordingBot::default());
        let mut dispatcher = Dispatcher::new(bot.clone());
        register_routes(&mut dispatcher);

        for (id, text) in [(1, "/name"), (2, "/cancel"), (3, "Ada")] {
            dispatcher.process_update(text_update(id, text)).await.unwrap();
        }

        assert_eq!(
            *bot.sent.lock().unwrap(),
            ["What is your name?", "Cancelled.", "Ada"]
        );
    }
}
