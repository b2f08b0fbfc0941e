//! # gramkit
//!
//! An async, type-safe framework for Telegram bots.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐     ┌────────────┐     ┌───────────────────────────────┐
//! │  getUpdates  │────▶│            │     │ message routes    (first match)│──▶ handler
//! │   polling    │     │ Dispatcher │────▶│ callback routes   (first match)│──▶ handler
//! ├──────────────┤     │ middleware │     │ pre-checkout routes            │──▶ handler
//! │   webhook    │────▶│   chain    │     └───────────────────────────────┘
//! │   server     │     └────────────┘               │
//! └──────────────┘                                  ▼
//!                                          FSM storage (memory / Redis)
//! ```
//!
//! - **core**: Bot API types, the [`Bot`](core::Bot) trait and keyboards
//! - **transport**: the reqwest client and the axum webhook server
//! - **framework**: dispatcher, filters, middlewares, FSM and domain helpers
//! - **runtime**: configuration, logging and the run loop
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use gramkit::prelude::*;
//!
//! async fn start(ctx: EventContext<Message>) -> Result<(), BoxError> {
//!     ctx.reply("Hello!").await?;
//!     Ok(())
//! }
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let mut runtime = BotRuntime::builder().build().await?;
//!     runtime
//!         .dispatcher_mut()
//!         .register_handler(Route::new(start).filter(Command::new("start")));
//!     runtime.run().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - `toml-config` (default), `yaml-config`: configuration file formats
//! - `json-log`: JSON log output
//! - `redis-storage`: Redis-backed conversation state

pub use gramkit_core as core;
pub use gramkit_framework as framework;
pub use gramkit_runtime as runtime;
pub use gramkit_transport as transport;

/// Commonly used types for building bots.
///
/// ```rust,ignore
/// use gramkit::prelude::*;
/// ```
pub mod prelude {
    // Runtime - main entry point
    pub use gramkit_runtime::{BotRuntime, GramkitConfig, logging};

    // Routing
    pub use gramkit_framework::filter::{CallbackData, Command, MediaType, Text};
    pub use gramkit_framework::{
        Dispatcher, EventContext, Filter, FilterExt, FsmContext, Route, State, StateGroup,
    };

    // Middlewares
    pub use gramkit_framework::{
        AuthMiddleware, LoggingMiddleware, MetricsMiddleware, ThrottlingMiddleware,
    };

    // Bot API
    pub use gramkit_core::{
        Bot, BoxError, BoxedBot, CallbackQuery, InlineKeyboardButton, InlineKeyboardMarkup,
        KeyboardBuilder, Message, PreCheckoutQuery, ReplyMarkup, SendOptions, Update,
    };
}
