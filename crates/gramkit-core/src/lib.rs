//! # gramkit core
//!
//! The event model and Bot API abstractions of the gramkit bot framework.
//!
//! ## Contents
//!
//! - **Types** ([`types`]): typed Bot API objects. [`Update`] is a tagged
//!   union over the update kinds, so a message update never also carries a
//!   callback query.
//! - **Keyboards** ([`keyboard`]): reply and inline markup plus a row builder.
//! - **Bot** ([`Bot`]): raw `call_api` plus typed methods (`send_message`,
//!   `get_updates`, `answer_callback_query`, forum topics, uploads...).
//! - **Update sink** ([`UpdateHandler`]): what inbound transports feed.
//!
//! ## Data flow
//!
//! ```text
//! ┌────────────┐  Update   ┌───────────────┐  calls   ┌─────────┐
//! │ transport  │──────────▶│ UpdateHandler │─────────▶│   Bot   │──▶ Bot API
//! │ (poll/hook)│           │ (dispatcher)  │          │         │
//! └────────────┘           └───────────────┘          └─────────┘
//! ```

pub mod bot;
pub mod error;
pub mod handler;
pub mod keyboard;
pub mod types;

pub use bot::{Bot, BoxedBot, GetUpdates, ParseMode, SendOptions, decode_result};
pub use error::{ApiError, ApiResult, BoxError, TransportError, TransportResult};
pub use handler::{BoxedUpdateHandler, UpdateHandler};
pub use keyboard::{
    InlineKeyboardButton, InlineKeyboardMarkup, KeyboardBuilder, KeyboardButton, ReplyKeyboardMarkup,
    ReplyKeyboardRemove, ReplyMarkup,
};
pub use types::{
    CallbackQuery, Chat, ChatId, ChatType, File, FileAttachment, ForumTopic, InputFile,
    InvoiceRequest, LabeledPrice, Location, MediaKind, MediaRef, Message, PreCheckoutQuery,
    SuccessfulPayment, Update, UpdateKind, User, Venue,
};
