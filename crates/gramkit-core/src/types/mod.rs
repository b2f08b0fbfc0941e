//! Typed models of the Bot API objects gramkit understands.
//!
//! Field names follow the wire format; optional fields model "absent on
//! this event". Unknown fields are ignored when decoding.

mod chat;
mod forum;
mod media;
mod message;
mod payment;
mod update;

pub use chat::{Chat, ChatId, ChatType, User};
pub use forum::{ForumTopic, WebhookInfo};
pub use media::{File, FileAttachment, InputFile, MediaKind, MediaRef, UnknownMediaKind};
pub use message::{
    CallbackQuery, Contact, Location, Message, MessageEntity, Venue, VideoChatEnded,
    VideoChatParticipantsInvited, VideoChatStarted,
};
pub use payment::{
    Invoice, InvoiceRequest, LabeledPrice, OrderInfo, PreCheckoutQuery, ShippingAddress,
    SuccessfulPayment,
};
pub use update::{Update, UpdateKind};
