//! The `Bot` trait: everything a handler can ask Telegram to do.
//!
//! Implementations only provide the raw transport primitives
//! ([`call_api`](Bot::call_api), [`call_multipart`](Bot::call_multipart),
//! [`download_file`](Bot::download_file)); the typed Bot API methods are
//! provided on top of them and decode the `result` field of the response.
//!
//! ```rust,ignore
//! use gramkit_core::{Bot, SendOptions};
//!
//! async fn greet(bot: &dyn Bot, chat_id: i64) -> gramkit_core::ApiResult<()> {
//!     bot.send_message(chat_id.into(), "Hello!", SendOptions::default()).await?;
//!     Ok(())
//! }
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};

use crate::error::{ApiError, ApiResult};
use crate::keyboard::ReplyMarkup;
use crate::types::{
    Chat, ChatId, File, ForumTopic, InputFile, InvoiceRequest, MediaKind, Message, Update, User,
    WebhookInfo,
};

/// Text formatting mode for outgoing messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ParseMode {
    #[serde(rename = "HTML")]
    Html,
    #[serde(rename = "Markdown")]
    Markdown,
    #[serde(rename = "MarkdownV2")]
    MarkdownV2,
}

/// Optional fields shared by the `send*` methods.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SendOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parse_mode: Option<ParseMode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_markup: Option<ReplyMarkup>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_to_message_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_thread_id: Option<i64>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub disable_notification: bool,
}

impl SendOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn parse_mode(mut self, mode: ParseMode) -> Self {
        self.parse_mode = Some(mode);
        self
    }

    pub fn reply_markup(mut self, markup: impl Into<ReplyMarkup>) -> Self {
        self.reply_markup = Some(markup.into());
        self
    }

    pub fn reply_to(mut self, message_id: i64) -> Self {
        self.reply_to_message_id = Some(message_id);
        self
    }

    /// Send into a forum topic.
    pub fn thread(mut self, thread_id: i64) -> Self {
        self.message_thread_id = Some(thread_id);
        self
    }

    pub fn silent(mut self) -> Self {
        self.disable_notification = true;
        self
    }
}

/// Parameters of `getUpdates`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GetUpdates {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    /// Long-polling timeout in seconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allowed_updates: Option<Vec<String>>,
}

/// Decodes the `result` of an API call into `T`.
pub fn decode_result<T: DeserializeOwned>(value: Value) -> ApiResult<T> {
    Ok(serde_json::from_value(value)?)
}

/// Builds a parameter object from a base object and a serializable extension.
fn with_options(mut base: Value, options: &impl Serialize) -> ApiResult<Value> {
    if let (Some(base), Value::Object(extra)) = (base.as_object_mut(), serde_json::to_value(options)?)
    {
        base.extend(extra);
    }
    Ok(base)
}

/// A handle to the Bot API.
#[async_trait]
pub trait Bot: Send + Sync {
    /// Calls `method` with a JSON parameter object and returns the `result` field.
    async fn call_api(&self, method: &str, params: Value) -> ApiResult<Value>;

    /// Calls `method` as a multipart upload with `file` in form field `field`.
    async fn call_multipart(
        &self,
        method: &str,
        params: Value,
        field: &str,
        file: InputFile,
    ) -> ApiResult<Value> {
        let _ = (params, field, file);
        Err(ApiError::NotSupported(method.to_string()))
    }

    /// Downloads a file previously resolved with [`get_file`](Bot::get_file).
    async fn download_file(&self, file_path: &str) -> ApiResult<Vec<u8>> {
        Err(ApiError::NotSupported(format!("download {file_path}")))
    }

    // =========================================================================
    // Typed API
    // =========================================================================

    async fn get_me(&self) -> ApiResult<User> {
        decode_result(self.call_api("getMe", json!({})).await?)
    }

    async fn get_updates(&self, params: &GetUpdates) -> ApiResult<Vec<Update>> {
        decode_result(self.call_api("getUpdates", serde_json::to_value(params)?).await?)
    }

    /// Fetches updates without decoding them, so one malformed update
    /// cannot fail the whole batch.
    async fn get_raw_updates(&self, params: &GetUpdates) -> ApiResult<Vec<Value>> {
        decode_result(self.call_api("getUpdates", serde_json::to_value(params)?).await?)
    }

    async fn send_message(
        &self,
        chat_id: ChatId,
        text: &str,
        options: SendOptions,
    ) -> ApiResult<Message> {
        let params = with_options(json!({"chat_id": chat_id, "text": text}), &options)?;
        decode_result(self.call_api("sendMessage", params).await?)
    }

    /// Uploads a file and sends it as `kind`.
    async fn send_media(
        &self,
        chat_id: ChatId,
        kind: MediaKind,
        file: InputFile,
        caption: Option<&str>,
        options: SendOptions,
    ) -> ApiResult<Message> {
        let mut params = with_options(json!({"chat_id": chat_id}), &options)?;
        if let (Some(caption), true) = (caption, kind.supports_caption()) {
            params["caption"] = Value::from(caption);
        }
        decode_result(
            self.call_multipart(kind.send_method(), params, kind.as_str(), file)
                .await?,
        )
    }

    async fn answer_callback_query(
        &self,
        callback_query_id: &str,
        text: Option<&str>,
        show_alert: bool,
    ) -> ApiResult<bool> {
        let mut params = json!({"callback_query_id": callback_query_id, "show_alert": show_alert});
        if let Some(text) = text {
            params["text"] = Value::from(text);
        }
        decode_result(self.call_api("answerCallbackQuery", params).await?)
    }

    /// Answers a pre-checkout query; `error_message` is required when `ok` is false.
    async fn answer_pre_checkout_query(
        &self,
        pre_checkout_query_id: &str,
        ok: bool,
        error_message: Option<&str>,
    ) -> ApiResult<bool> {
        let mut params = json!({"pre_checkout_query_id": pre_checkout_query_id, "ok": ok});
        if let Some(message) = error_message {
            params["error_message"] = Value::from(message);
        }
        decode_result(self.call_api("answerPreCheckoutQuery", params).await?)
    }

    async fn send_invoice(
        &self,
        chat_id: ChatId,
        invoice: &InvoiceRequest,
        options: SendOptions,
    ) -> ApiResult<Message> {
        let params = with_options(json!({"chat_id": chat_id}), invoice)?;
        let params = with_options(params, &options)?;
        decode_result(self.call_api("sendInvoice", params).await?)
    }

    async fn set_webhook(&self, url: &str, secret_token: Option<&str>) -> ApiResult<bool> {
        let mut params = json!({"url": url});
        if let Some(secret) = secret_token {
            params["secret_token"] = Value::from(secret);
        }
        decode_result(self.call_api("setWebhook", params).await?)
    }

    async fn delete_webhook(&self, drop_pending_updates: bool) -> ApiResult<bool> {
        decode_result(
            self.call_api(
                "deleteWebhook",
                json!({"drop_pending_updates": drop_pending_updates}),
            )
            .await?,
        )
    }

    async fn get_webhook_info(&self) -> ApiResult<WebhookInfo> {
        decode_result(self.call_api("getWebhookInfo", json!({})).await?)
    }

    async fn get_file(&self, file_id: &str) -> ApiResult<File> {
        decode_result(self.call_api("getFile", json!({"file_id": file_id})).await?)
    }

    async fn get_chat(&self, chat_id: ChatId) -> ApiResult<Chat> {
        decode_result(self.call_api("getChat", json!({"chat_id": chat_id})).await?)
    }

    // =========================================================================
    // Forum topics
    // =========================================================================

    async fn create_forum_topic(
        &self,
        chat_id: ChatId,
        name: &str,
        icon_color: Option<i64>,
        icon_custom_emoji_id: Option<&str>,
    ) -> ApiResult<ForumTopic> {
        let mut params = json!({"chat_id": chat_id, "name": name});
        if let Some(color) = icon_color {
            params["icon_color"] = Value::from(color);
        }
        if let Some(emoji) = icon_custom_emoji_id {
            params["icon_custom_emoji_id"] = Value::from(emoji);
        }
        decode_result(self.call_api("createForumTopic", params).await?)
    }

    async fn edit_forum_topic(
        &self,
        chat_id: ChatId,
        message_thread_id: i64,
        name: Option<&str>,
        icon_custom_emoji_id: Option<&str>,
    ) -> ApiResult<bool> {
        let mut params = json!({"chat_id": chat_id, "message_thread_id": message_thread_id});
        if let Some(name) = name {
            params["name"] = Value::from(name);
        }
        if let Some(emoji) = icon_custom_emoji_id {
            params["icon_custom_emoji_id"] = Value::from(emoji);
        }
        decode_result(self.call_api("editForumTopic", params).await?)
    }

    async fn close_forum_topic(&self, chat_id: ChatId, message_thread_id: i64) -> ApiResult<bool> {
        let params = json!({"chat_id": chat_id, "message_thread_id": message_thread_id});
        decode_result(self.call_api("closeForumTopic", params).await?)
    }

    async fn reopen_forum_topic(&self, chat_id: ChatId, message_thread_id: i64) -> ApiResult<bool> {
        let params = json!({"chat_id": chat_id, "message_thread_id": message_thread_id});
        decode_result(self.call_api("reopenForumTopic", params).await?)
    }

    async fn delete_forum_topic(&self, chat_id: ChatId, message_thread_id: i64) -> ApiResult<bool> {
        let params = json!({"chat_id": chat_id, "message_thread_id": message_thread_id});
        decode_result(self.call_api("deleteForumTopic", params).await?)
    }
}

/// A shared Bot trait object.
pub type BoxedBot = Arc<dyn Bot>;
