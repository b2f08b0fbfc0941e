//! Handlers and their context.
//!
//! A handler is any async function taking an [`EventContext<E>`] and
//! returning either `()` or `Result<(), E>` where `E` converts into a boxed
//! error:
//!
//! ```rust,ignore
//! async fn echo(ctx: EventContext<Message>) -> Result<(), BoxError> {
//!     if let Some(text) = &ctx.text {
//!         ctx.reply(text).await?;
//!     }
//!     Ok(())
//! }
//!
//! async fn log_only(ctx: EventContext<CallbackQuery>) {
//!     tracing::info!(data = ?ctx.data, "button pressed");
//! }
//! ```
//!
//! Errors are caught by the dispatcher and logged; they never stop the bot.

use std::future::Future;
use std::ops::Deref;
use std::pin::Pin;
use std::sync::Arc;

use gramkit_core::{
    ApiResult, BoxError, BoxedBot, CallbackQuery, Message, PreCheckoutQuery, SendOptions,
};

use crate::fsm::FsmContext;

/// A type alias for a boxed, pinned future that is `Send`.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// What a handler receives: the event, the bot and the conversation state.
///
/// Derefs to the event, so `ctx.text` reads the message text directly.
pub struct EventContext<E> {
    event: E,
    bot: BoxedBot,
    fsm: FsmContext,
}

impl<E> EventContext<E> {
    pub fn new(event: E, bot: BoxedBot, fsm: FsmContext) -> Self {
        Self { event, bot, fsm }
    }

    pub fn event(&self) -> &E {
        &self.event
    }

    pub fn into_event(self) -> E {
        self.event
    }

    pub fn bot(&self) -> &BoxedBot {
        &self.bot
    }

    /// State of the conversation this event belongs to.
    pub fn fsm(&self) -> &FsmContext {
        &self.fsm
    }
}

impl<E> Deref for EventContext<E> {
    type Target = E;

    fn deref(&self) -> &E {
        &self.event
    }
}

impl EventContext<Message> {
    /// Sends `text` to the chat of this message, in the same forum topic.
    pub async fn reply(&self, text: &str) -> ApiResult<Message> {
        self.reply_with(text, SendOptions::new()).await
    }

    pub async fn reply_with(&self, text: &str, mut options: SendOptions) -> ApiResult<Message> {
        if self.event.is_topic_message && options.message_thread_id.is_none() {
            options.message_thread_id = self.event.message_thread_id;
        }
        self.bot
            .send_message(self.event.chat.id.into(), text, options)
            .await
    }
}

impl EventContext<CallbackQuery> {
    /// Answers the query, optionally showing `text` as a notification.
    pub async fn answer(&self, text: Option<&str>) -> ApiResult<bool> {
        self.bot
            .answer_callback_query(&self.event.id, text, false)
            .await
    }
}

impl EventContext<PreCheckoutQuery> {
    pub async fn answer(&self, ok: bool, error_message: Option<&str>) -> ApiResult<bool> {
        self.bot
            .answer_pre_checkout_query(&self.event.id, ok, error_message)
            .await
    }
}

// ============================================================================
// Handler trait
// ============================================================================

/// Return types accepted from handlers.
pub trait HandlerOutcome: Send {
    fn into_result(self) -> Result<(), BoxError>;
}

impl HandlerOutcome for () {
    fn into_result(self) -> Result<(), BoxError> {
        Ok(())
    }
}

impl<T: Into<BoxError> + Send> HandlerOutcome for Result<(), T> {
    fn into_result(self) -> Result<(), BoxError> {
        self.map_err(Into::into)
    }
}

/// Something that can handle events of type `E`.
///
/// Implemented for every `Fn(EventContext<E>) -> impl Future` whose output is
/// a [`HandlerOutcome`].
pub trait Handler<E>: Send + Sync + 'static {
    fn call(&self, ctx: EventContext<E>) -> BoxFuture<'static, Result<(), BoxError>>;
}

impl<E, F, Fut> Handler<E> for F
where
    E: Send + 'static,
    F: Fn(EventContext<E>) -> Fut + Send + Sync + 'static,
    Fut: Future + Send + 'static,
    Fut::Output: HandlerOutcome,
{
    fn call(&self, ctx: EventContext<E>) -> BoxFuture<'static, Result<(), BoxError>> {
        let fut = (self)(ctx);
        Box::pin(async move { fut.await.into_result() })
    }
}

/// A type-erased handler that can be stored in collections.
pub type BoxedHandler<E> = Arc<dyn Handler<E>>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{MemoryStorage, StorageKey};
    use async_trait::async_trait;
    use gramkit_core::{ApiResult, Bot};
    use serde_json::{Value, json};
    use std::sync::Mutex;

    #[derive(Default)]
    struct MockBot {
        calls: Mutex<Vec<(String, Value)>>,
    }

    #[async_trait]
    impl Bot for MockBot {
        async fn call_api(&self, method: &str, params: Value) -> ApiResult<Value> {
            self.calls.lock().unwrap().push((method.to_string(), params));
            Ok(json!({
                "message_id": 9,
                "date": 0,
                "chat": {"id": -5, "type": "supergroup"}
            }))
        }
    }

    fn topic_message() -> Message {
        serde_json::from_value(json!({
            "message_id": 1,
            "date": 0,
            "chat": {"id": -5, "type": "supergroup", "is_forum": true},
            "message_thread_id": 77,
            "is_topic_message": true,
            "text": "hi"
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn test_reply_stays_in_topic() {
        let bot = Arc::new(MockBot::default());
        let fsm = FsmContext::new(Arc::new(MemoryStorage::new()), StorageKey::new(1, -5));
        let ctx = EventContext::new(topic_message(), bot.clone() as BoxedBot, fsm);

        assert_eq!(ctx.text.as_deref(), Some("hi"));
        ctx.reply("pong").await.unwrap();

        let calls = bot.calls.lock().unwrap();
        assert_eq!(calls[0].0, "sendMessage");
        assert_eq!(calls[0].1["chat_id"], -5);
        assert_eq!(calls[0].1["message_thread_id"], 77);
    }

    #[tokio::test]
    async fn test_closure_outcomes() {
        let bot: BoxedBot = Arc::new(MockBot::default());
        let storage = Arc::new(MemoryStorage::new());
        let ctx = || {
            EventContext::new(
                topic_message(),
                Arc::clone(&bot),
                FsmContext::new(storage.clone(), StorageKey::new(1, -5)),
            )
        };

        let unit = |_ctx: EventContext<Message>| async {};
        let failing = |_ctx: EventContext<Message>| async { Err::<(), _>("boom") };

        assert!(Handler::call(&unit, ctx()).await.is_ok());
        let err = Handler::call(&failing, ctx()).await.unwrap_err();
        assert_eq!(err.to_string(), "boom");
    }
}
