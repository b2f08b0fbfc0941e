//! Update dispatcher for the gramkit framework.
//!
//! The [`Dispatcher`] owns the registered routes, the middleware chain and
//! the conversation-state storage. Every update goes through:
//!
//! 1. all middlewares, in registration order (an error drops the update)
//! 2. the route list of the update's kind, in registration order
//! 3. the **first** route whose filter and state requirement both match
//!
//! ```text
//!                 ┌────────────┐   ┌──────────────────────────────┐
//!   Update ──────▶│ middleware │──▶│ message / callback /         │──▶ handler
//!                 │   chain    │   │ pre-checkout routes (first   │
//!                 └────────────┘   │ match wins)                  │
//!                                  └──────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use gramkit_framework::{Dispatcher, Route, filter::Command};
//!
//! let mut dispatcher = Dispatcher::new(bot);
//! dispatcher.register_handler(Route::new(start).filter(Command::new("start")));
//! dispatcher.register_handler(Route::new(got_name).state("Form:name"));
//! dispatcher.register_callback_handler(Route::new(on_button));
//! ```
//!
//! # Tower Service Integration
//!
//! `Dispatcher` implements `tower::Service<Update>`, so layers such as a
//! timeout can wrap the whole pipeline:
//!
//! ```rust,ignore
//! let service = ServiceBuilder::new()
//!     .layer(TimeoutLayer::new(Duration::from_secs(10)))
//!     .service(dispatcher);
//! ```

use std::fmt;
use std::sync::Arc;
use std::task::{Context, Poll};

use async_trait::async_trait;
use tower::Service;
use tracing::{Instrument, debug, debug_span, error, trace};

use crate::error::{DispatchError, HandlerError};
use crate::filter::Filter;
use crate::fsm::{FsmContext, State, StateFilter};
use crate::handler::{BoxFuture, BoxedHandler, EventContext, Handler};
use crate::middleware::{BoxedMiddleware, Middleware};
use crate::storage::{BoxedStorage, MemoryStorage, StorageKey};
use gramkit_core::{
    BoxError, BoxedBot, CallbackQuery, Message, PreCheckoutQuery, Update, UpdateHandler,
    UpdateKind,
};

// =============================================================================
// Route
// =============================================================================

/// A handler plus the conditions under which it runs.
pub struct Route<E> {
    handler: BoxedHandler<E>,
    filter: Option<Arc<dyn Filter<E>>>,
    state: Option<StateFilter>,
    name: Option<String>,
}

impl<E: Send + 'static> Route<E> {
    pub fn new(handler: impl Handler<E>) -> Self {
        Self {
            handler: Arc::new(handler),
            filter: None,
            state: None,
            name: None,
        }
    }

    /// Sets the filter. Without one the route accepts every event.
    pub fn filter(mut self, filter: impl Filter<E> + 'static) -> Self {
        self.filter = Some(Arc::new(filter));
        self
    }

    /// Name used in logs.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn get_name(&self) -> &str {
        self.name.as_deref().unwrap_or("unnamed")
    }

    fn accepts(&self, event: &E) -> bool {
        self.filter.as_ref().is_none_or(|f| f.matches(event))
    }
}

impl Route<Message> {
    /// Only runs while the conversation is in `state`; `"*"` means any state.
    pub fn state(mut self, state: impl Into<StateFilter>) -> Self {
        self.state = Some(state.into());
        self
    }
}

impl<E> Clone for Route<E> {
    fn clone(&self) -> Self {
        Self {
            handler: Arc::clone(&self.handler),
            filter: self.filter.clone(),
            state: self.state.clone(),
            name: self.name.clone(),
        }
    }
}

impl<E> fmt::Debug for Route<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("name", &self.name)
            .field("has_filter", &self.filter.is_some())
            .field("state", &self.state)
            .finish()
    }
}

// =============================================================================
// Dispatcher
// =============================================================================

/// Routes updates to registered handlers.
///
/// Registration happens up front through `&mut self`; dispatch only needs
/// `&self`, so the dispatcher can be shared behind an `Arc` by the polling
/// loop and the webhook server alike.
#[derive(Clone)]
pub struct Dispatcher {
    bot: BoxedBot,
    storage: BoxedStorage,
    middlewares: Vec<BoxedMiddleware>,
    message_routes: Vec<Route<Message>>,
    callback_routes: Vec<Route<CallbackQuery>>,
    pre_checkout_routes: Vec<Route<PreCheckoutQuery>>,
}

impl Dispatcher {
    /// Creates a dispatcher with in-memory conversation state.
    pub fn new(bot: BoxedBot) -> Self {
        Self {
            bot,
            storage: Arc::new(MemoryStorage::new()),
            middlewares: Vec::new(),
            message_routes: Vec::new(),
            callback_routes: Vec::new(),
            pre_checkout_routes: Vec::new(),
        }
    }

    /// Replaces the conversation-state backend.
    pub fn with_storage(mut self, storage: BoxedStorage) -> Self {
        self.storage = storage;
        self
    }

    pub fn bot(&self) -> &BoxedBot {
        &self.bot
    }

    pub fn storage(&self) -> &BoxedStorage {
        &self.storage
    }

    /// Appends a message route. Earlier routes take priority.
    pub fn register_handler(&mut self, route: Route<Message>) {
        self.message_routes.push(route);
    }

    /// Appends a callback-query route. Earlier routes take priority.
    pub fn register_callback_handler(&mut self, route: Route<CallbackQuery>) {
        self.callback_routes.push(route);
    }

    /// Appends a pre-checkout-query route. Earlier routes take priority.
    pub fn register_pre_checkout_handler(&mut self, route: Route<PreCheckoutQuery>) {
        self.pre_checkout_routes.push(route);
    }

    pub fn register_middleware(&mut self, middleware: impl Middleware + 'static) {
        self.middlewares.push(Arc::new(middleware));
    }

    /// Total number of registered routes.
    pub fn route_count(&self) -> usize {
        self.message_routes.len() + self.callback_routes.len() + self.pre_checkout_routes.len()
    }

    /// Runs one update through the middlewares and routes.
    ///
    /// Returns whether a handler ran. A failing handler still counts as run:
    /// its error is logged here and not returned.
    pub async fn process_update(&self, update: Update) -> Result<bool, DispatchError> {
        let span = debug_span!(
            "dispatch",
            update_id = update.update_id,
            kind = update.kind.name()
        );
        async move {
            for middleware in &self.middlewares {
                middleware.process_update(&update).await?;
            }

            let update_id = update.update_id;
            match update.kind {
                UpdateKind::Message(message) => self.dispatch_message(update_id, message).await,
                UpdateKind::CallbackQuery(query) => {
                    let key = StorageKey::new(
                        query.from.id,
                        query.chat().map_or(query.from.id, |c| c.id),
                    );
                    Ok(self
                        .dispatch_simple(update_id, &self.callback_routes, query, key)
                        .await)
                }
                UpdateKind::PreCheckoutQuery(query) => {
                    let key = StorageKey::new(query.from.id, query.from.id);
                    Ok(self
                        .dispatch_simple(update_id, &self.pre_checkout_routes, query, key)
                        .await)
                }
                other => {
                    trace!(kind = other.name(), "No routes for update kind");
                    Ok(false)
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn dispatch_message(
        &self,
        update_id: i64,
        message: Message,
    ) -> Result<bool, DispatchError> {
        let key = StorageKey::new(message.sender_id().unwrap_or(message.chat.id), message.chat.id);
        // Loaded on first use by a state-gated route, then reused.
        let mut current: Option<Option<State>> = None;

        for route in &self.message_routes {
            if !route.accepts(&message) {
                continue;
            }
            if let Some(required) = &route.state {
                if current.is_none() {
                    let record = self.storage.get_state(&key).await?;
                    current = Some(record.and_then(|r| r.state));
                }
                let state = current.as_ref().and_then(Option::as_ref);
                if !required.matches(state) {
                    continue;
                }
            }

            self.run(update_id, route, message, key).await;
            return Ok(true);
        }

        debug!(chat_id = key.chat_id, "No message route matched");
        Ok(false)
    }

    async fn dispatch_simple<E: Send + 'static>(
        &self,
        update_id: i64,
        routes: &[Route<E>],
        event: E,
        key: StorageKey,
    ) -> bool {
        match routes.iter().find(|route| route.accepts(&event)) {
            Some(route) => {
                self.run(update_id, route, event, key).await;
                true
            }
            None => {
                debug!("No route matched");
                false
            }
        }
    }

    async fn run<E: Send + 'static>(
        &self,
        update_id: i64,
        route: &Route<E>,
        event: E,
        key: StorageKey,
    ) {
        debug!(route = route.get_name(), "Route matched");
        let fsm = FsmContext::new(Arc::clone(&self.storage), key);
        let ctx = EventContext::new(event, Arc::clone(&self.bot), fsm);

        if let Err(source) = route.handler.call(ctx).await {
            let err = HandlerError::new(route.get_name(), source);
            error!(error = %err, "Handler failed");
            for middleware in &self.middlewares {
                middleware.on_handler_error(update_id, &err).await;
            }
        }
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("middlewares", &self.middlewares.len())
            .field("message_routes", &self.message_routes.len())
            .field("callback_routes", &self.callback_routes.len())
            .field("pre_checkout_routes", &self.pre_checkout_routes.len())
            .finish()
    }
}

#[async_trait]
impl UpdateHandler for Dispatcher {
    async fn handle_update(&self, update: Update) -> Result<(), BoxError> {
        self.process_update(update).await?;
        Ok(())
    }
}

impl Service<Update> for Dispatcher {
    type Response = bool;
    type Error = DispatchError;
    type Future = BoxFuture<'static, Result<bool, DispatchError>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, update: Update) -> Self::Future {
        let dispatcher = self.clone();
        Box::pin(async move { dispatcher.process_update(update).await })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MiddlewareError;
    use crate::filter::{CallbackData, Command, Text};
    use crate::middleware::{AuthMiddleware, MetricsMiddleware};
    use gramkit_core::{ApiError, ApiResult, Bot};
    use serde_json::{Value, json};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tower::ServiceExt;

    struct MockBot;

    #[async_trait]
    impl Bot for MockBot {
        async fn call_api(&self, method: &str, _params: Value) -> ApiResult<Value> {
            Err(ApiError::NotSupported(method.to_string()))
        }
    }

    fn dispatcher() -> Dispatcher {
        Dispatcher::new(Arc::new(MockBot))
    }

    fn text_update(text: &str) -> Update {
        serde_json::from_value(json!({
            "update_id": 10,
            "message": {
                "message_id": 1,
                "date": 0,
                "chat": {"id": 5, "type": "private"},
                "from": {"id": 5, "is_bot": false, "first_name": "Ada"},
                "text": text
            }
        }))
        .unwrap()
    }

    fn callback_update(data: &str) -> Update {
        serde_json::from_value(json!({
            "update_id": 11,
            "callback_query": {
                "id": "q",
                "from": {"id": 5, "is_bot": false, "first_name": "Ada"},
                "chat_instance": "ci",
                "data": data
            }
        }))
        .unwrap()
    }

    /// A handler that adds `amount` to `counter`.
    fn counting<E: Send + 'static>(
        counter: &Arc<AtomicUsize>,
        amount: usize,
    ) -> impl Handler<E> + use<E> {
        let counter = Arc::clone(counter);
        move |_ctx: EventContext<E>| {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(amount, Ordering::SeqCst);
            }
        }
    }

    #[tokio::test]
    async fn test_dispatch_no_routes() {
        let handled = dispatcher().process_update(text_update("hi")).await.unwrap();
        assert!(!handled);
    }

    #[tokio::test]
    async fn test_first_match_stops_dispatch() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut dispatcher = dispatcher();
        dispatcher.register_handler(Route::new(counting(&counter, 100)).filter(Command::new("stop")));
        dispatcher.register_handler(Route::new(counting(&counter, 1)));
        dispatcher.register_handler(Route::new(counting(&counter, 10)));

        assert!(dispatcher.process_update(text_update("hi")).await.unwrap());
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_state_gating() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut dispatcher = dispatcher();
        dispatcher.register_handler(Route::new(counting(&counter, 1)).state("Form:name"));
        dispatcher.register_handler(Route::new(counting(&counter, 10)).state("*"));
        dispatcher.register_handler(Route::new(counting(&counter, 100)));

        // No state: only the ungated route runs.
        dispatcher.process_update(text_update("a")).await.unwrap();
        assert_eq!(counter.load(Ordering::SeqCst), 100);

        let key = StorageKey::new(5, 5);
        dispatcher
            .storage()
            .set_state(&key, Some(State::new("Form:age")))
            .await
            .unwrap();
        dispatcher.process_update(text_update("b")).await.unwrap();
        assert_eq!(counter.load(Ordering::SeqCst), 110);

        dispatcher
            .storage()
            .set_state(&key, Some(State::new("Form:name")))
            .await
            .unwrap();
        dispatcher.process_update(text_update("c")).await.unwrap();
        assert_eq!(counter.load(Ordering::SeqCst), 111);
    }

    #[tokio::test]
    async fn test_handler_sets_state_for_next_update() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut dispatcher = dispatcher();
        dispatcher.register_handler(
            Route::new(|ctx: EventContext<Message>| async move {
                ctx.fsm().set_state(Some("asked".into())).await
            })
            .filter(Command::new("ask")),
        );
        dispatcher.register_handler(Route::new(counting(&counter, 1)).state("asked"));

        dispatcher.process_update(text_update("/ask")).await.unwrap();
        dispatcher.process_update(text_update("answer")).await.unwrap();
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_handler_error_is_contained() {
        let metrics = Arc::new(MetricsMiddleware::new());
        let mut dispatcher = dispatcher();
        dispatcher.register_middleware(Arc::clone(&metrics));
        dispatcher.register_handler(
            Route::new(|_ctx: EventContext<Message>| async { Err::<(), _>("handler failed") })
                .filter(Text::new("x")),
        );
        dispatcher.register_handler(Route::new(|_ctx: EventContext<Message>| async {}));

        assert!(dispatcher.process_update(text_update("x")).await.unwrap());
        assert!(dispatcher.process_update(text_update("y")).await.unwrap());

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.messages, 2);
        assert_eq!(snapshot.errors, 1);
    }

    #[tokio::test]
    async fn test_callback_routes() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut dispatcher = dispatcher();
        dispatcher.register_handler(Route::new(counting(&counter, 100)));
        dispatcher.register_callback_handler(
            Route::new(counting(&counter, 1)).filter(CallbackData::new("yes")),
        );

        assert!(dispatcher.process_update(callback_update("yes")).await.unwrap());
        assert!(!dispatcher.process_update(callback_update("no")).await.unwrap());
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_middleware_rejection_skips_routes() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut dispatcher = dispatcher();
        dispatcher.register_middleware(AuthMiddleware::new([1]));
        dispatcher.register_handler(Route::new(counting(&counter, 1)));

        let err = dispatcher.process_update(text_update("x")).await.unwrap_err();
        assert!(matches!(
            err,
            DispatchError::Middleware(MiddlewareError::Unauthorized { user_id: Some(5) })
        ));
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_unrouted_kind_is_acknowledged() {
        let update: Update =
            serde_json::from_value(json!({"update_id": 1, "inline_query": {"id": "i"}})).unwrap();
        assert!(!dispatcher().process_update(update).await.unwrap());
    }

    #[tokio::test]
    async fn test_tower_service() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut dispatcher = dispatcher();
        dispatcher.register_handler(Route::new(counting(&counter, 1)).filter(Text::new("ping")));

        let handled = dispatcher.oneshot(text_update("ping")).await.unwrap();
        assert!(handled);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }
}
