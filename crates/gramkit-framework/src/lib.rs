//! # gramkit framework
//!
//! Routing and conversation tooling on top of `gramkit-core`.
//!
//! This layer provides:
//! - A [`Dispatcher`] with a middleware chain and first-match routes for
//!   messages, callback queries and pre-checkout queries
//! - Composable synchronous [`filter`]s (`Command`, `Text`, `CallbackData`...)
//! - A finite-state machine ([`fsm`]) over pluggable [`storage`] backends
//! - Long polling ([`PollingConfig`], [`Dispatcher::run_polling`])
//! - Domain helpers in [`ext`]: media, location, payments, stories, video
//!   chat moderation and forum topics
//!
//! ## Feature Flags
//!
//! - `redis-storage` - [`RedisStorage`](storage::RedisStorage) backend

pub mod dispatcher;
pub mod error;
pub mod ext;
pub mod filter;
pub mod fsm;
pub mod handler;
pub mod middleware;
pub mod polling;
pub mod storage;

pub use dispatcher::{Dispatcher, Route};
pub use error::{
    DispatchError, ExtensionError, ExtensionResult, HandlerError, MiddlewareError, StorageError,
    StorageResult,
};
pub use filter::{Filter, FilterExt};
pub use fsm::{FsmContext, State, StateFilter, StateGroup};
pub use handler::{BoxFuture, BoxedHandler, EventContext, Handler, HandlerOutcome};
pub use middleware::{
    AuthMiddleware, BoxedMiddleware, LoggingMiddleware, MetricsMiddleware, MetricsSnapshot,
    Middleware, ThrottlingMiddleware,
};
pub use polling::PollingConfig;
pub use storage::{BoxedStorage, MemoryStorage, StateData, StateRecord, Storage, StorageKey};
