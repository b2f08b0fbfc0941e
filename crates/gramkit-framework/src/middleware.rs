//! Update middleware.
//!
//! Middlewares run in registration order before any routing. Returning an
//! error stops the update: later middlewares and all handlers are skipped and
//! the error is reported by [`Dispatcher::process_update`](crate::Dispatcher::process_update).

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::{debug, info};

use crate::error::{HandlerError, MiddlewareError};
use gramkit_core::{Update, UpdateKind};

/// A hook that sees every update before routing.
#[async_trait]
pub trait Middleware: Send + Sync {
    async fn process_update(&self, update: &Update) -> Result<(), MiddlewareError>;

    /// Called after a handler failed on an update this middleware let through.
    async fn on_handler_error(&self, update_id: i64, error: &HandlerError) {
        let _ = (update_id, error);
    }
}

pub type BoxedMiddleware = Arc<dyn Middleware>;

#[async_trait]
impl<T: Middleware + ?Sized> Middleware for Arc<T> {
    async fn process_update(&self, update: &Update) -> Result<(), MiddlewareError> {
        (**self).process_update(update).await
    }

    async fn on_handler_error(&self, update_id: i64, error: &HandlerError) {
        (**self).on_handler_error(update_id, error).await
    }
}

/// Logs one structured record per update.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingMiddleware;

#[async_trait]
impl Middleware for LoggingMiddleware {
    async fn process_update(&self, update: &Update) -> Result<(), MiddlewareError> {
        info!(
            update_id = update.update_id,
            kind = update.kind.name(),
            user_id = update.sender().map(|u| u.id),
            chat_id = update.chat().map(|c| c.id),
            "Processing update"
        );
        Ok(())
    }
}

// =============================================================================
// Metrics
// =============================================================================

/// Point-in-time copy of [`MetricsMiddleware`] counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub total_updates: u64,
    pub messages: u64,
    pub callback_queries: u64,
    pub pre_checkout_queries: u64,
    pub other: u64,
    /// Updates whose handler returned an error.
    pub errors: u64,
}

/// Counts updates by kind, and handler failures.
#[derive(Debug, Default)]
pub struct MetricsMiddleware {
    total_updates: AtomicU64,
    messages: AtomicU64,
    callback_queries: AtomicU64,
    pre_checkout_queries: AtomicU64,
    other: AtomicU64,
    errors: AtomicU64,
}

impl MetricsMiddleware {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            total_updates: self.total_updates.load(Ordering::Relaxed),
            messages: self.messages.load(Ordering::Relaxed),
            callback_queries: self.callback_queries.load(Ordering::Relaxed),
            pre_checkout_queries: self.pre_checkout_queries.load(Ordering::Relaxed),
            other: self.other.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }
}

#[async_trait]
impl Middleware for MetricsMiddleware {
    async fn process_update(&self, update: &Update) -> Result<(), MiddlewareError> {
        self.total_updates.fetch_add(1, Ordering::Relaxed);
        let counter = match update.kind {
            UpdateKind::Message(_) => &self.messages,
            UpdateKind::CallbackQuery(_) => &self.callback_queries,
            UpdateKind::PreCheckoutQuery(_) => &self.pre_checkout_queries,
            _ => &self.other,
        };
        counter.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    async fn on_handler_error(&self, _update_id: i64, _error: &HandlerError) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }
}

// =============================================================================
// Throttling
// =============================================================================

/// Rejects updates that arrive less than `interval_secs` after the previous
/// accepted update of the same user.
///
/// Time is taken from the event's own `date`, so replayed or delayed updates
/// are judged by when they were sent. Updates without a sender or a date
/// pass unchecked.
#[derive(Debug)]
pub struct ThrottlingMiddleware {
    interval_secs: i64,
    last_seen: Mutex<HashMap<i64, i64>>,
}

impl ThrottlingMiddleware {
    pub fn new(interval_secs: i64) -> Self {
        Self {
            interval_secs,
            last_seen: Mutex::new(HashMap::new()),
        }
    }
}

impl Default for ThrottlingMiddleware {
    fn default() -> Self {
        Self::new(1)
    }
}

#[async_trait]
impl Middleware for ThrottlingMiddleware {
    async fn process_update(&self, update: &Update) -> Result<(), MiddlewareError> {
        let (Some(user), Some(date)) = (update.sender(), update.date()) else {
            return Ok(());
        };

        let mut last_seen = self.last_seen.lock();
        if let Some(previous) = last_seen.get(&user.id)
            && date - previous < self.interval_secs
        {
            debug!(user_id = user.id, "Update throttled");
            return Err(MiddlewareError::Throttled { user_id: user.id });
        }
        last_seen.insert(user.id, date);
        Ok(())
    }
}

// =============================================================================
// Auth
// =============================================================================

/// Only lets through updates from allow-listed users.
///
/// With an empty allow-list every update that has a sender passes. Updates
/// without a sender are always rejected.
#[derive(Debug, Clone, Default)]
pub struct AuthMiddleware {
    allowed_users: HashSet<i64>,
}

impl AuthMiddleware {
    pub fn new(allowed_users: impl IntoIterator<Item = i64>) -> Self {
        Self {
            allowed_users: allowed_users.into_iter().collect(),
        }
    }

    pub fn allow(&mut self, user_id: i64) {
        self.allowed_users.insert(user_id);
    }
}

#[async_trait]
impl Middleware for AuthMiddleware {
    async fn process_update(&self, update: &Update) -> Result<(), MiddlewareError> {
        let Some(user) = update.sender() else {
            return Err(MiddlewareError::Unauthorized { user_id: None });
        };
        if !self.allowed_users.is_empty() && !self.allowed_users.contains(&user.id) {
            debug!(user_id = user.id, "Update from user outside allow-list");
            return Err(MiddlewareError::Unauthorized {
                user_id: Some(user.id),
            });
        }
        Ok(())
    }
}
