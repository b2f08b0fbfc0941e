//! Sink for decoded updates.
//!
//! Inbound transports (the webhook server, the polling loop) only need
//! something that accepts an [`Update`]; the dispatcher implements this
//! trait, tests can substitute a recorder.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::BoxError;
use crate::types::Update;

/// Receives updates from an inbound transport.
#[async_trait]
pub trait UpdateHandler: Send + Sync {
    /// Processes one update. An error means the update was dropped.
    async fn handle_update(&self, update: Update) -> Result<(), BoxError>;
}

/// A shared update handler trait object.
pub type BoxedUpdateHandler = Arc<dyn UpdateHandler>;

#[async_trait]
impl<T: UpdateHandler + ?Sized> UpdateHandler for Arc<T> {
    async fn handle_update(&self, update: Update) -> Result<(), BoxError> {
        (**self).handle_update(update).await
    }
}
