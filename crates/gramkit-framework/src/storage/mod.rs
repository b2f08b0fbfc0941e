//! Conversation-state storage.
//!
//! A backend keeps one [`StateRecord`] per `(user, chat)` pair. Records are
//! created on first write and removed by [`Storage::clear`].
//!
//! # Backends
//!
//! | Backend | Feature | Notes |
//! |---------|---------|-------|
//! | [`MemoryStorage`] | always | process-local, lost on restart |
//! | `RedisStorage` | `redis-storage` | one JSON value per key |
//!
//! # Persistent layout
//!
//! ```text
//! {prefix}:fsm:{user_id}:{chat_id}  ->  {"state": "Form:name" | null, "data": {...}}
//! ```

mod memory;
#[cfg(feature = "redis-storage")]
mod redis;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::StorageResult;
use crate::fsm::State;

pub use memory::MemoryStorage;
#[cfg(feature = "redis-storage")]
pub use self::redis::RedisStorage;

/// Default key prefix of persistent backends.
pub const DEFAULT_PREFIX: &str = "gramkit";

/// Free-form data attached to a conversation.
pub type StateData = Map<String, Value>;

/// Identifies one conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StorageKey {
    pub user_id: i64,
    pub chat_id: i64,
}

impl StorageKey {
    pub fn new(user_id: i64, chat_id: i64) -> Self {
        Self { user_id, chat_id }
    }

    /// The backend key under `prefix`.
    pub fn to_key(&self, prefix: &str) -> String {
        format!("{prefix}:fsm:{}:{}", self.user_id, self.chat_id)
    }
}

impl fmt::Display for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.user_id, self.chat_id)
    }
}

/// Stored state of one conversation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StateRecord {
    pub state: Option<State>,
    #[serde(default)]
    pub data: StateData,
}

/// A conversation-state backend.
///
/// Every method is a single backend round trip; callers that read and then
/// write (see [`FsmContext`](crate::fsm::FsmContext)) get no isolation from
/// concurrent writers of the same key.
#[async_trait]
pub trait Storage: Send + Sync {
    /// The record for `key`, or `None` if nothing was ever written.
    async fn get_state(&self, key: &StorageKey) -> StorageResult<Option<StateRecord>>;

    /// Sets the state label, creating the record with empty data if needed.
    async fn set_state(&self, key: &StorageKey, state: Option<State>) -> StorageResult<()>;

    /// Replaces the data, creating the record with no state if needed.
    async fn set_data(&self, key: &StorageKey, data: StateData) -> StorageResult<()>;

    /// Removes the record.
    async fn clear(&self, key: &StorageKey) -> StorageResult<()>;

    /// Releases backend resources.
    async fn close(&self) -> StorageResult<()> {
        Ok(())
    }
}

pub type BoxedStorage = Arc<dyn Storage>;
