use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use tracing::{debug, info};

use super::{DEFAULT_PREFIX, StateData, StateRecord, Storage, StorageKey};
use crate::error::StorageResult;
use crate::fsm::State;

/// Redis backend storing each record as one JSON string.
///
/// Updates are read-modify-write without `WATCH`, so two writers of the same
/// key may overwrite each other's change.
#[derive(Clone)]
pub struct RedisStorage {
    conn: ConnectionManager,
    prefix: String,
}

impl RedisStorage {
    /// Connects to `url` (e.g. `redis://127.0.0.1/`) using the default prefix.
    pub async fn connect(url: &str) -> StorageResult<Self> {
        Self::connect_with_prefix(url, DEFAULT_PREFIX).await
    }

    pub async fn connect_with_prefix(url: &str, prefix: impl Into<String>) -> StorageResult<Self> {
        let client = redis::Client::open(url)?;
        let conn = ConnectionManager::new(client).await?;
        let prefix = prefix.into();
        info!(prefix = %prefix, "Connected to redis storage");
        Ok(Self { conn, prefix })
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    async fn load(&self, key: &str) -> StorageResult<Option<StateRecord>> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn.get(key).await?;
        match raw {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    async fn save(&self, key: &str, record: &StateRecord) -> StorageResult<()> {
        let mut conn = self.conn.clone();
        let json = serde_json::to_string(record)?;
        conn.set::<_, _, ()>(key, json).await?;
        Ok(())
    }
}

#[async_trait]
impl Storage for RedisStorage {
    async fn get_state(&self, key: &StorageKey) -> StorageResult<Option<StateRecord>> {
        self.load(&key.to_key(&self.prefix)).await
    }

    async fn set_state(&self, key: &StorageKey, state: Option<State>) -> StorageResult<()> {
        let key = key.to_key(&self.prefix);
        let mut record = self.load(&key).await?.unwrap_or_default();
        record.state = state;
        self.save(&key, &record).await
    }

    async fn set_data(&self, key: &StorageKey, data: StateData) -> StorageResult<()> {
        let key = key.to_key(&self.prefix);
        let mut record = self.load(&key).await?.unwrap_or_default();
        record.data = data;
        self.save(&key, &record).await
    }

    async fn clear(&self, key: &StorageKey) -> StorageResult<()> {
        let mut conn = self.conn.clone();
        conn.del::<_, ()>(key.to_key(&self.prefix)).await?;
        Ok(())
    }

    async fn close(&self) -> StorageResult<()> {
        // The manager closes its connection when the last clone is dropped.
        debug!(prefix = %self.prefix, "Redis storage closed");
        Ok(())
    }
}

impl std::fmt::Debug for RedisStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisStorage")
            .field("prefix", &self.prefix)
            .finish_non_exhaustive()
    }
}
