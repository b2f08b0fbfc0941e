use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{StateData, StateRecord, Storage, StorageKey};
use crate::error::StorageResult;
use crate::fsm::State;

/// Process-local storage backed by a map.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    records: Mutex<HashMap<StorageKey, StateRecord>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored conversations.
    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn get_state(&self, key: &StorageKey) -> StorageResult<Option<StateRecord>> {
        Ok(self.records.lock().get(key).cloned())
    }

    async fn set_state(&self, key: &StorageKey, state: Option<State>) -> StorageResult<()> {
        self.records.lock().entry(*key).or_default().state = state;
        Ok(())
    }

    async fn set_data(&self, key: &StorageKey, data: StateData) -> StorageResult<()> {
        self.records.lock().entry(*key).or_default().data = data;
        Ok(())
    }

    async fn clear(&self, key: &StorageKey) -> StorageResult<()> {
        self.records.lock().remove(key);
        Ok(())
    }

    async fn close(&self) -> StorageResult<()> {
        self.records.lock().clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio_test::assert_ok;

    #[tokio::test]
    async fn test_set_state_creates_record_with_empty_data() {
        let storage = MemoryStorage::new();
        let key = StorageKey::new(1, 2);

        assert_eq!(storage.get_state(&key).await.unwrap(), None);
        assert_ok!(storage.set_state(&key, Some(State::new("a"))).await);

        let record = storage.get_state(&key).await.unwrap().unwrap();
        assert_eq!(record.state, Some(State::new("a")));
        assert!(record.data.is_empty());
    }

    #[tokio::test]
    async fn test_set_data_keeps_state() {
        let storage = MemoryStorage::new();
        let key = StorageKey::new(1, 2);
        storage.set_state(&key, Some(State::new("a"))).await.unwrap();

        let mut data = StateData::new();
        data.insert("x".into(), json!(1));
        storage.set_data(&key, data.clone()).await.unwrap();

        let record = storage.get_state(&key).await.unwrap().unwrap();
        assert_eq!(record.state, Some(State::new("a")));
        assert_eq!(record.data, data);
    }

    #[tokio::test]
    async fn test_keys_are_independent_and_clear() {
        let storage = MemoryStorage::new();
        let a = StorageKey::new(1, 2);
        let b = StorageKey::new(1, 3);
        storage.set_state(&a, Some(State::new("a"))).await.unwrap();
        storage.set_state(&b, None).await.unwrap();
        assert_eq!(storage.len(), 2);

        storage.clear(&a).await.unwrap();
        assert_eq!(storage.get_state(&a).await.unwrap(), None);
        assert!(storage.get_state(&b).await.unwrap().is_some());
    }
}
