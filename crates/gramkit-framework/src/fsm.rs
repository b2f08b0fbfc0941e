//! Finite-state machine for multi-step conversations.
//!
//! Each `(user, chat)` pair has an optional [`State`] label plus a JSON data
//! map, kept in a [`Storage`] backend. Handlers receive an [`FsmContext`]
//! bound to the conversation of the current event, and message routes can be
//! gated on the current state with a [`StateFilter`].
//!
//! ```rust,ignore
//! let form = StateGroup::new("Form", ["name", "age"]);
//!
//! async fn ask_name(ctx: EventContext<Message>) -> Result<(), BoxError> {
//!     ctx.fsm().set_state(Some(form.state("name"))).await?;
//!     ctx.reply("What is your name?").await?;
//!     Ok(())
//! }
//!
//! dispatcher.register_handler(Route::new(got_name).state(form.state("name")));
//! ```

use std::borrow::Borrow;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::StorageResult;
use crate::storage::{BoxedStorage, StateData, StorageKey};

/// A conversation step label.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct State(String);

impl State {
    pub fn new(label: impl Into<String>) -> Self {
        Self(label.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for State {
    fn from(label: &str) -> Self {
        Self::new(label)
    }
}

impl From<String> for State {
    fn from(label: String) -> Self {
        Self(label)
    }
}

impl Borrow<str> for State {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// State requirement of a message route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StateFilter {
    /// Any state except "no state" (written `"*"`).
    Any,
    Exact(State),
}

impl StateFilter {
    pub fn matches(&self, current: Option<&State>) -> bool {
        match (self, current) {
            (Self::Any, current) => current.is_some(),
            (Self::Exact(required), Some(current)) => required == current,
            (Self::Exact(_), None) => false,
        }
    }
}

impl From<State> for StateFilter {
    fn from(state: State) -> Self {
        Self::Exact(state)
    }
}

impl From<&State> for StateFilter {
    fn from(state: &State) -> Self {
        Self::Exact(state.clone())
    }
}

impl From<&str> for StateFilter {
    fn from(label: &str) -> Self {
        if label == "*" {
            Self::Any
        } else {
            Self::Exact(State::new(label))
        }
    }
}

/// Related states of one conversation, labelled `"{group}:{name}"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateGroup {
    name: String,
    states: Vec<State>,
}

impl StateGroup {
    pub fn new<I, S>(name: impl Into<String>, states: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let name = name.into();
        let states = states
            .into_iter()
            .map(|s| State::new(format!("{name}:{}", s.as_ref())))
            .collect();
        Self { name, states }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The member called `name`, if the group has one.
    pub fn get(&self, name: &str) -> Option<&State> {
        let label = format!("{}:{name}", self.name);
        self.states.iter().find(|s| s.as_str() == label)
    }

    /// The label of member `name`, whether declared or not.
    pub fn state(&self, name: &str) -> State {
        self.get(name)
            .cloned()
            .unwrap_or_else(|| State::new(format!("{}:{name}", self.name)))
    }

    pub fn contains(&self, state: &State) -> bool {
        self.states.contains(state)
    }

    pub fn iter(&self) -> impl Iterator<Item = &State> {
        self.states.iter()
    }

    /// Whether `current` is a member of this group.
    pub fn is_active(&self, current: Option<&State>) -> bool {
        current.is_some_and(|s| self.contains(s))
    }
}

/// Conversation state of one `(user, chat)` pair.
///
/// Every write loads the stored record, changes it, and stores it back.
/// Concurrent updates for the same conversation can lose each other's
/// changes; the polling loop avoids this by handling updates one at a time.
#[derive(Clone)]
pub struct FsmContext {
    storage: BoxedStorage,
    key: StorageKey,
}

impl FsmContext {
    pub fn new(storage: BoxedStorage, key: StorageKey) -> Self {
        Self { storage, key }
    }

    pub fn key(&self) -> StorageKey {
        self.key
    }

    pub async fn get_state(&self) -> StorageResult<Option<State>> {
        Ok(self.storage.get_state(&self.key).await?.and_then(|r| r.state))
    }

    pub async fn set_state(&self, state: Option<State>) -> StorageResult<()> {
        self.storage.set_state(&self.key, state).await
    }

    pub async fn get_data(&self) -> StorageResult<StateData> {
        Ok(self
            .storage
            .get_state(&self.key)
            .await?
            .map(|r| r.data)
            .unwrap_or_default())
    }

    /// Replaces the whole data map.
    pub async fn set_data(&self, data: StateData) -> StorageResult<()> {
        self.storage.set_data(&self.key, data).await
    }

    /// Merges `entries` into the stored data; existing keys are overwritten.
    pub async fn update_data(
        &self,
        entries: impl IntoIterator<Item = (String, Value)> + Send,
    ) -> StorageResult<()> {
        let mut data = self.get_data().await?;
        data.extend(entries);
        self.set_data(data).await
    }

    pub async fn set(&self, key: impl Into<String>, value: impl Into<Value>) -> StorageResult<()> {
        let (key, value) = (key.into(), value.into());
        self.update_data([(key, value)]).await
    }

    pub async fn get(&self, key: &str) -> StorageResult<Option<Value>> {
        Ok(self.get_data().await?.remove(key))
    }

    /// Drops state and data.
    pub async fn clear(&self) -> StorageResult<()> {
        self.storage.clear(&self.key).await
    }

    /// Ends the conversation. Same as [`clear`](Self::clear).
    pub async fn finish(&self) -> StorageResult<()> {
        self.clear().await
    }
}

impl fmt::Debug for FsmContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FsmContext").field("key", &self.key).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;
    use serde_json::json;
    use std::sync::Arc;

    fn context() -> FsmContext {
        FsmContext::new(Arc::new(MemoryStorage::new()), StorageKey::new(1, 2))
    }

    #[tokio::test]
    async fn test_set_state_then_get() {
        let fsm = context();
        fsm.set_state(Some("S".into())).await.unwrap();
        assert_eq!(fsm.get_state().await.unwrap(), Some(State::new("S")));
        assert!(fsm.get_data().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_data_merges() {
        let fsm = context();
        fsm.update_data([("x".to_string(), json!(1))]).await.unwrap();
        fsm.update_data([("y".to_string(), json!(2))]).await.unwrap();
        assert_eq!(
            Value::Object(fsm.get_data().await.unwrap()),
            json!({"x": 1, "y": 2})
        );

        fsm.set("x", 10).await.unwrap();
        assert_eq!(fsm.get("x").await.unwrap(), Some(json!(10)));
        assert_eq!(fsm.get("missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_data_survives_state_change() {
        let fsm = context();
        fsm.set("name", "Ada").await.unwrap();
        fsm.set_state(Some("Form:age".into())).await.unwrap();
        assert_eq!(fsm.get("name").await.unwrap(), Some(json!("Ada")));
    }

    #[tokio::test]
    async fn test_clear_and_finish() {
        let fsm = context();
        fsm.set_state(Some("S".into())).await.unwrap();
        fsm.set("k", true).await.unwrap();
        fsm.clear().await.unwrap();
        assert_eq!(fsm.get_state().await.unwrap(), None);
        assert!(fsm.get_data().await.unwrap().is_empty());

        fsm.set_state(Some("S".into())).await.unwrap();
        fsm.finish().await.unwrap();
        assert_eq!(fsm.get_state().await.unwrap(), None);
    }

    #[test]
    fn test_state_filter() {
        let a = State::new("a");
        assert!(StateFilter::Any.matches(Some(&a)));
        assert!(!StateFilter::Any.matches(None));
        assert!(StateFilter::from("a").matches(Some(&a)));
        assert!(!StateFilter::from("b").matches(Some(&a)));
        assert!(!StateFilter::from("a").matches(None));
        assert_eq!(StateFilter::from("*"), StateFilter::Any);
    }

    #[test]
    fn test_state_group() {
        let form = StateGroup::new("Form", ["name", "age"]);
        assert_eq!(form.get("name"), Some(&State::new("Form:name")));
        assert_eq!(form.get("email"), None);
        assert!(form.contains(&form.state("age")));
        assert!(!form.contains(&State::new("Other:age")));
        assert_eq!(form.iter().count(), 2);

        assert!(form.is_active(Some(&State::new("Form:age"))));
        assert!(!form.is_active(None));
    }
}
