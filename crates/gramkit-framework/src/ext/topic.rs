//! Forum topic management with a per-chat cache.
//!
//! The Bot API has no call listing a group's topics, so [`TopicManager`]
//! remembers every topic it creates (or is told about through
//! [`TopicManager::remember`]) and serves lists and keyboards from that
//! cache.

use std::collections::{BTreeMap, HashMap};

use parking_lot::Mutex;
use tracing::{info, warn};

use crate::error::{ExtensionError, ExtensionResult};
use gramkit_core::{Bot, ForumTopic, InlineKeyboardButton, InlineKeyboardMarkup, Message};

/// Callback data of the placeholder button shown when no topic is known.
pub const NO_TOPICS_CALLBACK: &str = "topics_none";

/// A known topic and whether it is closed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedTopic {
    pub topic: ForumTopic,
    pub is_closed: bool,
}

#[derive(Debug)]
pub struct TopicManager {
    max_topics_per_group: usize,
    /// chat id → thread id → topic
    cache: Mutex<HashMap<i64, BTreeMap<i64, CachedTopic>>>,
}

impl Default for TopicManager {
    fn default() -> Self {
        Self::new(100)
    }
}

impl TopicManager {
    pub fn new(max_topics_per_group: usize) -> Self {
        Self {
            max_topics_per_group,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Creates a topic in a forum supergroup.
    ///
    /// Fails with [`ExtensionError::Invalid`] if the chat is not a forum and
    /// with [`ExtensionError::LimitReached`] once `max_topics_per_group`
    /// topics are known for it.
    pub async fn create_topic(
        &self,
        bot: &dyn Bot,
        chat_id: i64,
        name: &str,
        icon_color: Option<i64>,
        icon_custom_emoji_id: Option<&str>,
    ) -> ExtensionResult<ForumTopic> {
        let chat = bot.get_chat(chat_id.into()).await?;
        if !chat.is_forum {
            return Err(ExtensionError::invalid(format!("chat {chat_id} is not a forum")));
        }
        let known = self.cache.lock().get(&chat_id).map_or(0, BTreeMap::len);
        if known >= self.max_topics_per_group {
            warn!(chat_id, known, "Topic limit reached");
            return Err(ExtensionError::limit(format!(
                "chat {chat_id} already has {known} topics"
            )));
        }

        let topic = bot
            .create_forum_topic(chat_id.into(), name, icon_color, icon_custom_emoji_id)
            .await?;
        self.remember(chat_id, topic.clone());
        info!(chat_id, thread_id = topic.message_thread_id, name, "Topic created");
        Ok(topic)
    }

    /// Adds or replaces a topic in the cache.
    pub fn remember(&self, chat_id: i64, topic: ForumTopic) {
        self.cache.lock().entry(chat_id).or_default().insert(
            topic.message_thread_id,
            CachedTopic {
                topic,
                is_closed: false,
            },
        );
    }

    /// Renames a topic or changes its icon. Returns the API's answer.
    pub async fn edit_topic(
        &self,
        bot: &dyn Bot,
        chat_id: i64,
        thread_id: i64,
        name: Option<&str>,
        icon_custom_emoji_id: Option<&str>,
    ) -> ExtensionResult<bool> {
        if name.is_none() && icon_custom_emoji_id.is_none() {
            return Err(ExtensionError::invalid("nothing to edit"));
        }
        let edited = bot
            .edit_forum_topic(chat_id.into(), thread_id, name, icon_custom_emoji_id)
            .await?;
        if edited {
            self.with_cached(chat_id, thread_id, |cached| {
                if let Some(name) = name {
                    cached.topic.name = name.to_string();
                }
                if let Some(emoji) = icon_custom_emoji_id {
                    cached.topic.icon_custom_emoji_id = Some(emoji.to_string());
                }
            });
            info!(chat_id, thread_id, "Topic edited");
        }
        Ok(edited)
    }

    pub async fn close_topic(&self, bot: &dyn Bot, chat_id: i64, thread_id: i64) -> ExtensionResult<bool> {
        let closed = bot.close_forum_topic(chat_id.into(), thread_id).await?;
        if closed {
            self.with_cached(chat_id, thread_id, |cached| cached.is_closed = true);
            info!(chat_id, thread_id, "Topic closed");
        }
        Ok(closed)
    }

    pub async fn reopen_topic(&self, bot: &dyn Bot, chat_id: i64, thread_id: i64) -> ExtensionResult<bool> {
        let reopened = bot.reopen_forum_topic(chat_id.into(), thread_id).await?;
        if reopened {
            self.with_cached(chat_id, thread_id, |cached| cached.is_closed = false);
            info!(chat_id, thread_id, "Topic reopened");
        }
        Ok(reopened)
    }

    pub async fn delete_topic(&self, bot: &dyn Bot, chat_id: i64, thread_id: i64) -> ExtensionResult<bool> {
        let deleted = bot.delete_forum_topic(chat_id.into(), thread_id).await?;
        if deleted {
            let mut cache = self.cache.lock();
            if let Some(topics) = cache.get_mut(&chat_id) {
                topics.remove(&thread_id);
                if topics.is_empty() {
                    cache.remove(&chat_id);
                }
            }
            info!(chat_id, thread_id, "Topic deleted");
        }
        Ok(deleted)
    }

    /// Known topics of `chat_id`, ordered by thread id.
    pub fn topics(&self, chat_id: i64) -> Vec<CachedTopic> {
        self.cache
            .lock()
            .get(&chat_id)
            .map(|topics| topics.values().cloned().collect())
            .unwrap_or_default()
    }

    /// One button per known topic, with callback data `topic_{chat}_{thread}`.
    ///
    /// With no known topic the keyboard holds a single placeholder button.
    pub fn topic_keyboard(&self, chat_id: i64) -> InlineKeyboardMarkup {
        let rows: Vec<_> = self
            .topics(chat_id)
            .into_iter()
            .map(|cached| {
                vec![InlineKeyboardButton::callback(
                    cached.topic.name,
                    format!("topic_{chat_id}_{}", cached.topic.message_thread_id),
                )]
            })
            .collect();
        if rows.is_empty() {
            return InlineKeyboardMarkup::new(vec![vec![InlineKeyboardButton::callback(
                "No topics available",
                NO_TOPICS_CALLBACK,
            )]]);
        }
        InlineKeyboardMarkup::new(rows)
    }

    /// Whether `message` was posted inside a forum topic.
    pub fn is_topic_message(&self, message: &Message) -> bool {
        message.message_thread_id.is_some()
    }

    fn with_cached(&self, chat_id: i64, thread_id: i64, f: impl FnOnce(&mut CachedTopic)) {
        if let Some(cached) = self
            .cache
            .lock()
            .get_mut(&chat_id)
            .and_then(|topics| topics.get_mut(&thread_id))
        {
            f(cached);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use gramkit_core::ApiResult;
    use serde_json::{Value, json};
    use std::sync::Mutex as StdMutex;
    use std::sync::atomic::{AtomicI64, Ordering};

    /// A forum (or not) that numbers created topics from 10.
    struct ForumBot {
        is_forum: bool,
        next_thread: AtomicI64,
        calls: StdMutex<Vec<String>>,
    }

    impl ForumBot {
        fn new(is_forum: bool) -> Self {
            Self {
                is_forum,
                next_thread: AtomicI64::new(10),
                calls: StdMutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl Bot for ForumBot {
        async fn call_api(&self, method: &str, params: Value) -> ApiResult<Value> {
            self.calls.lock().unwrap().push(method.to_string());
            Ok(match method {
                "getChat" => json!({
                    "id": params["chat_id"],
                    "type": "supergroup",
                    "is_forum": self.is_forum
                }),
                "createForumTopic" => json!({
                    "message_thread_id": self.next_thread.fetch_add(1, Ordering::SeqCst),
                    "name": params["name"],
                    "icon_color": params.get("icon_color").cloned().unwrap_or(json!(7322096))
                }),
                _ => json!(true),
            })
        }
    }

    #[tokio::test]
    async fn test_create_requires_forum() {
        let bot = ForumBot::new(false);
        let topics = TopicManager::default();
        let err = topics.create_topic(&bot, -100, "News", None, None).await.unwrap_err();
        assert!(matches!(err, ExtensionError::Invalid(_)));
        assert_eq!(*bot.calls.lock().unwrap(), ["getChat"]);
    }

    #[tokio::test]
    async fn test_create_respects_limit() {
        let bot = ForumBot::new(true);
        let topics = TopicManager::new(2);
        topics.create_topic(&bot, -100, "One", None, None).await.unwrap();
        topics.create_topic(&bot, -100, "Two", Some(1), None).await.unwrap();
        let err = topics.create_topic(&bot, -100, "Three", None, None).await.unwrap_err();
        assert!(matches!(err, ExtensionError::LimitReached(_)));

        // The limit is per chat.
        topics.create_topic(&bot, -200, "Other", None, None).await.unwrap();
        assert_eq!(topics.topics(-100).len(), 2);
    }

    #[tokio::test]
    async fn test_cache_follows_api_calls() {
        let bot = ForumBot::new(true);
        let topics = TopicManager::default();
        let topic = topics.create_topic(&bot, -100, "News", None, None).await.unwrap();
        let thread = topic.message_thread_id;

        assert!(topics.edit_topic(&bot, -100, thread, Some("Updates"), None).await.unwrap());
        assert!(topics.close_topic(&bot, -100, thread).await.unwrap());
        let cached = &topics.topics(-100)[0];
        assert_eq!(cached.topic.name, "Updates");
        assert!(cached.is_closed);

        assert!(topics.reopen_topic(&bot, -100, thread).await.unwrap());
        assert!(!topics.topics(-100)[0].is_closed);

        assert!(matches!(
            topics.edit_topic(&bot, -100, thread, None, None).await,
            Err(ExtensionError::Invalid(_))
        ));

        assert!(topics.delete_topic(&bot, -100, thread).await.unwrap());
        assert!(topics.topics(-100).is_empty());
    }

    #[tokio::test]
    async fn test_topic_keyboard() {
        let bot = ForumBot::new(true);
        let topics = TopicManager::default();

        let empty = topics.topic_keyboard(-100);
        assert_eq!(
            empty.inline_keyboard[0][0].callback_data.as_deref(),
            Some(NO_TOPICS_CALLBACK)
        );

        topics.create_topic(&bot, -100, "A", None, None).await.unwrap();
        topics.create_topic(&bot, -100, "B", None, None).await.unwrap();
        let keyboard = topics.topic_keyboard(-100);
        assert_eq!(keyboard.inline_keyboard.len(), 2);
        assert_eq!(keyboard.inline_keyboard[0][0].text, "A");
        assert_eq!(
            keyboard.inline_keyboard[1][0].callback_data.as_deref(),
            Some("topic_-100_11")
        );
    }

    #[test]
    fn test_is_topic_message() {
        let topics = TopicManager::default();
        let message = |thread: Option<i64>| -> Message {
            serde_json::from_value(json!({
                "message_id": 1,
                "date": 0,
                "chat": {"id": -100, "type": "supergroup", "is_forum": true},
                "message_thread_id": thread
            }))
            .unwrap()
        };
        assert!(topics.is_topic_message(&message(Some(5))));
        assert!(!topics.is_topic_message(&message(None)));
    }
}
