//! Expiring per-user stories.
//!
//! Stories live in memory only. Every read filters out expired entries;
//! [`StoryHandler::cleanup_expired`] reclaims their memory and is meant to be
//! called periodically.
//!
//! Methods that depend on the clock have an `_at` variant taking the current
//! time explicitly.

use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, TimeDelta, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{ExtensionError, ExtensionResult};
use gramkit_core::{InlineKeyboardButton, InlineKeyboardMarkup, MediaKind, Message};

/// One story and its interactions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Story {
    pub id: String,
    pub user_id: i64,
    pub kind: MediaKind,
    pub file_id: String,
    pub caption: Option<String>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    viewers: BTreeSet<i64>,
    likers: BTreeSet<i64>,
}

impl Story {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    /// Distinct users who viewed the story.
    pub fn views(&self) -> usize {
        self.viewers.len()
    }

    /// Distinct users who liked the story.
    pub fn likes(&self) -> usize {
        self.likers.len()
    }
}

/// Per-user story lists.
#[derive(Debug, Default)]
pub struct StoryCache {
    by_user: Mutex<HashMap<i64, Vec<Story>>>,
}

impl StoryCache {
    fn active(&self, user_id: i64, now: DateTime<Utc>) -> Vec<Story> {
        self.by_user
            .lock()
            .get(&user_id)
            .map(|stories| {
                stories
                    .iter()
                    .filter(|s| !s.is_expired_at(now))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    fn update<T>(
        &self,
        user_id: i64,
        story_id: &str,
        now: DateTime<Utc>,
        f: impl FnOnce(&mut Story) -> T,
    ) -> Option<T> {
        let mut by_user = self.by_user.lock();
        by_user
            .get_mut(&user_id)?
            .iter_mut()
            .find(|s| s.id == story_id && !s.is_expired_at(now))
            .map(f)
    }
}

/// Counts returned by [`StoryHandler::stats`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoryStats {
    /// Stories still held in memory, expired or not.
    pub total: usize,
    pub active: usize,
    pub expired: usize,
    /// Active stories per allowed kind.
    pub by_kind: Vec<(MediaKind, usize)>,
}

#[derive(Debug)]
pub struct StoryHandler {
    max_stories_per_user: usize,
    story_duration: TimeDelta,
    allowed_kinds: Vec<MediaKind>,
    cache: StoryCache,
}

impl Default for StoryHandler {
    fn default() -> Self {
        Self {
            max_stories_per_user: 10,
            story_duration: TimeDelta::hours(24),
            allowed_kinds: vec![MediaKind::Photo, MediaKind::Video, MediaKind::Animation],
            cache: StoryCache::default(),
        }
    }
}

impl StoryHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max_stories_per_user(mut self, max: usize) -> Self {
        self.max_stories_per_user = max;
        self
    }

    pub fn story_duration(mut self, duration: TimeDelta) -> Self {
        self.story_duration = duration;
        self
    }

    pub fn allowed_kinds(mut self, kinds: impl IntoIterator<Item = MediaKind>) -> Self {
        self.allowed_kinds = kinds.into_iter().collect();
        self
    }

    pub fn is_allowed(&self, kind: MediaKind) -> bool {
        self.allowed_kinds.contains(&kind)
    }

    pub fn create_story(
        &self,
        user_id: i64,
        kind: MediaKind,
        file_id: impl Into<String>,
        caption: Option<String>,
    ) -> ExtensionResult<Story> {
        self.create_story_at(Utc::now(), user_id, kind, file_id, caption)
    }

    /// Adds a story unless the kind is not allowed or the user already has
    /// `max_stories_per_user` active stories.
    pub fn create_story_at(
        &self,
        now: DateTime<Utc>,
        user_id: i64,
        kind: MediaKind,
        file_id: impl Into<String>,
        caption: Option<String>,
    ) -> ExtensionResult<Story> {
        if !self.is_allowed(kind) {
            return Err(ExtensionError::invalid(format!("{kind} stories are not allowed")));
        }

        let mut by_user = self.cache.by_user.lock();
        let stories = by_user.entry(user_id).or_default();
        let active = stories.iter().filter(|s| !s.is_expired_at(now)).count();
        if active >= self.max_stories_per_user {
            return Err(ExtensionError::limit(format!(
                "user {user_id} already has {active} stories"
            )));
        }

        let story = Story {
            id: Uuid::new_v4().to_string(),
            user_id,
            kind,
            file_id: file_id.into(),
            caption,
            created_at: now,
            expires_at: now + self.story_duration,
            viewers: BTreeSet::new(),
            likers: BTreeSet::new(),
        };
        stories.push(story.clone());
        info!(user_id, story_id = %story.id, %kind, "Story created");
        Ok(story)
    }

    /// Creates a story from the first allowed attachment of `message`,
    /// using its caption.
    pub fn create_story_from_message(&self, message: &Message) -> ExtensionResult<Story> {
        let user_id = message
            .sender_id()
            .ok_or_else(|| ExtensionError::invalid("message has no sender"))?;
        let (kind, file) = self
            .allowed_kinds
            .iter()
            .find_map(|&kind| message.media_of(kind).map(|file| (kind, file)))
            .ok_or_else(|| ExtensionError::invalid("message has no story media"))?;
        self.create_story(user_id, kind, file.file_id.clone(), message.caption.clone())
    }

    /// Active stories of `user_id`, oldest first.
    pub fn user_stories(&self, user_id: i64) -> Vec<Story> {
        self.cache.active(user_id, Utc::now())
    }

    pub fn user_stories_at(&self, now: DateTime<Utc>, user_id: i64) -> Vec<Story> {
        self.cache.active(user_id, now)
    }

    pub fn get_story(&self, user_id: i64, story_id: &str) -> Option<Story> {
        self.cache
            .update(user_id, story_id, Utc::now(), |story| story.clone())
    }

    /// Removes a story. Returns `false` when it did not exist.
    pub fn delete_story(&self, user_id: i64, story_id: &str) -> bool {
        let mut by_user = self.cache.by_user.lock();
        let Some(stories) = by_user.get_mut(&user_id) else {
            return false;
        };
        let before = stories.len();
        stories.retain(|s| s.id != story_id);
        let deleted = stories.len() < before;
        if stories.is_empty() {
            by_user.remove(&user_id);
        }
        if deleted {
            info!(user_id, story_id, "Story deleted");
        }
        deleted
    }

    /// Records a view by `viewer_id` and returns the distinct view count.
    pub fn record_view(&self, user_id: i64, story_id: &str, viewer_id: i64) -> ExtensionResult<usize> {
        self.cache
            .update(user_id, story_id, Utc::now(), |story| {
                story.viewers.insert(viewer_id);
                story.views()
            })
            .ok_or_else(|| ExtensionError::not_found(format!("story {story_id}")))
    }

    /// Records a like by `liker_id` and returns the distinct like count.
    pub fn like_story(&self, user_id: i64, story_id: &str, liker_id: i64) -> ExtensionResult<usize> {
        self.cache
            .update(user_id, story_id, Utc::now(), |story| {
                story.likers.insert(liker_id);
                story.likes()
            })
            .ok_or_else(|| ExtensionError::not_found(format!("story {story_id}")))
    }

    /// View, like and share buttons, plus delete when `viewer_id` owns the
    /// story.
    ///
    /// Callback data is `{action}_story_{owner}_{story_id}`.
    pub fn story_keyboard(&self, story: &Story, viewer_id: i64) -> InlineKeyboardMarkup {
        let data = |action: &str| format!("{action}_story_{}_{}", story.user_id, story.id);
        let mut rows = vec![vec![
            InlineKeyboardButton::callback("👁 View Story", data("view")),
            InlineKeyboardButton::callback("❤️ Like", data("like")),
            InlineKeyboardButton::callback("🔄 Share", data("share")),
        ]];
        if viewer_id == story.user_id {
            rows.push(vec![InlineKeyboardButton::callback("🗑 Delete", data("delete"))]);
        }
        InlineKeyboardMarkup::new(rows)
    }

    pub fn stats(&self, user_id: i64) -> StoryStats {
        self.stats_at(Utc::now(), user_id)
    }

    pub fn stats_at(&self, now: DateTime<Utc>, user_id: i64) -> StoryStats {
        let by_user = self.cache.by_user.lock();
        let stories = by_user.get(&user_id).map(Vec::as_slice).unwrap_or_default();
        let active: Vec<&Story> = stories.iter().filter(|s| !s.is_expired_at(now)).collect();

        StoryStats {
            total: stories.len(),
            active: active.len(),
            expired: stories.len() - active.len(),
            by_kind: self
                .allowed_kinds
                .iter()
                .map(|&kind| (kind, active.iter().filter(|s| s.kind == kind).count()))
                .collect(),
        }
    }

    /// Drops expired stories. Returns how many were removed.
    pub fn cleanup_expired(&self) -> usize {
        self.cleanup_expired_at(Utc::now())
    }

    pub fn cleanup_expired_at(&self, now: DateTime<Utc>) -> usize {
        let mut by_user = self.cache.by_user.lock();
        let mut removed = 0;
        by_user.retain(|_, stories| {
            let before = stories.len();
            stories.retain(|s| !s.is_expired_at(now));
            removed += before - stories.len();
            !stories.is_empty()
        });
        debug!(removed, "Expired stories cleaned up");
        removed
    }

    pub fn format_story_message(&self, story: &Story) -> String {
        let mut message = format!(
            "📱 Story by {}\nType: {}\nCreated: {}\nExpires: {}\n",
            story.user_id,
            story.kind,
            story.created_at.format("%Y-%m-%d %H:%M:%S UTC"),
            story.expires_at.format("%Y-%m-%d %H:%M:%S UTC"),
        );
        if let Some(caption) = &story.caption {
            message.push_str("\nCaption: ");
            message.push_str(caption);
        }
        message
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_create_respects_kind_and_limit() {
        let stories = StoryHandler::new().max_stories_per_user(2);

        let err = stories
            .create_story_at(t0(), 1, MediaKind::Document, "f", None)
            .unwrap_err();
        assert!(matches!(err, ExtensionError::Invalid(_)));

        stories.create_story_at(t0(), 1, MediaKind::Photo, "a", None).unwrap();
        stories.create_story_at(t0(), 1, MediaKind::Video, "b", None).unwrap();
        let err = stories
            .create_story_at(t0(), 1, MediaKind::Photo, "c", None)
            .unwrap_err();
        assert!(matches!(err, ExtensionError::LimitReached(_)));

        // Expired stories no longer count against the limit.
        let later = t0() + TimeDelta::hours(25);
        stories.create_story_at(later, 1, MediaKind::Photo, "c", None).unwrap();
        assert_eq!(stories.user_stories_at(later, 1).len(), 1);
    }

    #[test]
    fn test_expiry_and_cleanup() {
        let stories = StoryHandler::new().story_duration(TimeDelta::minutes(10));
        let story = stories
            .create_story_at(t0(), 7, MediaKind::Photo, "a", Some("hi".into()))
            .unwrap();
        assert_eq!(story.expires_at, t0() + TimeDelta::minutes(10));

        let stats = stories.stats_at(t0() + TimeDelta::minutes(11), 7);
        assert_eq!((stats.total, stats.active, stats.expired), (1, 0, 1));

        assert_eq!(stories.cleanup_expired_at(t0() + TimeDelta::minutes(5)), 0);
        assert_eq!(stories.cleanup_expired_at(t0() + TimeDelta::minutes(10)), 1);
        assert_eq!(stories.stats_at(t0(), 7).total, 0);
    }

    #[test]
    fn test_views_and_likes_are_distinct() {
        let stories = StoryHandler::new();
        let story = stories.create_story(1, MediaKind::Photo, "a", None).unwrap();

        assert_eq!(stories.record_view(1, &story.id, 2).unwrap(), 1);
        assert_eq!(stories.record_view(1, &story.id, 2).unwrap(), 1);
        assert_eq!(stories.record_view(1, &story.id, 3).unwrap(), 2);
        assert_eq!(stories.like_story(1, &story.id, 3).unwrap(), 1);

        let stored = stories.get_story(1, &story.id).unwrap();
        assert_eq!((stored.views(), stored.likes()), (2, 1));

        assert!(matches!(
            stories.like_story(1, "missing", 3),
            Err(ExtensionError::NotFound(_))
        ));
    }

    #[test]
    fn test_delete_story() {
        let stories = StoryHandler::new();
        let story = stories.create_story(1, MediaKind::Photo, "a", None).unwrap();
        assert!(!stories.delete_story(1, "other"));
        assert!(!stories.delete_story(2, &story.id));
        assert!(stories.delete_story(1, &story.id));
        assert!(stories.user_stories(1).is_empty());
    }

    #[test]
    fn test_keyboard_and_format() {
        let stories = StoryHandler::new();
        let story = stories
            .create_story_at(t0(), 1, MediaKind::Video, "a", Some("sunset".into()))
            .unwrap();

        let owner = stories.story_keyboard(&story, 1);
        assert_eq!(owner.inline_keyboard.len(), 2);
        assert_eq!(
            owner.inline_keyboard[1][0].callback_data,
            Some(format!("delete_story_1_{}", story.id))
        );
        assert_eq!(stories.story_keyboard(&story, 2).inline_keyboard.len(), 1);

        assert_eq!(
            stories.format_story_message(&story),
            "📱 Story by 1\nType: video\nCreated: 2024-05-01 12:00:00 UTC\n\
             Expires: 2024-05-02 12:00:00 UTC\n\nCaption: sunset"
        );
    }

    #[test]
    fn test_from_message_and_stats() {
        let stories = StoryHandler::new();
        let message: Message = serde_json::from_value(json!({
            "message_id": 1,
            "date": 0,
            "chat": {"id": 4, "type": "private"},
            "from": {"id": 4, "is_bot": false, "first_name": "S"},
            "caption": "look",
            "video": {"file_id": "vid", "file_unique_id": "v"}
        }))
        .unwrap();
        let story = stories.create_story_from_message(&message).unwrap();
        assert_eq!((story.kind, story.file_id.as_str()), (MediaKind::Video, "vid"));
        assert_eq!(story.caption.as_deref(), Some("look"));

        let stats = stories.stats(4);
        assert!(stats.by_kind.contains(&(MediaKind::Video, 1)));
        assert!(stats.by_kind.contains(&(MediaKind::Photo, 0)));
    }
}
