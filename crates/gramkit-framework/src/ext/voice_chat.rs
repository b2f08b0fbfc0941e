//! Video chat bookkeeping and moderation.
//!
//! Sessions are tracked from the service messages Telegram posts when a
//! video chat starts, ends or invites users; feed every group message to
//! [`VoiceChatHandler::observe`]. Mutes and warnings are recorded here only;
//! enforcing them (restricting the member, deleting messages) is left to the
//! caller.

use std::collections::{BTreeSet, HashMap, HashSet};

use chrono::{DateTime, TimeDelta, Utc};
use parking_lot::Mutex;
use tracing::{info, warn};

use crate::error::{ExtensionError, ExtensionResult};
use gramkit_core::{InlineKeyboardButton, InlineKeyboardMarkup, Message};

/// Video chat change reported by [`VoiceChatHandler::observe`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VoiceChatEvent {
    Started,
    Ended { duration_secs: u64 },
    /// Users recorded as participants; invitees over the limit are left out.
    Invited { user_ids: Vec<i64> },
}

/// Result of [`VoiceChatHandler::warn_user`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Warning {
    pub count: u32,
    /// `count` reached the configured threshold.
    pub threshold_reached: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoiceChatStats {
    pub is_active: bool,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub participants: usize,
    pub muted_users: usize,
    pub warned_users: usize,
}

#[derive(Debug)]
struct Session {
    started_at: DateTime<Utc>,
    ended_at: Option<DateTime<Utc>>,
    participants: BTreeSet<i64>,
}

impl Session {
    fn is_active(&self) -> bool {
        self.ended_at.is_none()
    }
}

#[derive(Debug, Default)]
struct Moderation {
    sessions: HashMap<i64, Session>,
    /// `(chat, user)` → end of the mute.
    mutes: HashMap<(i64, i64), DateTime<Utc>>,
    warnings: HashMap<(i64, i64), u32>,
    moderators: HashSet<i64>,
    banned_words: Vec<String>,
}

#[derive(Debug)]
pub struct VoiceChatHandler {
    max_participants: usize,
    mute_timeout: TimeDelta,
    warn_threshold: u32,
    state: Mutex<Moderation>,
}

impl Default for VoiceChatHandler {
    fn default() -> Self {
        Self {
            max_participants: 100,
            mute_timeout: TimeDelta::minutes(5),
            warn_threshold: 3,
            state: Mutex::new(Moderation::default()),
        }
    }
}

impl VoiceChatHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max_participants(mut self, max: usize) -> Self {
        self.max_participants = max;
        self
    }

    /// Mute length used when [`mute_user`](Self::mute_user) gets none.
    pub fn mute_timeout(mut self, timeout: TimeDelta) -> Self {
        self.mute_timeout = timeout;
        self
    }

    pub fn warn_threshold(mut self, threshold: u32) -> Self {
        self.warn_threshold = threshold;
        self
    }

    // =========================================================================
    // Moderators and banned words
    // =========================================================================

    pub fn is_moderator(&self, user_id: i64) -> bool {
        self.state.lock().moderators.contains(&user_id)
    }

    pub fn add_moderator(&self, user_id: i64) {
        self.state.lock().moderators.insert(user_id);
    }

    pub fn remove_moderator(&self, user_id: i64) -> bool {
        self.state.lock().moderators.remove(&user_id)
    }

    /// Words are matched case-insensitively as substrings.
    pub fn add_banned_word(&self, word: &str) {
        let word = word.to_lowercase();
        let mut state = self.state.lock();
        if !word.is_empty() && !state.banned_words.contains(&word) {
            state.banned_words.push(word);
        }
    }

    pub fn remove_banned_word(&self, word: &str) -> bool {
        let word = word.to_lowercase();
        let mut state = self.state.lock();
        let before = state.banned_words.len();
        state.banned_words.retain(|w| *w != word);
        state.banned_words.len() < before
    }

    pub fn contains_banned_words(&self, text: &str) -> bool {
        let text = text.to_lowercase();
        self.state
            .lock()
            .banned_words
            .iter()
            .any(|word| text.contains(word.as_str()))
    }

    // =========================================================================
    // Sessions
    // =========================================================================

    /// Updates sessions from a video chat service message.
    ///
    /// Returns `None` for any other message.
    pub fn observe(&self, message: &Message) -> Option<VoiceChatEvent> {
        self.observe_at(Utc::now(), message)
    }

    pub fn observe_at(&self, now: DateTime<Utc>, message: &Message) -> Option<VoiceChatEvent> {
        let chat_id = message.chat.id;
        if message.video_chat_started.is_some() {
            self.state.lock().sessions.insert(
                chat_id,
                Session {
                    started_at: now,
                    ended_at: None,
                    participants: BTreeSet::new(),
                },
            );
            info!(chat_id, "Video chat started");
            return Some(VoiceChatEvent::Started);
        }

        if let Some(ended) = &message.video_chat_ended {
            if let Some(session) = self.state.lock().sessions.get_mut(&chat_id) {
                session.ended_at = Some(now);
            }
            info!(chat_id, duration_secs = ended.duration, "Video chat ended");
            return Some(VoiceChatEvent::Ended {
                duration_secs: ended.duration,
            });
        }

        let invited = message.video_chat_participants_invited.as_ref()?;
        let user_ids = invited
            .users
            .iter()
            .filter(|user| self.participant_joined(chat_id, user.id).is_ok())
            .map(|user| user.id)
            .collect();
        Some(VoiceChatEvent::Invited { user_ids })
    }

    /// Adds a participant to the active session and returns the new count.
    pub fn participant_joined(&self, chat_id: i64, user_id: i64) -> ExtensionResult<usize> {
        let mut state = self.state.lock();
        let session = state
            .sessions
            .get_mut(&chat_id)
            .filter(|s| s.is_active())
            .ok_or_else(|| ExtensionError::not_found(format!("no video chat in {chat_id}")))?;

        if !session.participants.contains(&user_id)
            && session.participants.len() >= self.max_participants
        {
            warn!(chat_id, user_id, "Video chat is full");
            return Err(ExtensionError::limit(format!(
                "video chat in {chat_id} has {} participants",
                self.max_participants
            )));
        }
        session.participants.insert(user_id);
        info!(chat_id, user_id, "Participant joined video chat");
        Ok(session.participants.len())
    }

    pub fn participant_left(&self, chat_id: i64, user_id: i64) -> bool {
        let mut state = self.state.lock();
        let left = state
            .sessions
            .get_mut(&chat_id)
            .is_some_and(|s| s.participants.remove(&user_id));
        if left {
            info!(chat_id, user_id, "Participant left video chat");
        }
        left
    }

    // =========================================================================
    // Mutes and warnings
    // =========================================================================

    /// Mutes a user for `duration`, or the configured timeout. Returns when
    /// the mute ends.
    pub fn mute_user(&self, chat_id: i64, user_id: i64, duration: Option<TimeDelta>) -> DateTime<Utc> {
        self.mute_user_at(Utc::now(), chat_id, user_id, duration)
    }

    pub fn mute_user_at(
        &self,
        now: DateTime<Utc>,
        chat_id: i64,
        user_id: i64,
        duration: Option<TimeDelta>,
    ) -> DateTime<Utc> {
        let until = now + duration.unwrap_or(self.mute_timeout);
        self.state.lock().mutes.insert((chat_id, user_id), until);
        info!(chat_id, user_id, %until, "User muted");
        until
    }

    pub fn unmute_user(&self, chat_id: i64, user_id: i64) -> bool {
        let removed = self.state.lock().mutes.remove(&(chat_id, user_id)).is_some();
        if removed {
            info!(chat_id, user_id, "User unmuted");
        }
        removed
    }

    pub fn is_muted(&self, chat_id: i64, user_id: i64) -> bool {
        self.is_muted_at(Utc::now(), chat_id, user_id)
    }

    pub fn is_muted_at(&self, now: DateTime<Utc>, chat_id: i64, user_id: i64) -> bool {
        self.state
            .lock()
            .mutes
            .get(&(chat_id, user_id))
            .is_some_and(|until| *until > now)
    }

    pub fn warn_user(&self, chat_id: i64, user_id: i64) -> Warning {
        let mut state = self.state.lock();
        let count = state.warnings.entry((chat_id, user_id)).or_default();
        *count += 1;
        let warning = Warning {
            count: *count,
            threshold_reached: *count >= self.warn_threshold,
        };
        info!(
            chat_id,
            user_id,
            warnings = warning.count,
            threshold = self.warn_threshold,
            "User warned"
        );
        warning
    }

    pub fn warnings(&self, chat_id: i64, user_id: i64) -> u32 {
        self.state
            .lock()
            .warnings
            .get(&(chat_id, user_id))
            .copied()
            .unwrap_or(0)
    }

    pub fn clear_warnings(&self, chat_id: i64, user_id: i64) -> bool {
        self.state.lock().warnings.remove(&(chat_id, user_id)).is_some()
    }

    /// Moderation buttons for one user.
    ///
    /// Unmute appears only while the user is muted and clear-warnings only
    /// while they have warnings. Callback data is `{action}_{chat}_{user}`.
    pub fn moderation_keyboard(&self, chat_id: i64, user_id: i64) -> InlineKeyboardMarkup {
        let data = |action: &str| format!("{action}_{chat_id}_{user_id}");
        let muted = self.is_muted(chat_id, user_id);
        let warned = self.warnings(chat_id, user_id) > 0;

        let mut mute_row = vec![InlineKeyboardButton::callback("🔇 Mute", data("mute"))];
        if muted {
            mute_row.push(InlineKeyboardButton::callback("🔊 Unmute", data("unmute")));
        }
        let mut warn_row = vec![InlineKeyboardButton::callback("⚠️ Warn", data("warn"))];
        if warned {
            warn_row.push(InlineKeyboardButton::callback(
                "🗑 Clear Warnings",
                data("clear_warnings"),
            ));
        }
        InlineKeyboardMarkup::new(vec![mute_row, warn_row])
    }

    /// Summary of the last session seen in `chat_id`.
    pub fn stats(&self, chat_id: i64) -> Option<VoiceChatStats> {
        let now = Utc::now();
        let state = self.state.lock();
        let session = state.sessions.get(&chat_id)?;
        Some(VoiceChatStats {
            is_active: session.is_active(),
            started_at: session.started_at,
            ended_at: session.ended_at,
            participants: session.participants.len(),
            muted_users: state
                .mutes
                .iter()
                .filter(|((chat, _), until)| *chat == chat_id && **until > now)
                .count(),
            warned_users: state.warnings.keys().filter(|(chat, _)| *chat == chat_id).count(),
        })
    }
}
