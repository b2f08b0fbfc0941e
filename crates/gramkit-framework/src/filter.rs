//! Declarative event filters.
//!
//! A [`Filter`] is a synchronous predicate over one event type. Routes carry
//! at most one filter; build richer conditions with the [`FilterExt`]
//! combinators instead of nesting closures.
//!
//! ```rust,ignore
//! use gramkit_framework::filter::{ChatTypeFilter, Command, FilterExt, Text};
//!
//! // "/start" in private chats only
//! let start = Command::new("start").and(ChatTypeFilter::private());
//!
//! // "yes" or "no", but not from user 13
//! let answer = Text::new("yes")
//!     .or(Text::new("no"))
//!     .and(UserId::new([13]).not());
//! ```
//!
//! Any `Fn(&E) -> bool` closure is a filter as well.
//!
//! Filters never fail: an event that lacks the inspected field simply does
//! not match.

use std::collections::HashSet;

use regex::Regex;

use gramkit_core::{CallbackQuery, ChatType, MediaKind, Message};

/// A predicate deciding whether a route accepts an event.
pub trait Filter<E>: Send + Sync {
    fn matches(&self, event: &E) -> bool;
}

impl<E, F> Filter<E> for F
where
    F: Fn(&E) -> bool + Send + Sync,
{
    fn matches(&self, event: &E) -> bool {
        self(event)
    }
}

// =============================================================================
// Combinators
// =============================================================================

/// Composition methods available on every filter.
pub trait FilterExt<E>: Filter<E> + Sized {
    /// Matches when both filters match. `other` is not evaluated if `self` fails.
    fn and<F: Filter<E>>(self, other: F) -> And<Self, F> {
        And(self, other)
    }

    /// Matches when either filter matches.
    fn or<F: Filter<E>>(self, other: F) -> Or<Self, F> {
        Or(self, other)
    }

    fn not(self) -> Not<Self> {
        Not(self)
    }
}

impl<E, T: Filter<E>> FilterExt<E> for T {}

#[derive(Debug, Clone)]
pub struct And<A, B>(pub A, pub B);

impl<E, A: Filter<E>, B: Filter<E>> Filter<E> for And<A, B> {
    fn matches(&self, event: &E) -> bool {
        self.0.matches(event) && self.1.matches(event)
    }
}

#[derive(Debug, Clone)]
pub struct Or<A, B>(pub A, pub B);

impl<E, A: Filter<E>, B: Filter<E>> Filter<E> for Or<A, B> {
    fn matches(&self, event: &E) -> bool {
        self.0.matches(event) || self.1.matches(event)
    }
}

#[derive(Debug, Clone)]
pub struct Not<A>(pub A);

impl<E, A: Filter<E>> Filter<E> for Not<A> {
    fn matches(&self, event: &E) -> bool {
        !self.0.matches(event)
    }
}

// =============================================================================
// Text matching
// =============================================================================

/// Exact or full-regex string comparison shared by [`Text`] and [`CallbackData`].
#[derive(Debug, Clone)]
enum Pattern {
    Exact(String),
    Regex(Regex),
}

impl Pattern {
    fn regex(pattern: &str) -> Result<Self, regex::Error> {
        // Anchor so the whole input must match, not just a substring.
        Regex::new(&format!("^(?:{pattern})$")).map(Self::Regex)
    }

    fn matches(&self, input: &str) -> bool {
        match self {
            Self::Exact(expected) => expected == input,
            Self::Regex(re) => re.is_match(input),
        }
    }
}

/// Matches messages that start with one of the given bot commands.
///
/// The first whitespace-delimited token, without its leading `/`, is compared
/// case-insensitively. A `@botname` suffix is part of the token, so
/// `/start@my_bot` does not match `start`.
#[derive(Debug, Clone)]
pub struct Command {
    commands: Vec<String>,
}

impl Command {
    pub fn new(command: impl Into<String>) -> Self {
        Self::any([command])
    }

    /// Matches any of `commands`.
    pub fn any<I, S>(commands: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            commands: commands
                .into_iter()
                .map(|c| c.into().to_lowercase())
                .collect(),
        }
    }
}

impl Filter<Message> for Command {
    fn matches(&self, message: &Message) -> bool {
        let Some(rest) = message.text.as_deref().and_then(|t| t.strip_prefix('/')) else {
            return false;
        };
        let token = rest.split_whitespace().next().unwrap_or_default().to_lowercase();
        self.commands.iter().any(|c| *c == token)
    }
}

/// Matches the text of a message.
#[derive(Debug, Clone)]
pub struct Text {
    pattern: Pattern,
}

impl Text {
    /// Exact comparison.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            pattern: Pattern::Exact(text.into()),
        }
    }

    /// The whole text must match `pattern`.
    pub fn regex(pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            pattern: Pattern::regex(pattern)?,
        })
    }
}

impl Filter<Message> for Text {
    fn matches(&self, message: &Message) -> bool {
        message
            .text
            .as_deref()
            .is_some_and(|text| self.pattern.matches(text))
    }
}

/// Matches the `data` payload of a callback query.
#[derive(Debug, Clone)]
pub struct CallbackData {
    pattern: Pattern,
}

impl CallbackData {
    pub fn new(data: impl Into<String>) -> Self {
        Self {
            pattern: Pattern::Exact(data.into()),
        }
    }

    /// The whole payload must match `pattern`, e.g. `topic_\d+_\d+`.
    pub fn regex(pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            pattern: Pattern::regex(pattern)?,
        })
    }
}

impl Filter<CallbackQuery> for CallbackData {
    fn matches(&self, query: &CallbackQuery) -> bool {
        query
            .data
            .as_deref()
            .is_some_and(|data| self.pattern.matches(data))
    }
}

// =============================================================================
// Chat and sender
// =============================================================================

/// Matches events from chats of the given types.
///
/// A callback query matches through the chat of its message.
#[derive(Debug, Clone)]
pub struct ChatTypeFilter {
    types: HashSet<ChatType>,
}

impl ChatTypeFilter {
    pub fn new(types: impl IntoIterator<Item = ChatType>) -> Self {
        Self {
            types: types.into_iter().collect(),
        }
    }

    pub fn private() -> Self {
        Self::new([ChatType::Private])
    }

    /// Groups and supergroups.
    pub fn groups() -> Self {
        Self::new([ChatType::Group, ChatType::Supergroup])
    }
}

impl Filter<Message> for ChatTypeFilter {
    fn matches(&self, message: &Message) -> bool {
        self.types.contains(&message.chat.kind)
    }
}

impl Filter<CallbackQuery> for ChatTypeFilter {
    fn matches(&self, query: &CallbackQuery) -> bool {
        query.chat().is_some_and(|chat| self.types.contains(&chat.kind))
    }
}

/// Matches events sent by one of the given users.
#[derive(Debug, Clone)]
pub struct UserId {
    ids: HashSet<i64>,
}

impl UserId {
    pub fn new(ids: impl IntoIterator<Item = i64>) -> Self {
        Self {
            ids: ids.into_iter().collect(),
        }
    }
}

impl Filter<Message> for UserId {
    fn matches(&self, message: &Message) -> bool {
        message.sender_id().is_some_and(|id| self.ids.contains(&id))
    }
}

impl Filter<CallbackQuery> for UserId {
    fn matches(&self, query: &CallbackQuery) -> bool {
        self.ids.contains(&query.from.id)
    }
}

/// Matches events in one of the given chats.
#[derive(Debug, Clone)]
pub struct ChatIdFilter {
    ids: HashSet<i64>,
}

impl ChatIdFilter {
    pub fn new(ids: impl IntoIterator<Item = i64>) -> Self {
        Self {
            ids: ids.into_iter().collect(),
        }
    }
}

impl Filter<Message> for ChatIdFilter {
    fn matches(&self, message: &Message) -> bool {
        self.ids.contains(&message.chat.id)
    }
}

impl Filter<CallbackQuery> for ChatIdFilter {
    fn matches(&self, query: &CallbackQuery) -> bool {
        query.chat().is_some_and(|chat| self.ids.contains(&chat.id))
    }
}

/// Matches messages carrying an attachment of one of the given kinds.
#[derive(Debug, Clone)]
pub struct MediaType {
    kinds: Vec<MediaKind>,
}

impl MediaType {
    pub fn new(kinds: impl IntoIterator<Item = MediaKind>) -> Self {
        Self {
            kinds: kinds.into_iter().collect(),
        }
    }

    /// The first configured kind present on `message`.
    pub fn matched_kind(&self, message: &Message) -> Option<MediaKind> {
        self.kinds
            .iter()
            .copied()
            .find(|kind| message.media_of(*kind).is_some())
    }
}

impl Filter<Message> for MediaType {
    fn matches(&self, message: &Message) -> bool {
        self.matched_kind(message).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn message(text: Option<&str>, chat_type: &str) -> Message {
        let mut value = json!({
            "message_id": 1,
            "date": 0,
            "chat": {"id": -100, "type": chat_type},
            "from": {"id": 7, "is_bot": false, "first_name": "Ada"}
        });
        if let Some(text) = text {
            value["text"] = json!(text);
        }
        serde_json::from_value(value).unwrap()
    }

    fn callback(data: Option<&str>) -> CallbackQuery {
        let mut value = json!({
            "id": "q1",
            "from": {"id": 7, "is_bot": false, "first_name": "Ada"},
            "chat_instance": "ci"
        });
        if let Some(data) = data {
            value["data"] = json!(data);
        }
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_command_case_insensitive() {
        let filter = Command::new("start");
        assert!(filter.matches(&message(Some("/Start"), "private")));
        assert!(filter.matches(&message(Some("/start extra args"), "private")));
        assert!(!filter.matches(&message(Some("start"), "private")));
        assert!(!filter.matches(&message(Some("/stop"), "private")));
        assert!(!filter.matches(&message(None, "private")));
    }

    #[test]
    fn test_command_any() {
        let filter = Command::any(["help", "HELP_ME"]);
        assert!(filter.matches(&message(Some("/help_me now"), "private")));
        assert!(!filter.matches(&message(Some("/"), "private")));
    }

    #[test]
    fn test_text_exact_and_regex() {
        let exact = Text::new("hello");
        assert!(exact.matches(&message(Some("hello"), "private")));
        assert!(!exact.matches(&message(Some("hello there"), "private")));

        let re = Text::regex(r"\d+").unwrap();
        assert!(re.matches(&message(Some("12345"), "private")));
        assert!(!re.matches(&message(Some("a123"), "private")));
        assert!(!re.matches(&message(None, "private")));
    }

    #[test]
    fn test_invalid_regex_is_error() {
        assert!(Text::regex("(unclosed").is_err());
    }

    #[test]
    fn test_callback_data() {
        let filter = CallbackData::regex("venue_[0-9]+").unwrap();
        assert!(filter.matches(&callback(Some("venue_42"))));
        assert!(!filter.matches(&callback(Some("venue_"))));
        assert!(!filter.matches(&callback(None)));
        assert!(CallbackData::new("ok").matches(&callback(Some("ok"))));
    }

    #[test]
    fn test_chat_type_and_ids() {
        let group = message(Some("hi"), "supergroup");
        assert!(ChatTypeFilter::groups().matches(&group));
        assert!(!ChatTypeFilter::private().matches(&group));
        assert!(UserId::new([7, 8]).matches(&group));
        assert!(ChatIdFilter::new([-100]).matches(&group));

        // No message attached, so no chat to inspect.
        assert!(!Filter::<CallbackQuery>::matches(
            &ChatTypeFilter::private(),
            &callback(Some("x"))
        ));
    }

    #[test]
    fn test_media_type_first_kind_wins() {
        let msg: Message = serde_json::from_value(json!({
            "message_id": 1,
            "date": 0,
            "chat": {"id": 1, "type": "private"},
            "animation": {"file_id": "a", "file_unique_id": "a"},
            "document": {"file_id": "d", "file_unique_id": "d"}
        }))
        .unwrap();

        let filter = MediaType::new([MediaKind::Document, MediaKind::Animation]);
        assert!(filter.matches(&msg));
        assert_eq!(filter.matched_kind(&msg), Some(MediaKind::Document));
        assert!(!MediaType::new([MediaKind::Photo]).matches(&msg));
    }

    #[test]
    fn test_combinators() {
        let msg = message(Some("/start"), "private");
        let filter = Command::new("start").and(ChatTypeFilter::private());
        assert!(filter.matches(&msg));

        let filter = Command::new("stop").or(Text::new("/start"));
        assert!(filter.matches(&msg));

        let filter = Command::new("start").not();
        assert!(!filter.matches(&msg));

        let closure = |m: &Message| m.chat.id < 0;
        assert!(closure.and(Text::new("/start")).matches(&msg));
    }
}
