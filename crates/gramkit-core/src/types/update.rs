//! The inbound event envelope.
//!
//! On the wire an update is a flat object with `update_id` and exactly one
//! payload key (`message`, `callback_query`, ...). Here it is a tagged union
//! so code can never observe two payloads on one update.

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};

use super::{CallbackQuery, Chat, Message, PreCheckoutQuery, User};

/// One event delivered by the Bot API.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "RawUpdate")]
pub struct Update {
    /// Monotonically increasing id assigned by Telegram.
    pub update_id: i64,
    pub kind: UpdateKind,
}

/// Payload of an [`Update`].
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateKind {
    Message(Message),
    EditedMessage(Message),
    ChannelPost(Message),
    EditedChannelPost(Message),
    CallbackQuery(CallbackQuery),
    PreCheckoutQuery(PreCheckoutQuery),
    /// Any update kind without a typed model, kept as raw JSON.
    Other { kind: String, payload: Value },
}

impl UpdateKind {
    /// The wire name of this update kind.
    pub fn name(&self) -> &str {
        match self {
            Self::Message(_) => "message",
            Self::EditedMessage(_) => "edited_message",
            Self::ChannelPost(_) => "channel_post",
            Self::EditedChannelPost(_) => "edited_channel_post",
            Self::CallbackQuery(_) => "callback_query",
            Self::PreCheckoutQuery(_) => "pre_checkout_query",
            Self::Other { kind, .. } => kind,
        }
    }
}

impl Update {
    pub fn new(update_id: i64, kind: UpdateKind) -> Self {
        Self { update_id, kind }
    }

    /// The new message carried by this update, if it is one.
    pub fn message(&self) -> Option<&Message> {
        match &self.kind {
            UpdateKind::Message(m) => Some(m),
            _ => None,
        }
    }

    pub fn callback_query(&self) -> Option<&CallbackQuery> {
        match &self.kind {
            UpdateKind::CallbackQuery(q) => Some(q),
            _ => None,
        }
    }

    pub fn pre_checkout_query(&self) -> Option<&PreCheckoutQuery> {
        match &self.kind {
            UpdateKind::PreCheckoutQuery(q) => Some(q),
            _ => None,
        }
    }

    /// The user that caused this update, when there is one.
    pub fn sender(&self) -> Option<&User> {
        match &self.kind {
            UpdateKind::Message(m)
            | UpdateKind::EditedMessage(m)
            | UpdateKind::ChannelPost(m)
            | UpdateKind::EditedChannelPost(m) => m.from.as_ref(),
            UpdateKind::CallbackQuery(q) => Some(&q.from),
            UpdateKind::PreCheckoutQuery(q) => Some(&q.from),
            UpdateKind::Other { .. } => None,
        }
    }

    /// The chat this update belongs to, when there is one.
    pub fn chat(&self) -> Option<&Chat> {
        match &self.kind {
            UpdateKind::Message(m)
            | UpdateKind::EditedMessage(m)
            | UpdateKind::ChannelPost(m)
            | UpdateKind::EditedChannelPost(m) => Some(&m.chat),
            UpdateKind::CallbackQuery(q) => q.chat(),
            UpdateKind::PreCheckoutQuery(_) | UpdateKind::Other { .. } => None,
        }
    }

    /// Unix timestamp of the underlying event, when the payload carries one.
    pub fn date(&self) -> Option<i64> {
        match &self.kind {
            UpdateKind::Message(m)
            | UpdateKind::EditedMessage(m)
            | UpdateKind::ChannelPost(m)
            | UpdateKind::EditedChannelPost(m) => Some(m.edit_date.unwrap_or(m.date)),
            UpdateKind::CallbackQuery(q) => q.message.as_ref().map(|m| m.date),
            UpdateKind::PreCheckoutQuery(_) | UpdateKind::Other { .. } => None,
        }
    }
}

// =============================================================================
// Wire format
// =============================================================================

/// Flat wire shape of an update.
#[derive(Deserialize)]
struct RawUpdate {
    update_id: i64,
    #[serde(flatten)]
    payload: Map<String, Value>,
}

impl TryFrom<RawUpdate> for Update {
    type Error = String;

    fn try_from(raw: RawUpdate) -> Result<Self, Self::Error> {
        let Some((kind, payload)) = raw.payload.into_iter().next() else {
            return Err(format!("update {} has no payload", raw.update_id));
        };

        fn typed<T: serde::de::DeserializeOwned>(kind: &str, value: Value) -> Result<T, String> {
            serde_json::from_value(value).map_err(|e| format!("invalid {kind}: {e}"))
        }

        let kind = match kind.as_str() {
            "message" => UpdateKind::Message(typed(&kind, payload)?),
            "edited_message" => UpdateKind::EditedMessage(typed(&kind, payload)?),
            "channel_post" => UpdateKind::ChannelPost(typed(&kind, payload)?),
            "edited_channel_post" => UpdateKind::EditedChannelPost(typed(&kind, payload)?),
            "callback_query" => UpdateKind::CallbackQuery(typed(&kind, payload)?),
            "pre_checkout_query" => UpdateKind::PreCheckoutQuery(typed(&kind, payload)?),
            _ => UpdateKind::Other { kind, payload },
        };

        Ok(Self {
            update_id: raw.update_id,
            kind,
        })
    }
}

impl Serialize for Update {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(2))?;
        map.serialize_entry("update_id", &self.update_id)?;
        let name = self.kind.name();
        match &self.kind {
            UpdateKind::Message(m)
            | UpdateKind::EditedMessage(m)
            | UpdateKind::ChannelPost(m)
            | UpdateKind::EditedChannelPost(m) => map.serialize_entry(name, m)?,
            UpdateKind::CallbackQuery(q) => map.serialize_entry(name, q)?,
            UpdateKind::PreCheckoutQuery(q) => map.serialize_entry(name, q)?,
            UpdateKind::Other { payload, .. } => map.serialize_entry(name, payload)?,
        }
        map.end()
    }
}
