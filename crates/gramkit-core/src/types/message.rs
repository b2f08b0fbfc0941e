//! Messages, callback queries and the values they carry.

use serde::{Deserialize, Serialize};

use super::media::{FileAttachment, MediaKind, MediaRef};
use super::payment::{Invoice, SuccessfulPayment};
use super::{Chat, User};
use crate::keyboard::InlineKeyboardMarkup;

/// A point on the map.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub horizontal_accuracy: Option<f64>,
}

impl Location {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            horizontal_accuracy: None,
        }
    }
}

/// A named place with an address.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Venue {
    pub location: Location,
    pub title: String,
    pub address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub foursquare_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub google_place_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    pub phone_number: String,
    pub first_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<i64>,
}

/// A formatting or semantic span inside message text (command, mention, link…).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageEntity {
    #[serde(rename = "type")]
    pub kind: String,
    pub offset: usize,
    pub length: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<User>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoChatStarted {}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoChatEnded {
    pub duration: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VideoChatParticipantsInvited {
    #[serde(default)]
    pub users: Vec<User>,
}

/// A message in a chat.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub message_id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_thread_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<User>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_chat: Option<Chat>,
    pub date: i64,
    pub chat: Chat,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edit_date: Option<i64>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_topic_message: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to_message: Option<Box<Message>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub entities: Vec<MessageEntity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub caption_entities: Vec<MessageEntity>,

    // Attachments. `photo` lists the available sizes, smallest first.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo: Option<Vec<FileAttachment>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video: Option<FileAttachment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document: Option<FileAttachment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio: Option<FileAttachment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voice: Option<FileAttachment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_note: Option<FileAttachment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sticker: Option<FileAttachment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub animation: Option<FileAttachment>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact: Option<Contact>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub venue: Option<Venue>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub new_chat_members: Vec<User>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub left_chat_member: Option<User>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invoice: Option<Invoice>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub successful_payment: Option<SuccessfulPayment>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_chat_started: Option<VideoChatStarted>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_chat_ended: Option<VideoChatEnded>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_chat_participants_invited: Option<VideoChatParticipantsInvited>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_markup: Option<InlineKeyboardMarkup>,
}

impl Message {
    /// Id of the sending user, if the message has one.
    pub fn sender_id(&self) -> Option<i64> {
        self.from.as_ref().map(|u| u.id)
    }

    pub fn chat_id(&self) -> i64 {
        self.chat.id
    }

    /// Text of a text message, or the caption of a media message.
    pub fn text_or_caption(&self) -> Option<&str> {
        self.text.as_deref().or(self.caption.as_deref())
    }

    /// The attachment of the given kind, if present.
    ///
    /// For photos this is the largest available size.
    pub fn media_of(&self, kind: MediaKind) -> Option<&FileAttachment> {
        match kind {
            MediaKind::Photo => self.photo.as_ref().and_then(|sizes| sizes.last()),
            MediaKind::Video => self.video.as_ref(),
            MediaKind::Document => self.document.as_ref(),
            MediaKind::Audio => self.audio.as_ref(),
            MediaKind::Voice => self.voice.as_ref(),
            MediaKind::VideoNote => self.video_note.as_ref(),
            MediaKind::Sticker => self.sticker.as_ref(),
            MediaKind::Animation => self.animation.as_ref(),
        }
    }

    /// The first attachment found, inspecting kinds in [`MediaKind::ALL`] order.
    pub fn media(&self) -> Option<MediaRef<'_>> {
        MediaKind::ALL.into_iter().find_map(|kind| {
            self.media_of(kind).map(|file| MediaRef { kind, file })
        })
    }

    /// The bot command this message starts with, without the leading slash
    /// and any `@botname` suffix.
    pub fn command(&self) -> Option<&str> {
        let text = self.text.as_deref()?.strip_prefix('/')?;
        let token = text.split_whitespace().next()?;
        Some(token.split('@').next().unwrap_or(token))
    }
}

/// Incoming press of an inline keyboard button.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallbackQuery {
    pub id: String,
    pub from: User,
    /// The message the button was attached to, when it is still accessible.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<Message>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inline_message_id: Option<String>,
    pub chat_instance: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
}

impl CallbackQuery {
    /// Chat of the originating message, if known.
    pub fn chat(&self) -> Option<&Chat> {
        self.message.as_ref().map(|m| &m.chat)
    }
}
