//! Media attachments and file handles.
//!
//! Telegram models each attachment kind as its own optional field on a
//! message. [`MediaKind`] names those fields so callers can ask for "the
//! voice note" or "whatever media this message carries" without probing
//! fields by name.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A downloadable file attached to a message.
///
/// Covers `PhotoSize`, `Video`, `Document`, `Audio`, `Voice`, `VideoNote`,
/// `Sticker` and `Animation`; fields that only some kinds carry are optional.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileAttachment {
    pub file_id: String,
    pub file_unique_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<u32>,
}

/// The attachment kinds a message can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Photo,
    Video,
    Document,
    Audio,
    Voice,
    VideoNote,
    Sticker,
    Animation,
}

impl MediaKind {
    /// Inspection order used by [`Message::media`](super::Message::media).
    ///
    /// Animations come before documents because Telegram fills both fields
    /// for GIFs.
    pub const ALL: [MediaKind; 8] = [
        MediaKind::Photo,
        MediaKind::Video,
        MediaKind::Animation,
        MediaKind::Document,
        MediaKind::Audio,
        MediaKind::Voice,
        MediaKind::VideoNote,
        MediaKind::Sticker,
    ];

    /// Field name on the wire; also the multipart field for uploads.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Photo => "photo",
            Self::Video => "video",
            Self::Document => "document",
            Self::Audio => "audio",
            Self::Voice => "voice",
            Self::VideoNote => "video_note",
            Self::Sticker => "sticker",
            Self::Animation => "animation",
        }
    }

    /// Bot API method that sends this kind.
    pub fn send_method(&self) -> &'static str {
        match self {
            Self::Photo => "sendPhoto",
            Self::Video => "sendVideo",
            Self::Document => "sendDocument",
            Self::Audio => "sendAudio",
            Self::Voice => "sendVoice",
            Self::VideoNote => "sendVideoNote",
            Self::Sticker => "sendSticker",
            Self::Animation => "sendAnimation",
        }
    }

    /// Whether the send method accepts a caption.
    pub fn supports_caption(&self) -> bool {
        !matches!(self, Self::VideoNote | Self::Sticker)
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown media kind name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown media kind '{0}'")]
pub struct UnknownMediaKind(pub String);

impl FromStr for MediaKind {
    type Err = UnknownMediaKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MediaKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| UnknownMediaKind(s.to_string()))
    }
}

/// A resolved attachment: its kind and the file behind it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MediaRef<'a> {
    pub kind: MediaKind,
    pub file: &'a FileAttachment,
}

/// Result of `getFile`: a handle that can be downloaded for about an hour.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct File {
    pub file_id: String,
    pub file_unique_id: String,
    #[serde(default)]
    pub file_size: Option<u64>,
    #[serde(default)]
    pub file_path: Option<String>,
}

/// In-memory file for multipart uploads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputFile {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl InputFile {
    pub fn new(file_name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            file_name: file_name.into(),
            bytes: bytes.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_media_kind_from_str() {
        assert_eq!("video_note".parse::<MediaKind>(), Ok(MediaKind::VideoNote));
        assert!("hologram".parse::<MediaKind>().is_err());
    }

    #[test]
    fn test_send_method() {
        assert_eq!(MediaKind::VideoNote.send_method(), "sendVideoNote");
        assert!(!MediaKind::Sticker.supports_caption());
    }
}
