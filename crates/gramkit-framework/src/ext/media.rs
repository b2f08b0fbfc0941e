//! Media downloads and uploads backed by a local directory.
//!
//! ```rust,ignore
//! let media = MediaHandler::new("downloads")
//!     .max_file_size(10 * 1024 * 1024)
//!     .allowed_kinds([MediaKind::Photo, MediaKind::Document]);
//!
//! if let Some(info) = media.process_media_message(bot, &message).await? {
//!     tracing::info!(kind = %info.kind, path = ?info.path, "stored");
//! }
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::error::{ExtensionError, ExtensionResult};
use gramkit_core::{Bot, ChatId, InputFile, MediaKind, Message, SendOptions};

/// Default upper bound for downloads, matching the Bot API's own limit.
pub const DEFAULT_MAX_FILE_SIZE: u64 = 50 * 1024 * 1024;

/// What [`MediaHandler::process_media_message`] found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaInfo {
    pub kind: MediaKind,
    pub file_id: String,
    /// Where the file was stored; `None` when it exceeded the size limit.
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct MediaHandler {
    download_dir: PathBuf,
    max_file_size: u64,
    allowed_kinds: Vec<MediaKind>,
}

impl MediaHandler {
    /// Creates a handler storing files under `download_dir`.
    ///
    /// The directory is created on first download.
    pub fn new(download_dir: impl Into<PathBuf>) -> Self {
        Self {
            download_dir: download_dir.into(),
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            allowed_kinds: MediaKind::ALL.to_vec(),
        }
    }

    pub fn max_file_size(mut self, bytes: u64) -> Self {
        self.max_file_size = bytes;
        self
    }

    /// Restricts [`process_media_message`](Self::process_media_message) to
    /// these kinds, inspected in the given order.
    pub fn allowed_kinds(mut self, kinds: impl IntoIterator<Item = MediaKind>) -> Self {
        self.allowed_kinds = kinds.into_iter().collect();
        self
    }

    pub fn download_dir(&self) -> &Path {
        &self.download_dir
    }

    /// Downloads `file_id` into the download directory.
    ///
    /// The stored name is `file_name` when given, else the last segment of
    /// the server-side path. Directory components are stripped either way.
    pub async fn download_file(
        &self,
        bot: &dyn Bot,
        file_id: &str,
        file_name: Option<&str>,
    ) -> ExtensionResult<PathBuf> {
        let file = bot.get_file(file_id).await?;
        if let Some(size) = file.file_size
            && size > self.max_file_size
        {
            return Err(ExtensionError::limit(format!(
                "file {file_id} is {size} bytes, limit is {}",
                self.max_file_size
            )));
        }

        let remote_path = file
            .file_path
            .ok_or_else(|| ExtensionError::not_found(format!("no download path for {file_id}")))?;
        let name = file_name.unwrap_or(&remote_path);
        let name = Path::new(name)
            .file_name()
            .ok_or_else(|| ExtensionError::invalid(format!("bad file name '{name}'")))?;

        let bytes = bot.download_file(&remote_path).await?;
        tokio::fs::create_dir_all(&self.download_dir).await?;
        let target = self.download_dir.join(name);
        tokio::fs::write(&target, &bytes).await?;

        info!(file_id, path = %target.display(), size = bytes.len(), "File downloaded");
        Ok(target)
    }

    /// Downloads the first allowed attachment of `message`.
    ///
    /// Returns `Ok(None)` when the message carries no allowed media. A file
    /// over the size limit is still reported, with `path: None`.
    pub async fn process_media_message(
        &self,
        bot: &dyn Bot,
        message: &Message,
    ) -> ExtensionResult<Option<MediaInfo>> {
        let Some((kind, attachment)) = self
            .allowed_kinds
            .iter()
            .find_map(|&kind| message.media_of(kind).map(|file| (kind, file)))
        else {
            return Ok(None);
        };

        let path = match self.download_file(bot, &attachment.file_id, None).await {
            Ok(path) => Some(path),
            Err(ExtensionError::LimitReached(reason)) => {
                warn!(%kind, %reason, "Media not downloaded");
                None
            }
            Err(e) => return Err(e),
        };

        Ok(Some(MediaInfo {
            kind,
            file_id: attachment.file_id.clone(),
            path,
        }))
    }

    /// Uploads a local file to `chat_id` as `kind`.
    pub async fn send_media(
        &self,
        bot: &dyn Bot,
        chat_id: impl Into<ChatId>,
        kind: MediaKind,
        path: impl AsRef<Path>,
        caption: Option<&str>,
    ) -> ExtensionResult<Message> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| kind.as_str().to_string());

        debug!(%kind, path = %path.display(), "Uploading media");
        let message = bot
            .send_media(
                chat_id.into(),
                kind,
                InputFile::new(file_name, bytes),
                caption,
                SendOptions::new(),
            )
            .await?;
        Ok(message)
    }

    /// Deletes downloaded files last modified at least `max_age` ago.
    ///
    /// Returns how many files were removed. A missing directory counts as
    /// empty.
    pub async fn cleanup_old_files(&self, max_age: Duration) -> ExtensionResult<usize> {
        let mut entries = match tokio::fs::read_dir(&self.download_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };

        let mut removed = 0;
        while let Some(entry) = entries.next_entry().await? {
            let metadata = entry.metadata().await?;
            if !metadata.is_file() {
                continue;
            }
            let age = metadata
                .modified()?
                .elapsed()
                .unwrap_or(Duration::ZERO);
            if age >= max_age {
                tokio::fs::remove_file(entry.path()).await?;
                removed += 1;
            }
        }

        if removed > 0 {
            info!(removed, dir = %self.download_dir.display(), "Old media removed");
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use gramkit_core::ApiResult;
    use serde_json::{Value, json};
    use std::sync::Mutex;

    /// Serves one fixed file and records uploads.
    struct FileBot {
        file_size: u64,
        uploads: Mutex<Vec<(String, String, Vec<u8>)>>,
    }

    impl FileBot {
        fn new(file_size: u64) -> Self {
            Self {
                file_size,
                uploads: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl Bot for FileBot {
        async fn call_api(&self, method: &str, params: Value) -> ApiResult<Value> {
            assert_eq!(method, "getFile");
            Ok(json!({
                "file_id": params["file_id"],
                "file_unique_id": "u",
                "file_size": self.file_size,
                "file_path": "photos/file_0.jpg"
            }))
        }

        async fn call_multipart(
            &self,
            method: &str,
            _params: Value,
            field: &str,
            file: InputFile,
        ) -> ApiResult<Value> {
            self.uploads
                .lock()
                .unwrap()
                .push((method.to_string(), field.to_string(), file.bytes));
            Ok(json!({"message_id": 5, "date": 0, "chat": {"id": 1, "type": "private"}}))
        }

        async fn download_file(&self, file_path: &str) -> ApiResult<Vec<u8>> {
            assert_eq!(file_path, "photos/file_0.jpg");
            Ok(b"jpeg".to_vec())
        }
    }

    fn scratch_dir() -> PathBuf {
        std::env::temp_dir().join(format!("gramkit-media-{}", uuid::Uuid::new_v4()))
    }

    fn photo_message() -> Message {
        serde_json::from_value(json!({
            "message_id": 1,
            "date": 0,
            "chat": {"id": 1, "type": "private"},
            "photo": [
                {"file_id": "small", "file_unique_id": "s"},
                {"file_id": "big", "file_unique_id": "b"}
            ]
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn test_download_uses_remote_name() {
        let dir = scratch_dir();
        let bot = FileBot::new(4);
        let media = MediaHandler::new(&dir);

        let path = media.download_file(&bot, "abc", None).await.unwrap();
        assert_eq!(path, dir.join("file_0.jpg"));
        assert_eq!(tokio::fs::read(&path).await.unwrap(), b"jpeg");

        let renamed = media.download_file(&bot, "abc", Some("../escape.jpg")).await.unwrap();
        assert_eq!(renamed, dir.join("escape.jpg"));

        tokio::fs::remove_dir_all(&dir).await.unwrap();
    }

    #[tokio::test]
    async fn test_size_limit() {
        let dir = scratch_dir();
        let bot = FileBot::new(100);
        let media = MediaHandler::new(&dir).max_file_size(10);

        let err = media.download_file(&bot, "abc", None).await.unwrap_err();
        assert!(matches!(err, ExtensionError::LimitReached(_)));

        let info = media
            .process_media_message(&bot, &photo_message())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(info.kind, MediaKind::Photo);
        assert_eq!(info.file_id, "big");
        assert_eq!(info.path, None);
        assert!(!dir.exists());
    }

    #[tokio::test]
    async fn test_process_respects_allowed_kinds() {
        let dir = scratch_dir();
        let bot = FileBot::new(4);
        let media = MediaHandler::new(&dir).allowed_kinds([MediaKind::Document]);
        assert_eq!(
            media.process_media_message(&bot, &photo_message()).await.unwrap(),
            None
        );
    }

    #[tokio::test]
    async fn test_send_media_and_cleanup() {
        let dir = scratch_dir();
        let bot = FileBot::new(4);
        let media = MediaHandler::new(&dir);

        tokio::fs::create_dir_all(&dir).await.unwrap();
        let path = dir.join("clip.mp4");
        tokio::fs::write(&path, b"mp4").await.unwrap();

        media
            .send_media(&bot, 1_i64, MediaKind::Video, &path, Some("look"))
            .await
            .unwrap();
        {
            let uploads = bot.uploads.lock().unwrap();
            assert_eq!(uploads[0].0, "sendVideo");
            assert_eq!(uploads[0].1, "video");
            assert_eq!(uploads[0].2, b"mp4");
        }

        let missing = media
            .send_media(&bot, 1_i64, MediaKind::Video, dir.join("nope.mp4"), None)
            .await
            .unwrap_err();
        assert!(matches!(missing, ExtensionError::Io(_)));

        assert_eq!(
            media.cleanup_old_files(Duration::from_secs(3600)).await.unwrap(),
            0
        );
        assert_eq!(media.cleanup_old_files(Duration::ZERO).await.unwrap(), 1);
        assert!(!path.exists());

        tokio::fs::remove_dir_all(&dir).await.unwrap();
        assert_eq!(media.cleanup_old_files(Duration::ZERO).await.unwrap(), 0);
    }
}
