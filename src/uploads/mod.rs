/// Upload storage for check-in media
///
/// Files are streamed to `<root>/<images|voices>/<uuid><ext>` and served
/// back under `/uploads/`. Content types are checked against an allow-list
/// per media kind; the size cap is enforced while streaming.

use crate::error::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

/// Kind of uploaded media
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Voice,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Image => "image",
            MediaKind::Voice => "voice",
        }
    }

    /// Directory under the upload root
    pub fn subdir(&self) -> &'static str {
        match self {
            MediaKind::Image => "images",
            MediaKind::Voice => "voices",
        }
    }

    /// File extension for an allowed content type
    pub fn extension_for(&self, content_type: &str) -> Option<&'static str> {
        match (self, content_type) {
            (MediaKind::Image, "image/jpeg") => Some(".jpg"),
            (MediaKind::Image, "image/png") => Some(".png"),
            (MediaKind::Image, "image/webp") => Some(".webp"),
            (MediaKind::Image, "image/gif") => Some(".gif"),
            (MediaKind::Voice, "audio/mpeg") => Some(".mp3"),
            (MediaKind::Voice, "audio/wav") => Some(".wav"),
            (MediaKind::Voice, "audio/ogg") => Some(".ogg"),
            (MediaKind::Voice, "audio/webm") => Some(".webm"),
            (MediaKind::Voice, "audio/mp4") => Some(".m4a"),
            (MediaKind::Voice, "audio/aac") => Some(".aac"),
            _ => None,
        }
    }
}

/// Stored upload response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredUpload {
    pub url: String,
    pub filename: String,
    pub size: u64,
}

/// Disk-backed upload store
#[derive(Debug, Clone)]
pub struct UploadStore {
    root: PathBuf,
    max_file_size: usize,
}

impl UploadStore {
    pub fn new(root: PathBuf, max_file_size: usize) -> Self {
        Self {
            root,
            max_file_size,
        }
    }

    pub fn root(&self) -> &PathBuf {
        &self.root
    }

    /// Create the per-kind directories
    pub async fn ensure_directories(&self) -> AppResult<()> {
        for kind in [MediaKind::Image, MediaKind::Voice] {
            fs::create_dir_all(self.root.join(kind.subdir())).await?;
        }
        Ok(())
    }

    /// Validate the content type and open a new file for streaming
    pub async fn begin(&self, kind: MediaKind, content_type: Option<&str>) -> AppResult<UploadWriter> {
        let content_type = content_type
            .map(|ct| ct.split(';').next().unwrap_or(ct).trim().to_ascii_lowercase())
            .unwrap_or_default();

        let ext = kind.extension_for(&content_type).ok_or_else(|| {
            AppError::Validation(format!(
                "unsupported {} format: {}",
                kind.as_str(),
                if content_type.is_empty() { "unknown" } else { &content_type }
            ))
        })?;

        let dir = self.root.join(kind.subdir());
        fs::create_dir_all(&dir).await?;

        let filename = format!("{}{}", Uuid::new_v4().simple(), ext);
        let path = dir.join(&filename);
        let file = fs::File::create(&path).await?;

        Ok(UploadWriter {
            file: Some(file),
            path,
            url: format!("/uploads/{}/{}", kind.subdir(), filename),
            filename,
            written: 0,
            max_file_size: self.max_file_size,
            committed: false,
        })
    }
}

/// File being streamed to disk
///
/// Dropping a writer that was never finished removes the partial file, so an
/// upload abandoned mid-stream leaves nothing behind.
pub struct UploadWriter {
    file: Option<fs::File>,
    path: PathBuf,
    url: String,
    filename: String,
    written: usize,
    max_file_size: usize,
    committed: bool,
}

impl UploadWriter {
    /// Append a chunk; past the cap the partial file is removed
    pub async fn write_chunk(&mut self, chunk: &[u8]) -> AppResult<()> {
        self.written += chunk.len();
        if self.written > self.max_file_size {
            self.abort().await;
            return Err(AppError::PayloadTooLarge {
                limit_mb: self.max_file_size / 1024 / 1024,
            });
        }

        let file = self
            .file
            .as_mut()
            .ok_or_else(|| AppError::Internal("upload already closed".to_string()))?;

        if let Err(e) = file.write_all(chunk).await {
            self.abort().await;
            return Err(e.into());
        }
        Ok(())
    }

    /// Flush and close the file
    pub async fn finish(mut self) -> AppResult<StoredUpload> {
        let mut file = self
            .file
            .take()
            .ok_or_else(|| AppError::Internal("upload already closed".to_string()))?;

        // On error the partial file is removed by Drop
        file.flush().await?;
        self.committed = true;

        Ok(StoredUpload {
            url: std::mem::take(&mut self.url),
            filename: std::mem::take(&mut self.filename),
            size: self.written as u64,
        })
    }

    /// Drop the partial file
    pub async fn abort(&mut self) {
        self.file.take();
        if let Err(e) = fs::remove_file(&self.path).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!("Failed to remove partial upload {}: {}", self.path.display(), e);
            }
        }
    }
}

impl Drop for UploadWriter {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        self.file.take();
        if let Err(e) = std::fs::remove_file(&self.path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!("Failed to remove abandoned upload {}: {}", self.path.display(), e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_stream_image_to_disk() {
        let dir = tempdir().unwrap();
        let store = UploadStore::new(dir.path().to_path_buf(), 1024);

        let mut writer = store.begin(MediaKind::Image, Some("image/png")).await.unwrap();
        writer.write_chunk(b"\x89PNG").await.unwrap();
        writer.write_chunk(b"rest-of-file").await.unwrap();
        let stored = writer.finish().await.unwrap();

        assert!(stored.url.starts_with("/uploads/images/"));
        assert!(stored.filename.ends_with(".png"));
        assert_eq!(stored.size, 16);

        let on_disk = fs::read(dir.path().join("images").join(&stored.filename)).await.unwrap();
        assert_eq!(on_disk.len(), 16);
    }

    #[tokio::test]
    async fn test_rejects_disallowed_type() {
        let dir = tempdir().unwrap();
        let store = UploadStore::new(dir.path().to_path_buf(), 1024);

        assert!(matches!(
            store.begin(MediaKind::Image, Some("application/pdf")).await,
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            store.begin(MediaKind::Voice, Some("image/png")).await,
            Err(AppError::Validation(_))
        ));
        assert!(store.begin(MediaKind::Image, None).await.is_err());
        assert!(store
            .begin(MediaKind::Voice, Some("audio/webm; codecs=opus"))
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_oversized_upload_is_removed() {
        let dir = tempdir().unwrap();
        let store = UploadStore::new(dir.path().to_path_buf(), 8);

        let mut writer = store.begin(MediaKind::Voice, Some("audio/mpeg")).await.unwrap();
        writer.write_chunk(b"12345").await.unwrap();
        let err = writer.write_chunk(b"67890").await.unwrap_err();
        assert!(matches!(err, AppError::PayloadTooLarge { .. }));

        let mut entries = fs::read_dir(dir.path().join("voices")).await.unwrap();
        assert!(entries.next_entry().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_abandoned_upload_is_removed() {
        let dir = tempdir().unwrap();
        let store = UploadStore::new(dir.path().to_path_buf(), 1024);

        let mut writer = store.begin(MediaKind::Image, Some("image/jpeg")).await.unwrap();
        writer.write_chunk(b"partial").await.unwrap();
        drop(writer);

        let mut entries = fs::read_dir(dir.path().join("images")).await.unwrap();
        assert!(entries.next_entry().await.unwrap().is_none());
    }
}
