//! Media blob storage consumed by uploads.
//!
//! The mutation layer only needs a locator back; chunking and retry are the backend's
//! business.

use std::{
    future::Future,
    path::{Component, Path, PathBuf},
};

use tokio::{fs, io::AsyncWriteExt, sync::mpsc};
use url::Url;

use crate::errors::BlobError;

const UPLOAD_CHUNK_SIZE: usize = 256 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadProgress {
    pub bytes_transferred: u64,
    pub total_bytes: u64,
}

impl UploadProgress {
    pub fn percent(&self) -> f64 {
        if self.total_bytes == 0 {
            return 100.0;
        }
        self.bytes_transferred as f64 / self.total_bytes as f64 * 100.0
    }
}

pub trait BlobStorage: Send + Sync + 'static {
    /// Store `bytes` at `path` and return the locator URL for the stored media.
    fn upload(
        &self,
        path: &str,
        bytes: &[u8],
        progress: Option<mpsc::UnboundedSender<UploadProgress>>,
    ) -> impl Future<Output = Result<String, BlobError>> + Send;
}

/// Filesystem-backed blob storage handing out `file://` locators.
#[derive(Debug, Clone)]
pub struct LocalBlobStorage {
    root: PathBuf,
}

impl LocalBlobStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a relative blob path under the root, refusing anything that escapes it.
    fn resolve(&self, path: &str) -> Result<PathBuf, BlobError> {
        let relative = Path::new(path);
        let safe = !path.is_empty()
            && relative
                .components()
                .all(|component| matches!(component, Component::Normal(_)));
        if !safe {
            return Err(BlobError::InvalidPath { path: path.to_string() });
        }
        Ok(self.root.join(relative))
    }
}

impl BlobStorage for LocalBlobStorage {
    async fn upload(
        &self,
        path: &str,
        bytes: &[u8],
        progress: Option<mpsc::UnboundedSender<UploadProgress>>,
    ) -> Result<String, BlobError> {
        let target = self.resolve(path)?;
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).await?;
        }

        let total_bytes = bytes.len() as u64;
        let mut file = fs::File::create(&target).await?;
        let mut transferred = 0u64;
        for chunk in bytes.chunks(UPLOAD_CHUNK_SIZE) {
            file.write_all(chunk).await?;
            transferred += chunk.len() as u64;
            if let Some(progress) = &progress {
                let _ = progress.send(UploadProgress {
                    bytes_transferred: transferred,
                    total_bytes,
                });
            }
        }
        file.flush().await?;

        let absolute = fs::canonicalize(&target).await?;
        let locator = Url::from_file_path(&absolute).map_err(|_| BlobError::InvalidPath {
            path: absolute.display().to_string(),
        })?;
        log::debug!("stored {total_bytes} bytes at {locator}");
        Ok(locator.to_string())
    }
}

/// Media path for an upload: `{folder}/{user}/{millis}_{file name}`.
pub fn media_path(folder: &str, user_id: &str, timestamp_ms: i64, file_name: &str) -> String {
    let file_name = Path::new(file_name)
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("upload");
    format!("{folder}/{user_id}/{timestamp_ms}_{file_name}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn upload_reports_progress_and_returns_file_locator() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalBlobStorage::new(dir.path());
        let (tx, mut rx) = mpsc::unbounded_channel();
        let payload = vec![7u8; UPLOAD_CHUNK_SIZE + 10];

        let locator = storage.upload("videos/u1/1_clip.mp4", &payload, Some(tx)).await.unwrap();
        assert!(locator.starts_with("file://"));
        assert!(locator.ends_with("videos/u1/1_clip.mp4"));
        let written = fs::read(dir.path().join("videos/u1/1_clip.mp4")).await.unwrap();
        assert_eq!(written, payload);

        let mut last = None;
        while let Ok(event) = rx.try_recv() {
            last = Some(event);
        }
        let last = last.expect("progress events");
        assert_eq!(last.bytes_transferred, payload.len() as u64);
        assert_eq!(last.percent(), 100.0);
    }

    #[tokio::test]
    async fn paths_escaping_the_root_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalBlobStorage::new(dir.path());
        let err = storage.upload("../outside.mp4", b"x", None).await.unwrap_err();
        assert!(matches!(err, BlobError::InvalidPath { .. }));
    }

    #[test]
    fn media_path_strips_directories_from_file_names() {
        assert_eq!(media_path("stories", "u1", 5, "/tmp/a/pic.png"), "stories/u1/5_pic.png");
    }
}
