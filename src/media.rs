//! File-backed media collaborator.
//!
//! Inbound screenshots arrive base64 encoded. They are written under the
//! configured directory with a random name and referenced by relative path.

use std::path::PathBuf;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use crate::error::MediaError;

#[derive(Clone, Debug)]
pub struct MediaStore {
    root: PathBuf,
}

fn extension_for(mime: &str) -> &'static str {
    match mime {
        "image/png" => "png",
        "image/webp" => "webp",
        "image/gif" => "gif",
        "application/pdf" => "pdf",
        _ => "jpg",
    }
}

impl MediaStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Decode and persist one media item; returns its reference.
    #[instrument(level = "debug", skip(self, data_base64), fields(%mime, b64_len = data_base64.len()))]
    pub async fn save(&self, data_base64: &str, mime: &str) -> Result<String, MediaError> {
        let bytes = STANDARD.decode(data_base64.trim())?;
        if bytes.is_empty() {
            return Err(MediaError::Empty);
        }
        tokio::fs::create_dir_all(&self.root).await?;
        let name = format!("{}.{}", Uuid::new_v4(), extension_for(mime));
        let path = self.root.join(&name);
        tokio::fs::write(&path, &bytes).await?;
        debug!(target: "media", path = %path.display(), bytes = bytes.len(), "Media saved");
        Ok(path.to_string_lossy().into_owned())
    }

    /// Best-effort removal. Files already gone are fine; other failures are logged.
    pub async fn remove_all(&self, refs: &[String]) {
        for r in refs {
            match tokio::fs::remove_file(r).await {
                Ok(()) => debug!(target: "media", path = %r, "Media removed"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!(target: "media", path = %r, error = %e, "Could not remove media"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn save_then_remove() {
        let dir = tempfile::tempdir().unwrap();
        let media = MediaStore::new(dir.path().join("task_media"));
        let r = media.save(&STANDARD.encode(b"png-bytes"), "image/png").await.unwrap();
        assert!(r.ends_with(".png"));
        assert_eq!(tokio::fs::read(&r).await.unwrap(), b"png-bytes");

        media.remove_all(&[r.clone(), r.clone()]).await;
        assert!(!std::path::Path::new(&r).exists());
    }

    #[tokio::test]
    async fn rejects_garbage_and_empty_payloads() {
        let dir = tempfile::tempdir().unwrap();
        let media = MediaStore::new(dir.path());
        assert!(matches!(media.save("%%%", "image/jpeg").await, Err(MediaError::Decode(_))));
        assert!(matches!(media.save("", "image/jpeg").await, Err(MediaError::Empty)));
    }
}
