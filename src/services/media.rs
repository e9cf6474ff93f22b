//! Media Store
//!
//! Downloads photos sent to the bot, keeps a local copy under the media
//! directory and fingerprints them so reused screenshots can be flagged.

use std::path::PathBuf;

use blogger_flow_core::UserId;
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::services::remote::adapters::ChatAdapter;
use crate::storage::Database;
use crate::utils::error::AppResult;
use crate::utils::paths::ensure_dir;

/// Result of storing one photo.
#[derive(Debug, Clone)]
pub struct StoredMedia {
    pub path: PathBuf,
    pub hash: String,
    /// Content was already seen, from any user
    pub duplicate: bool,
}

/// Local photo archive.
#[derive(Debug, Clone)]
pub struct MediaStore {
    dir: PathBuf,
}

impl MediaStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Download `file_id`, save it as `<dir>/<user_id>/<name>` and record
    /// its hash.
    pub async fn store(
        &self,
        adapter: &dyn ChatAdapter,
        db: &Database,
        user_id: UserId,
        file_id: &str,
        name: &str,
        now: DateTime<Utc>,
    ) -> AppResult<StoredMedia> {
        let bytes = adapter.download_file(file_id).await?;
        let hash = compute_sha256(&bytes);

        let user_dir = self.dir.join(user_id.to_string());
        ensure_dir(&user_dir)?;
        let path = user_dir.join(name);
        tokio::fs::write(&path, &bytes).await?;

        let duplicate = db.is_media_known(&hash)?;
        if duplicate {
            warn!(user_id, file = %name, "Media content seen before");
        } else {
            db.record_media(&hash, user_id, name, now)?;
        }
        debug!(path = %path.display(), bytes = bytes.len(), "Media stored");

        Ok(StoredMedia {
            path,
            hash,
            duplicate,
        })
    }
}

/// Compute SHA-256 hash of content, returning the full hex string.
pub fn compute_sha256(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    let result = hasher.finalize();
    result.iter().map(|b| format!("{:02x}", b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::remote::adapters::recording::RecordingAdapter;

    fn now() -> DateTime<Utc> {
        chrono::TimeZone::with_ymd_and_hms(&Utc, 2025, 8, 1, 10, 0, 0).unwrap()
    }

    #[test]
    fn test_compute_sha256() {
        assert_eq!(
            compute_sha256(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[tokio::test]
    async fn test_store_saves_file_and_flags_repeats() {
        let dir = tempfile::tempdir().unwrap();
        let store = MediaStore::new(dir.path());
        let db = Database::new_in_memory().unwrap();
        let adapter = RecordingAdapter::new();
        adapter.put_file("file-a", vec![1, 2, 3]).await;
        adapter.put_file("file-b", vec![1, 2, 3]).await;

        let first = store
            .store(&adapter, &db, 7, "file-a", "reach.jpg", now())
            .await
            .unwrap();
        assert!(!first.duplicate);
        assert_eq!(std::fs::read(&first.path).unwrap(), vec![1, 2, 3]);
        assert_eq!(first.path, dir.path().join("7").join("reach.jpg"));

        let second = store
            .store(&adapter, &db, 8, "file-b", "reach.jpg", now())
            .await
            .unwrap();
        assert!(second.duplicate);
        assert_eq!(second.hash, first.hash);
    }
}
