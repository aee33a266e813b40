//! Cache entry lifecycle
//!
//! A `CacheEntry` owns one materialized artifact on disk. It is created by
//! the materializer and destroyed exactly once by the cache, at eviction
//! or shutdown. Nothing else may delete the artifact while the entry is
//! live; deletion is always explicit, never tied to drop timing.

use crate::error::{StashError, StashResult};
use chrono::{DateTime, Utc};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::info;

/// A materialized prefix held by the cache
#[derive(Debug)]
pub struct CacheEntry {
    /// The prefix string this entry was materialized from
    pub key: String,
    /// Path of the servable artifact (a file, or a `.tar.gz` archive)
    pub path: PathBuf,
    /// The on-disk slot the cache retires and removes when the entry
    /// dies: the hashed per-prefix directory for plain artifacts, the
    /// archive file itself for archived ones
    pub slot: PathBuf,
    /// Whether the artifact is a compressed archive of a multi-object prefix
    pub is_archive: bool,
    /// When materialization completed
    pub created_at: DateTime<Utc>,
}

impl CacheEntry {
    pub fn new(key: String, path: PathBuf, slot: PathBuf, is_archive: bool) -> Self {
        Self {
            key,
            path,
            slot,
            is_archive,
            created_at: Utc::now(),
        }
    }
}

/// Remove an artifact slot (file or directory) from disk
///
/// Called by the cache on the retired slot of an evicted entry. A missing
/// path is not an error, which keeps namespace-wide teardown idempotent.
pub async fn delete_path(path: &Path) -> StashResult<()> {
    info!("Invalidating cache at {}", path.display());
    let result = match fs::metadata(path).await {
        Ok(meta) if meta.is_dir() => fs::remove_dir_all(path).await,
        Ok(_) => fs::remove_file(path).await,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
        Err(e) => Err(e),
    };
    result.map_err(|e| StashError::io(format!("deleting artifact {}", path.display()), e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn delete_removes_file_slot() {
        let dir = TempDir::new().unwrap();
        let slot = dir.path().join("abc.tar.gz");
        std::fs::write(&slot, b"archive").unwrap();

        delete_path(&slot).await.unwrap();
        assert!(!slot.exists());
    }

    #[tokio::test]
    async fn delete_removes_directory_slot() {
        let dir = TempDir::new().unwrap();
        let slot = dir.path().join("abc");
        std::fs::create_dir_all(&slot).unwrap();
        std::fs::write(slot.join("file.txt"), b"data").unwrap();

        delete_path(&slot).await.unwrap();
        assert!(!slot.exists());
    }

    #[tokio::test]
    async fn delete_missing_slot_is_ok() {
        let dir = TempDir::new().unwrap();
        let slot = dir.path().join("gone");
        delete_path(&slot).await.unwrap();
        delete_path(&slot).await.unwrap();
    }
}
