//! Filesystem-backed object store
//!
//! Serves a local directory tree as if it were a remote store: keys map to
//! paths under a fixed root. Useful for running the server against local
//! data and for integration tests.

use crate::error::{StashError, StashResult};
use crate::store::ObjectStore;
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

/// Object store backed by a local directory tree
pub struct FsStore {
    root: PathBuf,
}

impl FsStore {
    /// Create a store rooted at the given directory
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Resolve a prefix to a path under the root, rejecting traversal
    fn resolve(&self, prefix: &str) -> StashResult<PathBuf> {
        let mut path = self.root.clone();
        for part in prefix.split('/').filter(|p| !p.is_empty()) {
            if part == ".." || part == "." {
                return Err(StashError::PathInvalid {
                    path: prefix.to_string(),
                    reason: "path traversal components are not allowed".to_string(),
                });
            }
            path.push(part);
        }
        Ok(path)
    }
}

#[async_trait]
impl ObjectStore for FsStore {
    async fn exists(&self, prefix: &str) -> StashResult<bool> {
        let path = self.resolve(prefix)?;
        fs::try_exists(&path)
            .await
            .map_err(|e| StashError::io(format!("checking existence of {}", path.display()), e))
    }

    async fn is_dir(&self, prefix: &str) -> StashResult<bool> {
        let path = self.resolve(prefix)?;
        match fs::metadata(&path).await {
            Ok(meta) => Ok(meta.is_dir()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StashError::io(
                format!("reading metadata of {}", path.display()),
                e,
            )),
        }
    }

    async fn list(&self, prefix: &str) -> StashResult<Vec<String>> {
        let path = self.resolve(prefix)?;
        let mut reader = fs::read_dir(&path).await.map_err(|e| match e.kind() {
            ErrorKind::NotFound => StashError::not_found(prefix),
            ErrorKind::PermissionDenied => StashError::Access {
                prefix: prefix.to_string(),
            },
            _ => StashError::transfer(prefix, e.to_string()),
        })?;

        let base = prefix.trim_end_matches('/');
        let mut children = Vec::new();
        while let Some(entry) = reader
            .next_entry()
            .await
            .map_err(|e| StashError::transfer(prefix, e.to_string()))?
        {
            let name = entry.file_name().to_string_lossy().into_owned();
            if base.is_empty() {
                children.push(name);
            } else {
                children.push(format!("{}/{}", base, name));
            }
        }

        // Stable order keeps archives deterministic across runs
        children.sort();
        debug!("Listed {} children under {}", children.len(), prefix);
        Ok(children)
    }

    async fn download(&self, prefix: &str, dest: &Path) -> StashResult<()> {
        let src = self.resolve(prefix)?;
        match fs::copy(&src, dest).await {
            Ok(bytes) => {
                debug!("Downloaded {} ({} bytes)", prefix, bytes);
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Err(StashError::not_found(prefix)),
            Err(e) if e.kind() == ErrorKind::PermissionDenied => Err(StashError::Access {
                prefix: prefix.to_string(),
            }),
            Err(e) => Err(StashError::transfer(prefix, e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs as std_fs;
    use tempfile::TempDir;

    fn store_with_tree() -> (TempDir, FsStore) {
        let dir = TempDir::new().unwrap();
        std_fs::create_dir_all(dir.path().join("bucket/data")).unwrap();
        std_fs::write(dir.path().join("bucket/data/a.txt"), b"alpha").unwrap();
        std_fs::write(dir.path().join("bucket/data/b.txt"), b"beta").unwrap();
        std_fs::write(dir.path().join("bucket/top.txt"), b"top").unwrap();
        let store = FsStore::new(dir.path());
        (dir, store)
    }

    #[tokio::test]
    async fn exists_and_is_dir() {
        let (_dir, store) = store_with_tree();
        assert!(store.exists("bucket/data").await.unwrap());
        assert!(store.exists("bucket/top.txt").await.unwrap());
        assert!(!store.exists("bucket/nope").await.unwrap());
        assert!(store.is_dir("bucket/data").await.unwrap());
        assert!(!store.is_dir("bucket/top.txt").await.unwrap());
        assert!(!store.is_dir("bucket/nope").await.unwrap());
    }

    #[tokio::test]
    async fn list_returns_sorted_children() {
        let (_dir, store) = store_with_tree();
        let children = store.list("bucket/data").await.unwrap();
        assert_eq!(children, vec!["bucket/data/a.txt", "bucket/data/b.txt"]);
    }

    #[tokio::test]
    async fn list_missing_is_not_found() {
        let (_dir, store) = store_with_tree();
        let err = store.list("bucket/ghost").await.unwrap_err();
        assert_eq!(err.kind(), "not_found");
    }

    #[tokio::test]
    async fn download_copies_object() {
        let (dir, store) = store_with_tree();
        let dest = dir.path().join("out.txt");
        store.download("bucket/top.txt", &dest).await.unwrap();
        assert_eq!(std_fs::read(&dest).unwrap(), b"top");
    }

    #[tokio::test]
    async fn traversal_is_rejected() {
        let (_dir, store) = store_with_tree();
        let err = store.exists("bucket/../etc/passwd").await.unwrap_err();
        assert_eq!(err.kind(), "path_invalid");
    }
}
