//! Prefix materialization
//!
//! Fetches a remote prefix's full content into a local, single-file
//! artifact: leaf objects are downloaded in place, directory-like prefixes
//! are mirrored recursively and packaged into one gzip-compressed tar.
//! Each prefix gets its own slot under the cache namespace, named by the
//! SHA-256 of the prefix string so distinct prefixes can never collide.

use crate::archive;
use crate::cache::entry::CacheEntry;
use crate::error::{StashError, StashResult};
use crate::store::ObjectStore;
use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use sha2::{Digest, Sha256};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tracing::{debug, info};

/// Hash a prefix string into its on-disk slot name (full SHA-256 hex)
pub fn hash_prefix(prefix: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(prefix.as_bytes());
    hex::encode(hasher.finalize())
}

/// Last path segment of a prefix, ignoring any trailing separator
fn basename(prefix: &str) -> &str {
    let trimmed = prefix.trim_end_matches('/');
    trimmed.rsplit('/').next().unwrap_or(trimmed)
}

/// Turns remote prefixes into local artifacts under the cache namespace
pub struct Materializer {
    store: Arc<dyn ObjectStore>,
    namespace: PathBuf,
}

impl Materializer {
    pub fn new(store: Arc<dyn ObjectStore>, namespace: PathBuf) -> Self {
        Self { store, namespace }
    }

    /// Materialize a prefix into a servable local artifact
    ///
    /// Any stale slot left by a prior aborted attempt is discarded first,
    /// and a failed attempt cleans up after itself, so retries always
    /// start from a clean slate.
    pub async fn materialize(&self, prefix: &str) -> StashResult<CacheEntry> {
        let hash = hash_prefix(prefix);
        let slot = self.namespace.join(&hash);

        remove_dir_if_present(&slot).await?;

        let result = self.materialize_into(prefix, &slot, &hash).await;
        if result.is_err() {
            // Partial downloads must not survive into the next attempt
            let _ = fs::remove_dir_all(&slot).await;
        }
        result
    }

    async fn materialize_into(
        &self,
        prefix: &str,
        slot: &Path,
        hash: &str,
    ) -> StashResult<CacheEntry> {
        fs::create_dir_all(slot)
            .await
            .map_err(|e| StashError::CacheDirCreate {
                path: slot.to_path_buf(),
                source: e,
            })?;

        let paths = self.download_tree(prefix, slot).await?;
        debug!("Materialized {} paths for prefix {}", paths.len(), prefix);

        match paths.len() {
            0 => Err(StashError::not_found(prefix)),
            1 => {
                let path = paths.into_iter().next().unwrap_or_default();
                Ok(CacheEntry::new(
                    prefix.to_string(),
                    path,
                    slot.to_path_buf(),
                    false,
                ))
            }
            n => {
                let archive_path = self.namespace.join(format!("{hash}.tar.gz"));
                remove_file_if_present(&archive_path).await?;

                let src = slot.to_path_buf();
                let dest = archive_path.clone();
                tokio::task::spawn_blocking(move || archive::compress_dir(&src, &dest))
                    .await
                    .map_err(|e| StashError::Internal(format!("archive task failed: {e}")))??;

                // The uncompressed mirror is no longer needed
                fs::remove_dir_all(slot)
                    .await
                    .map_err(|e| StashError::io(format!("removing {}", slot.display()), e))?;

                info!("Packaged {} objects from {} into archive", n, prefix);
                Ok(CacheEntry::new(
                    prefix.to_string(),
                    archive_path.clone(),
                    archive_path,
                    true,
                ))
            }
        }
    }

    /// Recursively mirror a prefix into `dest`, returning every created path
    ///
    /// Directory-like prefixes contribute their local directory plus
    /// everything beneath it; leaves contribute the downloaded file.
    fn download_tree<'a>(
        &'a self,
        prefix: &'a str,
        dest: &'a Path,
    ) -> BoxFuture<'a, StashResult<Vec<PathBuf>>> {
        async move {
            debug!("download_tree(prefix={}, dest={})", prefix, dest.display());

            if self.store.is_dir(prefix).await? {
                let dir = dest.join(basename(prefix));
                fs::create_dir_all(&dir)
                    .await
                    .map_err(|e| StashError::io(format!("creating {}", dir.display()), e))?;

                let mut paths = vec![dir.clone()];
                for child in self.store.list(prefix).await? {
                    paths.extend(self.download_tree(&child, &dir).await?);
                }
                Ok(paths)
            } else {
                let file = dest.join(basename(prefix));
                self.store.download(prefix, &file).await?;
                Ok(vec![file])
            }
        }
        .boxed()
    }
}

async fn remove_dir_if_present(path: &Path) -> StashResult<()> {
    match fs::remove_dir_all(path).await {
        Ok(()) => {
            info!("Removed stale cache slot {}", path.display());
            Ok(())
        }
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(StashError::io(format!("removing {}", path.display()), e)),
    }
}

async fn remove_file_if_present(path: &Path) -> StashResult<()> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(StashError::io(format!("removing {}", path.display()), e)),
    }
}
