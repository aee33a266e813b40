//! In-memory object store
//!
//! Holds objects in a key→bytes map. Directory-like prefixes fall out of
//! the key structure: `a/b` is a child of directory `a`. Used as a test
//! double (it counts downloads and can inject failures) and for demos.

use crate::error::{StashError, StashResult};
use crate::store::ObjectStore;
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use tokio::fs;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Object store backed by an in-memory map
#[derive(Default)]
pub struct MemStore {
    objects: Mutex<BTreeMap<String, Vec<u8>>>,
    downloads: AtomicUsize,
    fail_once: Mutex<HashSet<String>>,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an object under the given key
    pub fn insert(&self, key: impl Into<String>, bytes: impl Into<Vec<u8>>) {
        lock(&self.objects).insert(key.into(), bytes.into());
    }

    /// Number of successful downloads served so far
    pub fn download_count(&self) -> usize {
        self.downloads.load(Ordering::SeqCst)
    }

    /// Make the next download of `key` fail with a transfer error
    pub fn fail_once(&self, key: impl Into<String>) {
        lock(&self.fail_once).insert(key.into());
    }

    fn has_children(&self, base: &str) -> bool {
        let want = format!("{}/", base);
        lock(&self.objects).keys().any(|k| k.starts_with(&want))
    }
}

#[async_trait]
impl ObjectStore for MemStore {
    async fn exists(&self, prefix: &str) -> StashResult<bool> {
        let base = prefix.trim_end_matches('/');
        let exact = lock(&self.objects).contains_key(base);
        Ok(exact || self.has_children(base))
    }

    async fn is_dir(&self, prefix: &str) -> StashResult<bool> {
        Ok(self.has_children(prefix.trim_end_matches('/')))
    }

    async fn list(&self, prefix: &str) -> StashResult<Vec<String>> {
        let base = prefix.trim_end_matches('/');
        let want = format!("{}/", base);

        let mut children = BTreeSet::new();
        for key in lock(&self.objects).keys() {
            if let Some(rest) = key.strip_prefix(&want) {
                let segment = rest.split('/').next().unwrap_or(rest);
                children.insert(format!("{}/{}", base, segment));
            }
        }
        Ok(children.into_iter().collect())
    }

    async fn download(&self, prefix: &str, dest: &Path) -> StashResult<()> {
        if lock(&self.fail_once).remove(prefix) {
            return Err(StashError::transfer(prefix, "injected failure"));
        }

        let bytes = lock(&self.objects)
            .get(prefix)
            .cloned()
            .ok_or_else(|| StashError::not_found(prefix))?;

        fs::write(dest, bytes)
            .await
            .map_err(|e| StashError::transfer(prefix, e.to_string()))?;
        self.downloads.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
