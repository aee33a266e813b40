//! Object store abstraction
//!
//! Provides a trait for remote store operations that can be implemented
//! by different backends (local filesystem tree, in-memory map).

pub mod fs;
pub mod mem;

pub use fs::FsStore;
pub use mem::MemStore;

use crate::error::StashResult;
use async_trait::async_trait;
use std::path::Path;

/// Abstract object store interface
///
/// A `prefix` is a store key or key-prefix such as `bucket/data/run-1`.
/// It resolves either to a single object (leaf) or to a directory-like
/// set of objects sharing that prefix.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Check whether anything exists at the prefix (leaf or directory)
    async fn exists(&self, prefix: &str) -> StashResult<bool>;

    /// Check whether the prefix is directory-like
    async fn is_dir(&self, prefix: &str) -> StashResult<bool>;

    /// List the immediate children of a directory-like prefix
    ///
    /// Returns full child prefixes. The directory marker entry itself is
    /// never included; callers may recurse into each child directly.
    async fn list(&self, prefix: &str) -> StashResult<Vec<String>>;

    /// Download a leaf object to a local destination path
    async fn download(&self, prefix: &str, dest: &Path) -> StashResult<()>;
}
