//! Error types for Stash
//!
//! All modules use `StashResult<T>` as their return type.

use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

/// Result type alias for Stash operations
pub type StashResult<T> = Result<T, StashError>;

/// All errors that can occur in Stash
#[derive(Error, Debug)]
pub enum StashError {
    // Store errors
    #[error("Nothing exists at prefix: {prefix}")]
    NotFound { prefix: String },

    #[error("Access denied by the store for prefix: {prefix}")]
    Access { prefix: String },

    #[error("Transfer failed for {prefix}: {reason}")]
    Transfer { prefix: String, reason: String },

    // Cache errors
    #[error("Cache capacity invariant violated: {0}")]
    CapacityInvariant(String),

    /// Result of a materialization shared across concurrent waiters
    #[error("{0}")]
    Shared(Arc<StashError>),

    // Configuration errors
    #[error("Invalid configuration at {path}: {reason}")]
    ConfigInvalid { path: PathBuf, reason: String },

    #[error("Failed to create cache directory {path}: {source}")]
    CacheDirCreate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid path: {path}: {reason}")]
    PathInvalid { path: String, reason: String },

    // IO errors
    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    // General errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("{0}")]
    User(String),
}

impl StashError {
    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create a not-found error for a prefix
    pub fn not_found(prefix: impl Into<String>) -> Self {
        Self::NotFound {
            prefix: prefix.into(),
        }
    }

    /// Create a transfer error for a prefix
    pub fn transfer(prefix: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Transfer {
            prefix: prefix.into(),
            reason: reason.into(),
        }
    }

    /// Short machine-friendly name for the error kind
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "not_found",
            Self::Access { .. } => "access",
            Self::Transfer { .. } => "transfer",
            Self::CapacityInvariant(_) => "capacity_invariant",
            Self::Shared(inner) => inner.kind(),
            Self::ConfigInvalid { .. } => "config_invalid",
            Self::CacheDirCreate { .. } => "cache_dir_create",
            Self::PathInvalid { .. } => "path_invalid",
            Self::Io { .. } => "io",
            Self::Internal(_) => "internal",
            Self::User(_) => "user",
        }
    }

    /// HTTP status class for this error (404/403/500)
    pub fn http_status(&self) -> u16 {
        match self {
            Self::NotFound { .. } => 404,
            Self::Access { .. } | Self::PathInvalid { .. } => 403,
            Self::Shared(inner) => inner.http_status(),
            _ => 500,
        }
    }
}
