//! Stash - object store prefix cache server
//!
//! Fronts an object store with an HTTP endpoint that serves store
//! prefixes as downloadable files, backed by a size-bounded LRU disk
//! cache of materialized artifacts.

pub mod archive;
pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod materialize;
pub mod server;
pub mod store;

pub use error::{StashError, StashResult};
