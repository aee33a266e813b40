//! CLI argument definitions using clap derive

use clap::{ArgAction, Parser};
use std::net::IpAddr;
use std::path::PathBuf;

/// Stash - object store prefix cache server
///
/// Serves store prefixes as downloadable files, keeping a size-bounded
/// local disk cache so repeated requests skip the remote fetch.
#[derive(Parser, Debug)]
#[command(name = "stash")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Bucket prefix requests may match (repeatable)
    #[arg(short, long = "bucket", env = "STASH_BUCKETS", value_delimiter = ',')]
    pub buckets: Vec<String>,

    /// Address to bind the HTTP listener to
    #[arg(short = 's', long, env = "STASH_HOST")]
    pub host: Option<IpAddr>,

    /// Port to listen on
    #[arg(short, long, env = "STASH_PORT")]
    pub port: Option<u16>,

    /// Root directory the cache namespace lives under
    #[arg(short, long, env = "STASH_CACHE_DIR")]
    pub cache_dir: Option<PathBuf>,

    /// Maximum number of cached prefixes
    #[arg(short = 'z', long, env = "STASH_CACHE_SIZE")]
    pub cache_size: Option<usize>,

    /// Root of the local directory tree served as the object store
    #[arg(long, env = "STASH_STORE_ROOT")]
    pub store_root: Option<PathBuf>,

    /// Configuration file path
    #[arg(long, env = "STASH_CONFIG")]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}
