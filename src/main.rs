//! Stash - object store prefix cache server
//!
//! CLI entry point: resolves configuration, wires the store, the
//! materializer and the cache together, and runs the HTTP server until
//! interrupted.

use clap::Parser;
use console::style;
use stash::cache::PrefixCache;
use stash::cli::Cli;
use stash::config::Config;
use stash::error::{StashError, StashResult};
use stash::materialize::Materializer;
use stash::server::{self, AppState};
use stash::store::{FsStore, ObjectStore};
use std::net::SocketAddr;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", style("Error:").red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

async fn run() -> StashResult<()> {
    let cli = Cli::parse();

    // Initialize logging: 0 = warn, 1 = info, 2+ = debug
    let filter = match cli.verbose {
        0 => EnvFilter::new("stash=warn"),
        1 => EnvFilter::new("stash=info"),
        _ => EnvFilter::new("stash=debug"),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let mut config = if let Some(ref path) = cli.config {
        Config::load(path).await?
    } else {
        Config::default()
    };
    config.apply_cli(&cli);
    config.validate()?;

    print_buckets(&config.buckets);

    let store: Arc<dyn ObjectStore> = Arc::new(FsStore::new(&config.store_root));
    let namespace = config.namespace();
    let materializer = Arc::new(Materializer::new(store.clone(), namespace.clone()));
    let cache = PrefixCache::new(materializer, namespace, config.cache_size).await?;

    let state = Arc::new(AppState {
        buckets: config.buckets.clone(),
        store,
        cache,
    });

    let addr = SocketAddr::new(config.host, config.port);
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| StashError::io(format!("binding to {addr}"), e))?;
    info!("Serving on http://{}", addr);

    axum::serve(listener, server::router(state.clone()))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| StashError::io("serving HTTP".to_string(), e))?;

    // Namespace teardown: every cached artifact dies with the process
    state.cache.shutdown().await
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("Received interrupt, shutting down");
}

fn print_buckets(buckets: &[String]) {
    let width = buckets.iter().map(|b| b.len()).max().unwrap_or(0) + 4;
    println!("{}", "-".repeat(width));
    println!("{}", style("Bucket prefixes:").bold());
    for bucket in buckets {
        println!("  - {bucket}");
    }
    println!("{}", "-".repeat(width));
}
