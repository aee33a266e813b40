//! HTTP front end
//!
//! Routes requests onto the prefix cache: `/` is a splash page listing
//! the allowed bucket prefixes and cache counters, `/stats` exposes the
//! counters as JSON, and any other path is resolved as a store prefix and
//! served as a file download.

use crate::cache::PrefixCache;
use crate::error::StashError;
use crate::store::ObjectStore;
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use std::sync::Arc;
use tracing::{error, info};

/// Shared state for all request handlers
pub struct AppState {
    /// Prefixes a request path must start with to be served
    pub buckets: Vec<String>,
    pub store: Arc<dyn ObjectStore>,
    pub cache: PrefixCache,
}

impl AppState {
    fn is_allowed(&self, path: &str) -> bool {
        self.buckets.iter().any(|b| path.starts_with(b.as_str()))
    }
}

/// Build the application router
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(splash))
        .route("/stats", get(stats))
        .route("/{*path}", get(fetch_prefix))
        .with_state(state)
}

async fn splash(State(state): State<Arc<AppState>>) -> Html<String> {
    let buckets = state
        .buckets
        .iter()
        .map(|b| format!("<li>{b}</li>"))
        .collect::<Vec<_>>()
        .join("\n");
    Html(format!(
        "<p>You can request files matching any of the following buckets:</p>\n\
         <ul>\n{buckets}\n</ul>\n<p>{}</p>",
        state.cache.stats()
    ))
}

async fn stats(State(state): State<Arc<AppState>>) -> Response {
    Json(state.cache.stats()).into_response()
}

async fn fetch_prefix(State(state): State<Arc<AppState>>, Path(path): Path<String>) -> Response {
    if !state.is_allowed(&path) {
        return access_denied(&path);
    }

    match state.store.exists(&path).await {
        Ok(true) => {}
        Ok(false) => return not_found(&path),
        Err(e) => {
            error!("Existence check failed for {}: {}", path, e);
            return match e.http_status() {
                404 => not_found(&path),
                403 => access_denied(&path),
                _ => failure(&path, &e),
            };
        }
    }

    let entry = match state.cache.get(&path).await {
        Ok(entry) => entry,
        Err(e) => {
            error!("Materialization failed for {}: {}", path, e);
            return match e.http_status() {
                404 => not_found(&path),
                403 => access_denied(&path),
                _ => failure(&path, &e),
            };
        }
    };

    // Read the whole artifact before responding so a concurrent eviction
    // cannot delete it out from under a partially-streamed response.
    let bytes = match tokio::fs::read(&entry.path).await {
        Ok(bytes) => bytes,
        Err(e) => {
            let err = StashError::io(format!("reading artifact {}", entry.path.display()), e);
            error!("Serving failed for {}: {}", path, err);
            return failure(&path, &err);
        }
    };

    let filename = entry
        .path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "download".to_string());
    let content_type = if entry.is_archive {
        "application/gzip"
    } else {
        "application/octet-stream"
    };

    info!("Serving {} ({} bytes) for {}", filename, bytes.len(), path);
    (
        [
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{filename}\""),
            ),
            (header::CONTENT_TYPE, content_type.to_string()),
            (header::CACHE_CONTROL, "max-age=86400".to_string()),
        ],
        bytes,
    )
        .into_response()
}

fn access_denied(path: &str) -> Response {
    (
        StatusCode::FORBIDDEN,
        Html(format!("<p>I am afraid I cannot access `{path}`, Dave.</p>")),
    )
        .into_response()
}

fn not_found(path: &str) -> Response {
    (
        StatusCode::NOT_FOUND,
        Html(format!("<p>There is nothing at `{path}`.</p>")),
    )
        .into_response()
}

fn failure(path: &str, err: &StashError) -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Html(format!(
            "<p>Failed to fetch `{path}` ({} error).</p>",
            err.kind()
        )),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::materialize::Materializer;
    use crate::store::{FsStore, MemStore};
    use tempfile::TempDir;

    async fn state_with(buckets: &[&str]) -> (TempDir, Arc<MemStore>, Arc<AppState>) {
        let dir = TempDir::new().unwrap();
        let namespace = dir.path().join("ns");
        let store = Arc::new(MemStore::new());
        let materializer = Arc::new(Materializer::new(store.clone(), namespace.clone()));
        let cache = PrefixCache::new(materializer, namespace, 8).await.unwrap();
        let state = Arc::new(AppState {
            buckets: buckets.iter().map(|b| b.to_string()).collect(),
            store: store.clone(),
            cache,
        });
        (dir, store, state)
    }

    #[tokio::test]
    async fn path_outside_allow_list_is_forbidden() {
        let (_dir, _store, state) = state_with(&["public/"]).await;
        let resp = fetch_prefix(State(state), Path("secret/key".into())).await;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn missing_prefix_is_not_found() {
        let (_dir, _store, state) = state_with(&["public/"]).await;
        let resp = fetch_prefix(State(state), Path("public/ghost".into())).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn leaf_download_has_attachment_headers() {
        let (_dir, store, state) = state_with(&["public/"]).await;
        store.insert("public/report.csv", b"a,b\n1,2\n".to_vec());

        let resp = fetch_prefix(State(state), Path("public/report.csv".into())).await;

        assert_eq!(resp.status(), StatusCode::OK);
        let headers = resp.headers();
        assert_eq!(
            headers.get(header::CONTENT_DISPOSITION).unwrap(),
            "attachment; filename=\"report.csv\""
        );
        assert_eq!(headers.get(header::CACHE_CONTROL).unwrap(), "max-age=86400");
        assert_eq!(
            headers.get(header::CONTENT_TYPE).unwrap(),
            "application/octet-stream"
        );
    }

    #[tokio::test]
    async fn directory_download_is_gzip_archive() {
        let (_dir, store, state) = state_with(&["public/"]).await;
        store.insert("public/run/a.txt", b"alpha".to_vec());
        store.insert("public/run/b.txt", b"beta".to_vec());

        let resp = fetch_prefix(State(state), Path("public/run".into())).await;

        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            resp.headers().get(header::CONTENT_TYPE).unwrap(),
            "application/gzip"
        );
    }

    #[tokio::test]
    async fn traversal_inside_allowed_bucket_is_forbidden() {
        // FsStore-backed state so the existence check itself rejects the path
        let data = TempDir::new().unwrap();
        std::fs::create_dir_all(data.path().join("public")).unwrap();
        let cache_dir = TempDir::new().unwrap();

        let store: Arc<dyn ObjectStore> = Arc::new(FsStore::new(data.path()));
        let namespace = cache_dir.path().join("ns");
        let materializer = Arc::new(Materializer::new(store.clone(), namespace.clone()));
        let cache = PrefixCache::new(materializer, namespace, 4).await.unwrap();
        let state = Arc::new(AppState {
            buckets: vec!["public/".to_string()],
            store,
            cache,
        });

        let resp = fetch_prefix(State(state), Path("public/../secret.txt".into())).await;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn transfer_failure_is_internal_error() {
        let (_dir, store, state) = state_with(&["public/"]).await;
        store.insert("public/flaky.txt", b"data".to_vec());
        store.fail_once("public/flaky.txt");

        let resp = fetch_prefix(State(state), Path("public/flaky.txt".into())).await;
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
