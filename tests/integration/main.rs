//! Integration tests for Stash

mod cli_tests {
    use assert_cmd::{cargo::cargo_bin_cmd, Command};
    use predicates::prelude::*;

    fn stash() -> Command {
        let mut cmd = cargo_bin_cmd!("stash");
        cmd.env_remove("STASH_BUCKETS");
        cmd
    }

    #[test]
    fn help_displays() {
        stash()
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("fronting an object store"));
    }

    #[test]
    fn version_displays() {
        stash()
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("stash"));
    }

    #[test]
    fn missing_buckets_fail() {
        stash()
            .assert()
            .failure()
            .stderr(predicate::str::contains("bucket prefix is required"));
    }

    #[test]
    fn zero_cache_size_fails() {
        stash()
            .args(["-b", "public/", "-z", "0"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("positive"));
    }
}

mod http_tests {
    use stash::cache::PrefixCache;
    use stash::materialize::Materializer;
    use stash::server::{router, AppState};
    use stash::store::{FsStore, ObjectStore};
    use std::net::SocketAddr;
    use std::sync::Arc;
    use tempfile::TempDir;

    struct TestServer {
        addr: SocketAddr,
        _data: TempDir,
        _cache: TempDir,
    }

    /// Spin up a server over a small local tree on an ephemeral port
    async fn serve(buckets: &[&str]) -> TestServer {
        let data = TempDir::new().unwrap();
        std::fs::create_dir_all(data.path().join("public/run")).unwrap();
        std::fs::write(data.path().join("public/hello.txt"), b"hello world").unwrap();
        std::fs::write(data.path().join("public/run/a.txt"), b"alpha").unwrap();
        std::fs::write(data.path().join("public/run/b.txt"), b"beta").unwrap();
        std::fs::write(data.path().join("secret.txt"), b"secret").unwrap();

        let cache_dir = TempDir::new().unwrap();
        let store: Arc<dyn ObjectStore> = Arc::new(FsStore::new(data.path()));
        let namespace = cache_dir.path().join("stash");
        let materializer = Arc::new(Materializer::new(store.clone(), namespace.clone()));
        let cache = PrefixCache::new(materializer, namespace, 8).await.unwrap();

        let state = Arc::new(AppState {
            buckets: buckets.iter().map(|b| b.to_string()).collect(),
            store,
            cache,
        });

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router(state)).await.unwrap();
        });

        TestServer {
            addr,
            _data: data,
            _cache: cache_dir,
        }
    }

    async fn fetch(
        addr: SocketAddr,
        path: &str,
    ) -> Result<ureq::http::Response<ureq::Body>, ureq::Error> {
        let url = format!("http://{addr}{path}");
        tokio::task::spawn_blocking(move || ureq::get(&url).call())
            .await
            .unwrap()
    }

    fn status_of(result: Result<ureq::http::Response<ureq::Body>, ureq::Error>) -> u16 {
        match result {
            Ok(resp) => resp.status().as_u16(),
            Err(ureq::Error::StatusCode(code)) => code,
            Err(e) => panic!("request failed: {e}"),
        }
    }

    #[tokio::test]
    async fn splash_lists_buckets_and_stats() {
        let server = serve(&["public/"]).await;
        let mut resp = fetch(server.addr, "/").await.unwrap();
        let body = resp.body_mut().read_to_string().unwrap();
        assert!(body.contains("public/"));
        assert!(body.contains("hits=0"));
    }

    #[tokio::test]
    async fn outside_allow_list_is_forbidden() {
        let server = serve(&["public/"]).await;
        assert_eq!(status_of(fetch(server.addr, "/secret.txt").await), 403);
    }

    #[tokio::test]
    async fn missing_prefix_is_not_found() {
        let server = serve(&["public/"]).await;
        assert_eq!(status_of(fetch(server.addr, "/public/ghost").await), 404);
    }

    #[tokio::test]
    async fn leaf_prefix_downloads_verbatim() {
        let server = serve(&["public/"]).await;
        let mut resp = fetch(server.addr, "/public/hello.txt").await.unwrap();

        assert_eq!(
            resp.headers().get("content-disposition").unwrap(),
            "attachment; filename=\"hello.txt\""
        );
        assert_eq!(resp.headers().get("cache-control").unwrap(), "max-age=86400");
        assert_eq!(resp.body_mut().read_to_vec().unwrap(), b"hello world");
    }

    #[tokio::test]
    async fn directory_prefix_downloads_as_archive() {
        let server = serve(&["public/"]).await;
        let mut resp = fetch(server.addr, "/public/run").await.unwrap();

        assert_eq!(
            resp.headers().get("content-type").unwrap(),
            "application/gzip"
        );
        let body = resp.body_mut().read_to_vec().unwrap();
        // gzip magic
        assert_eq!(&body[..2], &[0x1f, 0x8b]);
    }

    #[tokio::test]
    async fn repeated_requests_count_as_hits() {
        let server = serve(&["public/"]).await;
        fetch(server.addr, "/public/hello.txt").await.unwrap();
        fetch(server.addr, "/public/hello.txt").await.unwrap();

        let mut resp = fetch(server.addr, "/stats").await.unwrap();
        let stats: serde_json::Value =
            serde_json::from_str(&resp.body_mut().read_to_string().unwrap()).unwrap();
        assert_eq!(stats["misses"], 1);
        assert_eq!(stats["hits"], 1);
        assert_eq!(stats["size"], 1);
        assert_eq!(stats["capacity"], 8);
    }
}
