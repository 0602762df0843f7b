//! Integration tests against a running server
//!
//! Each test binds its own server on a random port and drives it over
//! real HTTP, covering the full plug pipeline from request to cache
//! header.

use outerfaces_rev::cache_policy::{CACHE_IMMUTABLE, CACHE_NO_CACHE};
use outerfaces_rev::proxy::MismatchPolicy;
use outerfaces_rev::{RevServer, RevisionProvider, ServeConfig};
use std::fs;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;
use tokio::task::JoinHandle;

fn write_tree(root: &Path) {
    fs::create_dir_all(root.join("js")).unwrap();
    fs::create_dir_all(root.join("cdn/lib")).unwrap();
    fs::write(
        root.join("js/main.of.js"),
        "import { x } from '[OUTERFACES_CDN]/lib/a.js';\n",
    )
    .unwrap();
    fs::write(
        root.join("index.of.html"),
        "<html><head><title>app</title></head><body><div id=\"app\"></div></body></html>",
    )
    .unwrap();
    fs::write(root.join("data.json"), "{\"a\":1}").unwrap();
    fs::write(root.join("cdn/lib/a.js"), "export const x = 1;\n").unwrap();
}

/// Bind a server on a random port and run it in the background
async fn spawn_server(policy: MismatchPolicy) -> (SocketAddr, TempDir, JoinHandle<()>) {
    let dir = TempDir::new().unwrap();
    write_tree(dir.path());

    let mut config = ServeConfig::default();
    config.listen_address = "127.0.0.1:0".to_string();
    config.mismatch_policy = policy;
    config
        .asset_roots
        .insert("spa".to_string(), dir.path().to_string_lossy().into_owned());
    config.asset_roots.insert(
        "cdn".to_string(),
        dir.path().join("cdn").to_string_lossy().into_owned(),
    );
    config.app_revision = Some("deadbeef".to_string());
    config.enable_vcs_revision = false;

    let config = Arc::new(config);
    let provider =
        Arc::new(RevisionProvider::from_config(&config).with_env_var("OUTERFACES_REV_E2E_TESTS"));
    let server = Arc::new(RevServer::new(config, provider));

    let listener = server.bind().await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        let _ = server.run(listener).await;
    });

    (addr, dir, handle)
}

fn header<'a>(response: &'a reqwest::Response, name: &str) -> &'a str {
    response
        .headers()
        .get(name)
        .unwrap_or_else(|| panic!("missing header {}", name))
        .to_str()
        .unwrap()
}

#[tokio::test]
async fn test_serves_pinned_asset_with_immutable_cache() {
    let (addr, _dir, handle) = spawn_server(MismatchPolicy::Redirect).await;

    let url = format!("http://{}/__rev/deadbeef/spa/js/main.of.js", addr);
    let response = reqwest::get(&url).await.unwrap();

    assert_eq!(response.status().as_u16(), 200);
    assert_eq!(header(&response, "cache-control"), CACHE_IMMUTABLE);
    assert!(header(&response, "content-type").contains("javascript"));

    let body = response.text().await.unwrap();
    assert_eq!(body, "import { x } from '/__rev/deadbeef/cdn/lib/a.js';\n");

    handle.abort();
}

#[tokio::test]
async fn test_serves_pinned_cdn_asset() {
    let (addr, _dir, handle) = spawn_server(MismatchPolicy::Redirect).await;

    let url = format!("http://{}/__rev/deadbeef/cdn/lib/a.js", addr);
    let response = reqwest::get(&url).await.unwrap();

    assert_eq!(response.status().as_u16(), 200);
    assert_eq!(header(&response, "cache-control"), CACHE_IMMUTABLE);
    let body = response.text().await.unwrap();
    assert_eq!(body, "export const x = 1;\n");

    handle.abort();
}

#[tokio::test]
async fn test_rejects_stale_asset_fetch_with_conflict() {
    let (addr, _dir, handle) = spawn_server(MismatchPolicy::Redirect).await;

    let url = format!("http://{}/__rev/stale01/spa/js/main.of.js", addr);
    let response = reqwest::get(&url).await.unwrap();

    assert_eq!(response.status().as_u16(), 409);
    assert_eq!(header(&response, "x-outerfaces-rev-mismatch"), "true");
    assert_eq!(header(&response, "cache-control"), CACHE_NO_CACHE);
    assert_eq!(
        header(&response, "content-type"),
        "application/json; charset=utf-8"
    );

    let body = response.text().await.unwrap();
    let json: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["error"], "revision_mismatch");
    assert_eq!(json["requested_revision"], "stale01");
    assert_eq!(json["current_revision"], "deadbeef");
    assert_eq!(
        json["message"],
        "Requested revision stale01 does not match current revision deadbeef. \
         Reload the application."
    );

    handle.abort();
}

#[tokio::test]
async fn test_redirects_stale_navigation() {
    let (addr, _dir, handle) = spawn_server(MismatchPolicy::Redirect).await;

    let client = reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap();
    let url = format!("http://{}/__rev/stale01/spa/index.of.html", addr);
    let response = client
        .get(&url)
        .header("sec-fetch-mode", "navigate")
        .header("accept", "text/html,application/xhtml+xml")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 302);
    assert_eq!(header(&response, "location"), "/");
    assert_eq!(header(&response, "x-outerfaces-rev-mismatch"), "true");

    handle.abort();
}

#[tokio::test]
async fn test_conflict_policy_rejects_stale_navigation() {
    let (addr, _dir, handle) = spawn_server(MismatchPolicy::Conflict).await;

    let url = format!("http://{}/__rev/stale01/spa/index.of.html", addr);
    let response = reqwest::Client::new()
        .get(&url)
        .header("sec-fetch-mode", "navigate")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 409);

    handle.abort();
}

#[tokio::test]
async fn test_revision_endpoint() {
    let (addr, _dir, handle) = spawn_server(MismatchPolicy::Redirect).await;

    let url = format!("http://{}/__rev", addr);
    let response = reqwest::get(&url).await.unwrap();

    assert_eq!(response.status().as_u16(), 200);
    assert_eq!(header(&response, "access-control-allow-origin"), "*");
    assert_eq!(header(&response, "cache-control"), CACHE_NO_CACHE);

    let body = response.text().await.unwrap();
    let json: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["revision"], "deadbeef");
    assert_eq!(json["schema_version"], "1.0");
    assert!(json["timestamp"].is_u64());

    handle.abort();
}

#[tokio::test]
async fn test_revision_endpoint_rejects_post() {
    let (addr, _dir, handle) = spawn_server(MismatchPolicy::Redirect).await;

    let url = format!("http://{}/__rev", addr);
    let response = reqwest::Client::new().post(&url).send().await.unwrap();

    assert_eq!(response.status().as_u16(), 405);
    assert_eq!(header(&response, "allow"), "GET");

    handle.abort();
}

#[tokio::test]
async fn test_spa_fallback_for_deep_links() {
    let (addr, _dir, handle) = spawn_server(MismatchPolicy::Redirect).await;

    let url = format!("http://{}/app/settings/profile", addr);
    let response = reqwest::Client::new()
        .get(&url)
        .header("sec-fetch-mode", "navigate")
        .header("accept", "text/html,application/xhtml+xml")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 200);
    assert_eq!(header(&response, "cache-control"), CACHE_NO_CACHE);
    assert!(header(&response, "content-type").starts_with("text/html"));

    let body = response.text().await.unwrap();
    assert!(body.contains("<meta name=\"outerfaces-rev\" content=\"deadbeef\">"));
    assert!(body.contains("<div id=\"app\"></div>"));

    handle.abort();
}

#[tokio::test]
async fn test_root_navigation_serves_bootstrap() {
    let (addr, _dir, handle) = spawn_server(MismatchPolicy::Redirect).await;

    let url = format!("http://{}/", addr);
    let response = reqwest::Client::new()
        .get(&url)
        .header("accept", "text/html")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 200);
    let body = response.text().await.unwrap();
    assert!(body.contains("<meta name=\"outerfaces-rev\" content=\"deadbeef\">"));

    handle.abort();
}

#[tokio::test]
async fn test_asset_miss_is_404() {
    let (addr, _dir, handle) = spawn_server(MismatchPolicy::Redirect).await;

    let url = format!("http://{}/missing.js", addr);
    let response = reqwest::get(&url).await.unwrap();

    assert_eq!(response.status().as_u16(), 404);
    let body = response.text().await.unwrap();
    let json: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["error"], "not_found");

    handle.abort();
}

#[tokio::test]
async fn test_unknown_namespace_is_404() {
    let (addr, _dir, handle) = spawn_server(MismatchPolicy::Redirect).await;

    // Parses and matches the revision, but no root maps "vendor"
    let url = format!("http://{}/__rev/deadbeef/vendor/lib/a.js", addr);
    let response = reqwest::get(&url).await.unwrap();

    assert_eq!(response.status().as_u16(), 404);

    handle.abort();
}

#[tokio::test]
async fn test_method_not_allowed() {
    let (addr, _dir, handle) = spawn_server(MismatchPolicy::Redirect).await;

    let url = format!("http://{}/js/main.of.js", addr);
    let response = reqwest::Client::new().post(&url).send().await.unwrap();

    assert_eq!(response.status().as_u16(), 405);
    assert_eq!(header(&response, "allow"), "GET, HEAD");

    handle.abort();
}

#[tokio::test]
async fn test_head_request_carries_cache_headers() {
    let (addr, _dir, handle) = spawn_server(MismatchPolicy::Redirect).await;

    let url = format!("http://{}/__rev/deadbeef/spa/js/main.of.js", addr);
    let response = reqwest::Client::new().head(&url).send().await.unwrap();

    assert_eq!(response.status().as_u16(), 200);
    assert_eq!(header(&response, "cache-control"), CACHE_IMMUTABLE);

    handle.abort();
}

#[tokio::test]
async fn test_metrics_exposition() {
    let (addr, _dir, handle) = spawn_server(MismatchPolicy::Redirect).await;

    // Drive one request through the pipeline so counters have samples
    let url = format!("http://{}/data.json", addr);
    reqwest::get(&url).await.unwrap();

    let url = format!("http://{}/metrics", addr);
    let response = reqwest::get(&url).await.unwrap();

    assert_eq!(response.status().as_u16(), 200);
    assert!(header(&response, "content-type").starts_with("text/plain"));

    let body = response.text().await.unwrap();
    assert!(body.contains("outerfaces_rev_requests_total"));
    assert!(body.contains("outerfaces_rev_request_duration_seconds"));

    handle.abort();
}

#[tokio::test]
async fn test_query_string_is_ignored_for_matching() {
    let (addr, _dir, handle) = spawn_server(MismatchPolicy::Redirect).await;

    let url = format!("http://{}/__rev/deadbeef/spa/js/main.of.js?v=3&cb=17", addr);
    let response = reqwest::get(&url).await.unwrap();

    assert_eq!(response.status().as_u16(), 200);
    assert_eq!(header(&response, "cache-control"), CACHE_IMMUTABLE);

    handle.abort();
}
