//! Every response leaving the server carries the cache-disabling headers.

use std::fs;

use tempfile::TempDir;

mod common;

use common::{get, request, start_server};

fn site() -> TempDir {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("index.html"), "<h1>home</h1>").unwrap();
    fs::write(dir.path().join("style.css"), "body { color: red; }").unwrap();
    fs::create_dir(dir.path().join("docs")).unwrap();
    fs::write(dir.path().join("docs").join("a.txt"), "alpha").unwrap();
    fs::write(dir.path().join("docs").join("b.txt"), "beta").unwrap();
    dir
}

#[tokio::test]
async fn test_file_response_has_headers() {
    let server = start_server(site()).await;

    let resp = get(server.addr, "/index.html").await;
    assert_eq!(resp.status, 200);
    assert_eq!(resp.body_text(), "<h1>home</h1>");
    assert_eq!(resp.header("content-type"), Some("text/html; charset=utf-8"));
    resp.assert_no_cache_headers();

    server.stop().await;
}

#[tokio::test]
async fn test_root_serves_index_with_headers() {
    let server = start_server(site()).await;

    let resp = get(server.addr, "/").await;
    assert_eq!(resp.status, 200);
    assert_eq!(resp.body_text(), "<h1>home</h1>");
    resp.assert_no_cache_headers();

    server.stop().await;
}

#[tokio::test]
async fn test_not_found_has_headers() {
    let server = start_server(site()).await;

    let resp = get(server.addr, "/does-not-exist").await;
    assert_eq!(resp.status, 404);
    resp.assert_no_cache_headers();

    server.stop().await;
}

#[tokio::test]
async fn test_directory_listing_has_headers() {
    let server = start_server(site()).await;

    let resp = get(server.addr, "/docs/").await;
    assert_eq!(resp.status, 200);
    let body = resp.body_text();
    assert!(body.contains("a.txt"));
    assert!(body.contains("b.txt"));
    resp.assert_no_cache_headers();

    server.stop().await;
}

#[tokio::test]
async fn test_redirect_has_headers() {
    let server = start_server(site()).await;

    let resp = get(server.addr, "/docs").await;
    assert_eq!(resp.status, 301);
    assert_eq!(resp.header("location"), Some("/docs/"));
    resp.assert_no_cache_headers();

    // Leading slashes would make the Location scheme-relative
    for path in ["//evil.example/%2e%2e", "///evil.example/%2e%2e"] {
        let resp = get(server.addr, path).await;
        assert_eq!(resp.status, 301);
        let location = resp.header("location").unwrap();
        assert!(!location.starts_with("//"), "{path} redirected to {location}");
        resp.assert_no_cache_headers();
    }

    server.stop().await;
}

#[tokio::test]
async fn test_unsupported_method_has_headers() {
    let server = start_server(site()).await;

    let resp = request(server.addr, "POST", "/index.html").await;
    assert_eq!(resp.status, 405);
    assert_eq!(resp.header("allow"), Some("GET, HEAD, OPTIONS"));
    resp.assert_no_cache_headers();

    let resp = request(server.addr, "DELETE", "/index.html").await;
    assert_eq!(resp.status, 405);
    resp.assert_no_cache_headers();

    server.stop().await;
}

#[tokio::test]
async fn test_head_and_options_have_headers() {
    let server = start_server(site()).await;

    let resp = request(server.addr, "HEAD", "/style.css").await;
    assert_eq!(resp.status, 200);
    assert!(resp.body.is_empty());
    assert_eq!(resp.header("content-length"), Some("20"));
    assert_eq!(resp.header("content-type"), Some("text/css; charset=utf-8"));
    resp.assert_no_cache_headers();

    let resp = request(server.addr, "OPTIONS", "/").await;
    assert_eq!(resp.status, 204);
    resp.assert_no_cache_headers();

    server.stop().await;
}

#[tokio::test]
async fn test_repeated_requests_are_identical() {
    let server = start_server(site()).await;

    let first = get(server.addr, "/style.css").await;
    let second = get(server.addr, "/style.css").await;
    assert_eq!(first.status, 200);
    assert_eq!(first.body, second.body);
    first.assert_no_cache_headers();
    second.assert_no_cache_headers();

    server.stop().await;
}
