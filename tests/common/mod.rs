//! Shared utilities for integration tests.

use std::net::SocketAddr;
use std::time::Duration;

use nocache_server::{Config, Server};
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

pub const CACHE_CONTROL: &str = "no-store, no-cache, must-revalidate, max-age=0";

/// A server running on an ephemeral port over a temporary document root
pub struct TestServer {
    pub addr: SocketAddr,
    pub root: TempDir,
    shutdown: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl TestServer {
    /// Stop accepting and wait for the accept loop to exit
    pub async fn stop(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            tokio::time::timeout(Duration::from_secs(5), handle)
                .await
                .expect("server loop did not stop")
                .unwrap();
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

/// Start a server over `root` with default settings
pub async fn start_server(root: TempDir) -> TestServer {
    start_server_with(root, |_| {}).await
}

/// Start a server over `root` after adjusting its configuration
#[allow(dead_code)]
pub async fn start_server_with(root: TempDir, adjust: impl FnOnce(&mut Config)) -> TestServer {
    let mut config = Config::default();
    config.server.host = "127.0.0.1".to_string();
    config.server.port = 0;
    config.server.root = root.path().display().to_string();
    config.logging.access_log = false;
    adjust(&mut config);

    let server = Server::bind(config).unwrap();
    let addr = server.local_addr();
    let (tx, rx) = oneshot::channel::<()>();
    let handle = tokio::spawn(server.run_until(async {
        let _ = rx.await;
    }));

    TestServer {
        addr,
        root,
        shutdown: Some(tx),
        handle: Some(handle),
    }
}

/// Parsed raw HTTP response
#[derive(Debug)]
pub struct RawResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl RawResponse {
    /// All values of a header, case-insensitive name match
    pub fn header_values(&self, name: &str) -> Vec<&str> {
        self.headers
            .iter()
            .filter(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
            .collect()
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.header_values(name).first().copied()
    }

    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// The three cache-disabling headers, each exactly once
    pub fn assert_no_cache_headers(&self) {
        assert_eq!(
            self.header_values("cache-control"),
            vec![CACHE_CONTROL],
            "status {}",
            self.status
        );
        assert_eq!(self.header_values("pragma"), vec!["no-cache"]);
        assert_eq!(self.header_values("expires"), vec!["0"]);
    }
}

/// Send raw request bytes and read until the server closes the connection
async fn exchange(addr: SocketAddr, request: &[u8]) -> Vec<u8> {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(request).await.unwrap();

    let mut buf = Vec::new();
    tokio::time::timeout(Duration::from_secs(5), stream.read_to_end(&mut buf))
        .await
        .expect("response timed out")
        .unwrap();
    buf
}

/// Send raw request bytes; the first response, body running to the end of the stream
pub async fn send_raw(addr: SocketAddr, request: &[u8]) -> RawResponse {
    let raw = exchange(addr, request).await;
    let (mut resp, body_start) = parse_head(&raw);
    resp.body = raw[body_start..].to_vec();
    resp
}

/// Send raw request bytes; every response on the connection, framed by `Content-Length`
#[allow(dead_code)]
pub async fn send_raw_all(addr: SocketAddr, request: &[u8]) -> Vec<RawResponse> {
    let raw = exchange(addr, request).await;
    let mut responses = Vec::new();
    let mut rest = raw.as_slice();

    while !rest.is_empty() {
        let (mut resp, body_start) = parse_head(rest);
        let len: usize = resp
            .header("content-length")
            .map_or(0, |v| v.parse().expect("bad content-length"));
        let len = if resp.status == 204 { 0 } else { len };
        resp.body = rest[body_start..body_start + len].to_vec();
        rest = &rest[body_start + len..];
        responses.push(resp);
    }
    responses
}

/// Send a request with `Connection: close`
pub async fn request(addr: SocketAddr, method: &str, path: &str) -> RawResponse {
    let req = format!("{method} {path} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n");
    send_raw(addr, req.as_bytes()).await
}

pub async fn get(addr: SocketAddr, path: &str) -> RawResponse {
    request(addr, "GET", path).await
}

/// Status line and headers; also returns where the body starts
fn parse_head(raw: &[u8]) -> (RawResponse, usize) {
    let split = raw
        .windows(4)
        .position(|w| w == b"\r\n\r\n")
        .expect("no end of headers in response");
    let head = std::str::from_utf8(&raw[..split]).unwrap();

    let mut lines = head.split("\r\n");
    let status_line = lines.next().unwrap();
    let status = status_line
        .split(' ')
        .nth(1)
        .and_then(|s| s.parse().ok())
        .expect("bad status line");

    let headers = lines
        .filter_map(|line| line.split_once(':'))
        .map(|(n, v)| (n.trim().to_string(), v.trim().to_string()))
        .collect();

    let resp = RawResponse {
        status,
        headers,
        body: Vec::new(),
    };
    (resp, split + 4)
}
