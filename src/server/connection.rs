// Connection handling module
// Accepts a TCP connection and serves it with hyper on its own task

use http_body_util::Empty;
use hyper::body::Bytes;
use hyper::server::conn::http1;
use hyper::service::{service_fn, Service};
use hyper::{Request, StatusCode};
use hyper_util::rt::{TokioIo, TokioTimer};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;

use super::guard::HeadGuard;
use crate::config::AppState;
use crate::handler;
use crate::http::{self, NoCache};

/// Accept a connection, enforcing the connection limit.
///
/// # Arguments
///
/// * `stream` - The TCP stream to handle
/// * `peer_addr` - The peer's socket address
/// * `state` - Shared application state
/// * `conn_counter` - Active connection counter
pub fn accept_connection(
    stream: TcpStream,
    peer_addr: SocketAddr,
    state: &Arc<AppState>,
    conn_counter: &Arc<AtomicUsize>,
) {
    // Increment counter first, then check limit (prevents race condition)
    let prev_count = conn_counter.fetch_add(1, Ordering::SeqCst);

    if let Some(max_conn) = state.config.performance.max_connections {
        if prev_count >= usize::try_from(max_conn).unwrap_or(usize::MAX) {
            // Exceeded limit: rollback counter and reject
            conn_counter.fetch_sub(1, Ordering::SeqCst);
            tracing::warn!(
                "Max connections reached: {prev_count}/{max_conn}. Connection from {peer_addr} rejected."
            );
            drop(stream);
            return;
        }
    }

    tracing::debug!("Accepted connection from {peer_addr}");

    handle_connection(
        stream,
        peer_addr,
        Arc::clone(state),
        Arc::clone(conn_counter),
    );
}

/// Serve a single connection in a spawned task.
///
/// The counter is decremented when the connection ends, including when the
/// optional connection timeout cuts it short.
fn handle_connection(
    stream: TcpStream,
    peer_addr: SocketAddr,
    state: Arc<AppState>,
    conn_counter: Arc<AtomicUsize>,
) {
    tokio::spawn(async move {
        let timeout = state.config.performance.connection_timeout;
        let serve = serve_connection(stream, peer_addr, state);

        if timeout > 0 {
            let limit = Duration::from_secs(timeout);
            if tokio::time::timeout(limit, serve).await.is_err() {
                tracing::debug!(
                    "Connection from {peer_addr} closed after {}s timeout",
                    limit.as_secs()
                );
            }
        } else {
            serve.await;
        }

        // Decrement active connection counter
        conn_counter.fetch_sub(1, Ordering::SeqCst);
    });
}

/// Run hyper over the guarded stream, then answer a rejected head if there was one.
///
/// Every response leaves through the [`NoCache`] layer: hyper's through the
/// layer wrapped around the request handler, a rejection through the same
/// layer wrapped around [`reject`]. hyper never sees a malformed head, so it
/// never writes a response of its own.
async fn serve_connection(stream: TcpStream, peer_addr: SocketAddr, state: Arc<AppState>) {
    let perf = &state.config.performance;

    let mut builder = http1::Builder::new();
    builder
        .keep_alive(perf.keep_alive)
        // Responses to requests read before a rejected head are still written
        .half_close(true)
        .timer(TokioTimer::new())
        .header_read_timeout(
            (perf.header_read_timeout > 0).then(|| Duration::from_secs(perf.header_read_timeout)),
        );

    let service = NoCache::new(service_fn({
        let state = Arc::clone(&state);
        move |req| handler::handle_request(req, Arc::clone(&state), peer_addr)
    }));
    let io = TokioIo::new(HeadGuard::new(stream));

    let parts = match builder.serve_connection(io, service).without_shutdown().await {
        Ok(parts) => parts,
        Err(err) => {
            log_connection_result(&err, peer_addr);
            return;
        }
    };

    let mut guard = parts.io.into_inner();
    if let Some(status) = guard.rejection() {
        tracing::warn!("Bad request from {peer_addr}: {status}");
        if let Err(e) = reject(&mut guard, status, &state.config.http.server_name).await {
            tracing::debug!("Failed to answer bad request from {peer_addr}: {e}");
        }
    }
    if let Err(e) = guard.shutdown().await {
        tracing::debug!("Shutdown of connection from {peer_addr} failed: {e}");
    }
}

/// Write the answer to a malformed request head
async fn reject<W>(io: &mut W, status: StatusCode, server_name: &str) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let server_name = server_name.to_string();
    let service = NoCache::new(service_fn(move |_req: Request<Empty<Bytes>>| {
        let mut resp = http::build_rejection_response(status);
        http::apply_server_header(resp.headers_mut(), &server_name);
        async move { Ok::<_, Infallible>(resp) }
    }));
    let response = match service.call(Request::new(Empty::new())).await {
        Ok(resp) => resp,
        Err(never) => match never {},
    };

    io.write_all(&http::encode_response(response).await).await?;
    io.flush().await
}

/// Client-side failures (resets, malformed requests) end only their own connection
fn log_connection_result(err: &hyper::Error, peer_addr: SocketAddr) {
    if err.is_parse() || err.is_timeout() {
        tracing::warn!("Bad request from {peer_addr}: {err}");
    } else {
        tracing::debug!("Connection from {peer_addr} ended with error: {err}");
    }
}
