//! Static file serving module
//!
//! Maps request paths onto the document root, serves files and index files,
//! and falls back to directory listings.

use crate::config::AppState;
use crate::handler::listing;
use crate::handler::router::RequestContext;
use crate::http::{self, date, mime};
use http_body_util::Full;
use hyper::body::Bytes;
use hyper::Response;
use std::io;
use std::path::{Component, Path, PathBuf};
use tokio::fs;

/// Serve a GET/HEAD request from the document root
pub async fn serve_path(ctx: &RequestContext<'_>, state: &AppState) -> Response<Full<Bytes>> {
    let Some(relative) = resolve_path(ctx.path) else {
        tracing::debug!(path = ctx.path, "rejected undecodable request path");
        return http::build_404_response();
    };
    let target = state.root().join(relative);

    let metadata = match fs::metadata(&target).await {
        Ok(m) => m,
        Err(e) => return io_error_response(&e, &target),
    };
    let canonical = match confine(&target, state.root()).await {
        Ok(p) => p,
        Err(resp) => return resp,
    };

    if metadata.is_dir() {
        return serve_directory(ctx, state, &canonical).await;
    }

    // A trailing slash names a directory, never a file
    if ctx.path.ends_with('/') {
        return http::build_404_response();
    }

    serve_file(ctx, &canonical).await
}

/// Serve a directory: redirect to the slashed path, then index file, then listing
async fn serve_directory(
    ctx: &RequestContext<'_>,
    state: &AppState,
    dir: &Path,
) -> Response<Full<Bytes>> {
    if !ctx.path.ends_with('/') {
        return http::build_redirect_response(&slashed_location(ctx.path, ctx.query));
    }

    for index_file in &state.config.http.index_files {
        let index_path = dir.join(index_file);
        if fs::metadata(&index_path).await.is_ok_and(|m| m.is_file()) {
            return match confine(&index_path, state.root()).await {
                Ok(p) => serve_file(ctx, &p).await,
                Err(resp) => resp,
            };
        }
    }

    if !state.config.http.directory_listing {
        return http::build_403_response();
    }

    let display_path = String::from_utf8_lossy(&urlencoding::decode_binary(ctx.path.as_bytes()))
        .into_owned();
    match listing::render_directory_listing(dir, &display_path).await {
        Ok(html) => http::response::build_html_response(html, ctx.is_head),
        Err(e) => io_error_response(&e, dir),
    }
}

/// `Location` for a directory requested without its trailing slash
///
/// Leading slashes (and backslashes, which browsers read as slashes) collapse
/// to one, so `//host/dir` can never become a protocol-relative URL.
fn slashed_location(path: &str, query: Option<&str>) -> String {
    let path = path.trim_start_matches(['/', '\\']);
    match query {
        Some(q) => format!("/{path}/?{q}"),
        None => format!("/{path}/"),
    }
}

/// Read a file and build its 200 response
async fn serve_file(ctx: &RequestContext<'_>, path: &Path) -> Response<Full<Bytes>> {
    let content = match fs::read(path).await {
        Ok(c) => c,
        Err(e) => return io_error_response(&e, path),
    };

    let last_modified = fs::metadata(path)
        .await
        .and_then(|m| m.modified())
        .ok()
        .map(date::format_http_date);

    http::response::build_file_response(
        Bytes::from(content),
        mime::content_type_for(path),
        last_modified.as_deref(),
        ctx.is_head,
    )
}

/// Resolve a URL path to a path relative to the document root
///
/// The path is percent-decoded and normalized segment by segment: empty and
/// `.` segments are dropped and `..` removes the previous segment without ever
/// climbing above the root. Returns `None` for paths that cannot name a file
/// (invalid UTF-8, NUL bytes, platform path prefixes).
///
/// # Examples
/// ```
/// use nocache_server::handler::static_files::resolve_path;
/// use std::path::PathBuf;
///
/// assert_eq!(resolve_path("/a/./b/../c.txt"), Some(PathBuf::from("a/c.txt")));
/// assert_eq!(resolve_path("/../../etc/passwd"), Some(PathBuf::from("etc/passwd")));
/// assert_eq!(resolve_path("/%2e%2e/secret"), Some(PathBuf::from("secret")));
/// ```
pub fn resolve_path(url_path: &str) -> Option<PathBuf> {
    let decoded = urlencoding::decode_binary(url_path.as_bytes());
    let decoded = std::str::from_utf8(&decoded).ok()?;

    let mut segments: Vec<&str> = Vec::new();
    for segment in decoded.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            s if s.contains('\0') => return None,
            s => {
                // Exactly one plain component, so nothing like `C:` or `a\..` on Windows
                let mut components = Path::new(s).components();
                match (components.next(), components.next()) {
                    (Some(Component::Normal(_)), None) => segments.push(s),
                    _ => return None,
                }
            }
        }
    }

    Some(segments.iter().collect())
}

/// Canonicalize `path` and make sure it is still inside `root`
///
/// Catches symlinks that point outside the document root.
async fn confine(path: &Path, root: &Path) -> Result<PathBuf, Response<Full<Bytes>>> {
    let canonical = fs::canonicalize(path)
        .await
        .map_err(|e| io_error_response(&e, path))?;

    if canonical.starts_with(root) {
        Ok(canonical)
    } else {
        tracing::warn!(
            "Path traversal attempt blocked: {} -> {}",
            path.display(),
            canonical.display()
        );
        Err(http::build_403_response())
    }
}

/// Translate a filesystem error into a status response
fn io_error_response(err: &io::Error, path: &Path) -> Response<Full<Bytes>> {
    match err.kind() {
        // File not found is common (404), no need to log at warning level
        io::ErrorKind::NotFound | io::ErrorKind::NotADirectory | io::ErrorKind::InvalidInput => {
            http::build_404_response()
        }
        io::ErrorKind::PermissionDenied => {
            tracing::debug!("Permission denied: {}", path.display());
            http::build_403_response()
        }
        _ => {
            tracing::error!("Failed to read '{}': {err}", path.display());
            http::build_500_response()
        }
    }
}
