//! Logger module
//!
//! Provides logging for the server:
//! - `tracing` subscriber setup (level filter, file or console targets)
//! - Access logging with multiple formats
//! - Server lifecycle messages

mod format;
pub mod writer;

pub use format::{AccessLogEntry, LogFormat};

use crate::config::Config;
use crate::error::ServerError;
use std::net::SocketAddr;
use std::path::Path;
use tracing_subscriber::filter::filter_fn;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Target used for access log events; routed to the access writer only
pub const ACCESS_TARGET: &str = "access";

/// Initialize the global subscriber with configuration
///
/// Should be called once at application startup. `RUST_LOG` takes precedence
/// over `logging.level`.
pub fn init(config: &Config) -> Result<(), ServerError> {
    let logging = &config.logging;

    let access_writer = writer::access_writer(logging.access_log_file.as_deref())
        .map_err(|e| ServerError::Logger(format!("access log: {e}")))?;
    let error_writer = writer::error_writer(logging.error_log_file.as_deref())
        .map_err(|e| ServerError::Logger(format!("error log: {e}")))?;

    let level = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&logging.level))
        .add_directive(
            format!("{ACCESS_TARGET}=info")
                .parse()
                .map_err(|e| ServerError::Logger(format!("{e}")))?,
        );

    let access_layer = tracing_subscriber::fmt::layer()
        .with_writer(access_writer)
        .with_ansi(logging.access_log_file.is_none())
        .without_time()
        .with_level(false)
        .with_target(false)
        .with_filter(filter_fn(|meta| meta.target() == ACCESS_TARGET));

    let error_layer = tracing_subscriber::fmt::layer()
        .with_writer(error_writer)
        .with_ansi(logging.error_log_file.is_none())
        .with_filter(filter_fn(|meta| meta.target() != ACCESS_TARGET));

    tracing_subscriber::registry()
        .with(level)
        .with(access_layer)
        .with(error_layer)
        .try_init()
        .map_err(|e| ServerError::Logger(e.to_string()))
}

/// Log formatted access log entry
pub fn log_access(entry: &AccessLogEntry, format: &str) {
    tracing::info!(target: ACCESS_TARGET, "{}", entry.format(format));
}

/// Startup banner, printed once the listener is bound
pub fn log_server_start(addr: &SocketAddr, root: &Path, config: &Config) {
    println!(
        "Serving HTTP on {} port {} with NO-CACHE headers...",
        addr.ip(),
        addr.port()
    );
    println!("Document root: {}", root.display());

    tracing::info!(
        %addr,
        root = %root.display(),
        workers = ?config.server.workers,
        directory_listing = config.http.directory_listing,
        max_connections = ?config.performance.max_connections,
        "server started"
    );
    if let Some(ref path) = config.logging.access_log_file {
        tracing::info!("access log: {path}");
    }
    if let Some(ref path) = config.logging.error_log_file {
        tracing::info!("error log: {path}");
    }
}
