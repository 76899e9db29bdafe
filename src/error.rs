//! Startup error types
//!
//! Only startup can fail. Everything that goes wrong while answering a request
//! is turned into an HTTP status instead.

use std::net::SocketAddr;
use std::path::PathBuf;
use thiserror::Error;

/// Fatal errors raised before the server starts accepting connections
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("invalid configuration: {0}")]
    Config(#[from] config::ConfigError),

    #[error("invalid listen address '{addr}': {source}")]
    InvalidAddress {
        addr: String,
        #[source]
        source: std::net::AddrParseError,
    },

    #[error("document root '{}' is not usable: {source}", path.display())]
    DocumentRoot {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("document root '{}' is not a directory", path.display())]
    NotADirectory { path: PathBuf },

    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to build runtime: {0}")]
    Runtime(#[source] std::io::Error),

    #[error("failed to initialize logging: {0}")]
    Logger(String),
}

impl ServerError {
    /// Process exit status reported for this error
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::Bind { .. } => 2,
            _ => 1,
        }
    }
}
