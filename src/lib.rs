//! Static file server that disables caching
//!
//! Serves a directory tree over HTTP/1.1 and stamps every response with
//! `Cache-Control: no-store, no-cache, must-revalidate, max-age=0`,
//! `Pragma: no-cache` and `Expires: 0`, whatever its status.
//!
//! ```no_run
//! use nocache_server::{Config, Server};
//!
//! # async fn run() -> Result<(), nocache_server::ServerError> {
//! let mut config = Config::default();
//! config.server.port = 0;
//! let server = Server::bind(config)?;
//! println!("listening on {}", server.local_addr());
//! server.run().await;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod handler;
pub mod http;
pub mod logger;
pub mod server;

pub use config::Config;
pub use error::ServerError;
pub use server::Server;
