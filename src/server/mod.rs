// Server module entry point
// Binds the listener and runs the accept loop

pub mod connection;
pub mod guard;
pub mod listener;
pub mod signal;

// `loop` is a keyword, so the module is named server_loop
#[path = "loop.rs"]
pub mod server_loop;

use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::net::TcpListener;

use crate::config::{AppState, Config};
use crate::error::ServerError;

pub use listener::create_listener;
pub use server_loop::start_server_loop;

/// A bound, not yet running, file server
#[derive(Debug)]
pub struct Server {
    listener: TcpListener,
    local_addr: SocketAddr,
    state: Arc<AppState>,
    active_connections: Arc<AtomicUsize>,
}

impl Server {
    /// Resolve the document root and bind the configured address
    ///
    /// Must be called from within a Tokio runtime. Port 0 binds an ephemeral
    /// port; see [`Server::local_addr`].
    pub fn bind(config: Config) -> Result<Self, ServerError> {
        let addr = config.get_socket_addr()?;
        let state = AppState::new(config)?;

        let bind_error = |source| ServerError::Bind { addr, source };
        let listener = create_listener(addr).map_err(bind_error)?;
        let local_addr = listener.local_addr().map_err(bind_error)?;

        Ok(Self {
            listener,
            local_addr,
            state: Arc::new(state),
            active_connections: Arc::new(AtomicUsize::new(0)),
        })
    }

    pub const fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub const fn state(&self) -> &Arc<AppState> {
        &self.state
    }

    /// Number of connections currently being served
    pub fn active_connections(&self) -> usize {
        self.active_connections.load(Ordering::SeqCst)
    }

    /// Serve until SIGINT or SIGTERM
    pub async fn run(self) {
        self.run_until(signal::shutdown_signal()).await;
    }

    /// Serve until `shutdown` resolves
    pub async fn run_until<F>(self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        start_server_loop(
            self.listener,
            self.state,
            self.active_connections,
            shutdown,
        )
        .await;
    }
}
