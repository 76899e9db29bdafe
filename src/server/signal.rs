// Signal handling module
//
// Supported signals:
// - SIGTERM: Stop accepting and exit
// - SIGINT:  Stop accepting and exit (Ctrl+C)

/// Resolves when the process is asked to terminate
///
/// If no handler can be registered the future never resolves and the server
/// runs until it is killed.
#[cfg(unix)]
pub async fn shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!("Failed to register SIGTERM handler: {e}");
            return ctrl_c().await;
        }
    };

    tokio::select! {
        _ = sigterm.recv() => tracing::info!("SIGTERM received, shutting down"),
        () = ctrl_c() => {}
    }
}

/// Windows fallback - only handles Ctrl+C
#[cfg(not(unix))]
pub async fn shutdown_signal() {
    ctrl_c().await;
}

async fn ctrl_c() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("SIGINT received, shutting down"),
        Err(e) => {
            tracing::error!("Failed to register Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
    }
}
