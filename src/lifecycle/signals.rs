//! OS signal handling.
//!
//! SIGINT (Ctrl-C) and SIGTERM both request a graceful shutdown.

use tokio::signal;
use tokio::task::JoinHandle;

use crate::lifecycle::Shutdown;

/// Resolves when the process is asked to stop.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl-C"),
        _ = terminate => tracing::info!("Received SIGTERM"),
    }
}

/// Trigger `shutdown` on the first termination signal.
pub fn forward_signals(shutdown: Shutdown) -> JoinHandle<()> {
    tokio::spawn(async move {
        shutdown_signal().await;
        let receivers = shutdown.trigger();
        tracing::info!(receivers, "Shutdown signal received");
    })
}
