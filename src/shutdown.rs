//! Signal handling for graceful shutdown.
//!
//! Signals cancel a [`CancellationToken`] that `main` races against the MCP
//! service. Dropping the service cancels its in-flight requests, so running
//! queries abort and release their connections.

use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Install signal handlers that cancel `shutdown`.
///
/// This sets up handlers for:
/// - SIGINT (Ctrl+C)
/// - SIGTERM (Unix)
pub fn install_signal_handlers(shutdown: CancellationToken) {
    let ctrl_c = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Received Ctrl+C, initiating shutdown...");
                ctrl_c.cancel();
            }
            Err(e) => {
                error!("Failed to listen for Ctrl+C signal: {}", e);
            }
        }
    });

    #[cfg(unix)]
    {
        tokio::spawn(async move {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    sigterm.recv().await;
                    info!("Received SIGTERM, initiating shutdown...");
                    shutdown.cancel();
                }
                Err(e) => {
                    error!("Failed to install SIGTERM handler: {}", e);
                }
            }
        });
    }
}
