//! Signal handling for graceful shutdown.

use ethnotify_core::events::ShutdownSender;
use tokio::signal::unix::{SignalKind, signal};

/// Completes when SIGTERM or SIGINT (Ctrl+C) is received.
///
/// Fails only if a signal handler cannot be installed.
pub async fn shutdown_signal() -> std::io::Result<()> {
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    tokio::select! {
        _ = sigterm.recv() => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown");
        }
        _ = sigint.recv() => {
            tracing::info!("Received SIGINT, initiating graceful shutdown");
        }
    }
    Ok(())
}

/// Flip the shutdown flag so every holder of a receiver stops.
pub fn trigger(shutdown_tx: &ShutdownSender) {
    // Receivers may already be gone if the poller exited on its own.
    let _ = shutdown_tx.send(true);
}
