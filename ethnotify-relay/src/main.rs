//! ethnotify relay
//!
//! Polls contract event logs from an Ethereum node and publishes them to an
//! Amazon EventBridge bus.

mod config;
mod relay;
mod shutdown;

use anyhow::Context;
use clap::Parser;
use config::Args;
use ethnotify_core::events::shutdown_channel;
use relay::build_poller;
use shutdown::{shutdown_signal, trigger};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    init_tracing();

    // Parse command line arguments and environment
    let args = Args::parse();

    tracing::info!("Starting ethnotify-relay v{}", env!("CARGO_PKG_VERSION"));

    let config = args
        .into_config(std::env::var("AWS_DEFAULT_REGION").ok())
        .map_err(|e| {
            tracing::error!(error_kind = "config", error = %e, "Invalid configuration");
            e
        })?;
    let grace = config.shutdown_grace;

    let mut poller = build_poller(&config).await?;

    let (shutdown_tx, shutdown_rx) = shutdown_channel();
    let mut poller_task = tokio::spawn(async move { poller.run(shutdown_rx).await });

    tokio::select! {
        signal = shutdown_signal() => {
            signal.context("failed to install signal handlers")?;
            trigger(&shutdown_tx);

            match tokio::time::timeout(grace, &mut poller_task).await {
                Ok(joined) => joined??,
                Err(_) => {
                    tracing::warn!(
                        grace_secs = grace.as_secs(),
                        "Poller did not stop within the grace period, abandoning it"
                    );
                    poller_task.abort();
                }
            }
        }

        // The poller only stops on its own when it gives up on the node.
        joined = &mut poller_task => {
            joined?.map_err(|e| {
                tracing::error!(error_kind = "poller_terminated", error = %e, "Poller terminated");
                e
            })?;
        }
    }

    tracing::info!("Relay shutdown complete");
    Ok(())
}

/// Initialize the tracing subscriber with environment-based filtering and
/// JSON lines on stdout.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,hyper=warn,reqwest=warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_writer(std::io::stdout),
        )
        .init();
}
