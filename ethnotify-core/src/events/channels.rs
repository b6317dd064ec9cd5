//! Channel factories for poller state and shutdown signalling.

use super::types::PollerState;
use tokio::sync::watch;

/// Sender handle for poller state transitions.
pub type PollerStateSender = watch::Sender<PollerState>;
/// Receiver handle for poller state transitions.
pub type PollerStateReceiver = watch::Receiver<PollerState>;

/// Sender handle for the shutdown flag.
pub type ShutdownSender = watch::Sender<bool>;
/// Receiver handle for the shutdown flag.
pub type ShutdownReceiver = watch::Receiver<bool>;

/// Create a poller state channel. Pollers start out disconnected.
pub fn poller_state_channel() -> (PollerStateSender, PollerStateReceiver) {
    watch::channel(PollerState::Disconnected)
}

/// Create a shutdown channel; sending `true` asks every holder to stop.
pub fn shutdown_channel() -> (ShutdownSender, ShutdownReceiver) {
    watch::channel(false)
}
