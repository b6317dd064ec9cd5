//! Node reachability tracking.

use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::watch;
use tracing::{info, warn};

use crate::node::NodeRpc;

type DisconnectCallback = Box<dyn Fn(&str) + Send + Sync>;

/// Caches whether the node is reachable and notifies on loss.
///
/// The cached flag starts out `false`; the first successful [`probe`]
/// flips it.
///
/// [`probe`]: ConnectionMonitor::probe
pub struct ConnectionMonitor {
    node: Arc<dyn NodeRpc>,
    connected: watch::Sender<bool>,
    callbacks: Mutex<Vec<DisconnectCallback>>,
}

impl ConnectionMonitor {
    pub fn new(node: Arc<dyn NodeRpc>) -> Self {
        let (connected, _) = watch::channel(false);
        Self {
            node,
            connected,
            callbacks: Mutex::new(Vec::new()),
        }
    }

    /// Last known reachability, without touching the network.
    pub fn is_connected(&self) -> bool {
        *self.connected.borrow()
    }

    /// Register `callback` to run on every connected to disconnected edge.
    pub fn on_disconnect<F>(&self, callback: F)
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.callbacks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Box::new(callback));
    }

    /// Watch the reachability flag.
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.connected.subscribe()
    }

    /// Ask the node whether it is alive and update the cached flag.
    pub async fn probe(&self) -> bool {
        let alive = self.node.is_connected().await;
        if alive {
            self.mark_connected();
        } else {
            self.mark_lost("liveness probe failed");
        }
        alive
    }

    /// Record a connection fault observed elsewhere.
    pub fn mark_lost(&self, reason: &str) {
        let was_connected = self.connected.send_replace(false);
        if was_connected {
            warn!(error_kind = "connection_lost", reason = %reason, "Lost connection to node");
            let callbacks = self.callbacks.lock().unwrap_or_else(PoisonError::into_inner);
            for callback in callbacks.iter() {
                callback(reason);
            }
        }
    }

    fn mark_connected(&self) {
        let was_connected = self.connected.send_replace(true);
        if !was_connected {
            info!("Connected to node");
        }
    }
}

impl std::fmt::Debug for ConnectionMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionMonitor")
            .field("connected", &self.is_connected())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockNode;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_probe_updates_flag() {
        let node = Arc::new(MockNode::new(100));
        let monitor = ConnectionMonitor::new(node.clone());
        let mut rx = monitor.subscribe();

        assert!(!monitor.is_connected());
        assert!(monitor.probe().await);
        assert!(monitor.is_connected());
        assert!(rx.has_changed().unwrap());
        assert!(*rx.borrow_and_update());

        node.set_reachable(false);
        assert!(!monitor.probe().await);
        assert!(!monitor.is_connected());
    }

    #[tokio::test]
    async fn test_disconnect_callback_fires_on_edge_only() {
        let node = Arc::new(MockNode::new(100));
        let monitor = ConnectionMonitor::new(node);
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = fired.clone();
        monitor.on_disconnect(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        // Never connected: no edge
        monitor.mark_lost("boot");
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        monitor.probe().await;
        monitor.mark_lost("eth_getLogs timed out");
        monitor.mark_lost("eth_getLogs timed out");
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }
}
