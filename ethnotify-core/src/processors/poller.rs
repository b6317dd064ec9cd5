//! EventPoller - the scheduling core.
//!
//! The poller owns every [`LogFilter`] and drives them through poll cycles:
//!
//! 1. read the head once and derive the confirmed block,
//! 2. fetch all filters concurrently,
//! 3. deliver each filter's batch in `(block, log_index)` order,
//! 4. advance each cursor past the highest block it saw.
//!
//! A failed head read, or a transport fault on a fetch that the node then
//! confirms by failing a liveness probe, aborts the cycle before any
//! delivery. No cursor moves and the same ranges are fetched again once the
//! node is back. A transport fault on a node that still answers the probe
//! only fails that one filter.

use futures_util::future::join_all;
use kanau::processor::Processor;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use super::connection_monitor::ConnectionMonitor;
use super::filter::{LogFilter, LogFilterSet};
use super::publisher::Publisher;
use crate::config::PollerConfig;
use crate::events::{
    PollerState, PollerStateReceiver, PollerStateSender, ShutdownReceiver, poller_state_channel,
};
use crate::node::{NodeError, NodeRpc, RawLogEntry};
use crate::utils::Backoff;

/// `tokio::time::interval` rejects a zero period.
const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Errors that stop the poller for good.
#[derive(Debug, Error)]
pub enum PollerError {
    #[error("reconnect budget exhausted after {attempts} attempts")]
    ReconnectBudgetExhausted { attempts: u32 },
}

/// Errors that abort a single poll cycle.
#[derive(Debug, Error)]
pub enum CycleError {
    /// The node became unreachable; nothing from this cycle was delivered.
    #[error("connection lost: {0}")]
    ConnectionLost(#[source] NodeError),

    /// The head block could not be read.
    #[error("failed to read head block: {0}")]
    Head(#[source] NodeError),
}

/// Counters for one poll cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub head: u64,
    pub confirmed: u64,
    /// Filters that had a non-empty range to fetch.
    pub filters_polled: usize,
    pub fetched: usize,
    pub published: usize,
    pub removed: usize,
    pub decode_failures: usize,
    pub publish_failures: usize,
    pub fetch_failures: usize,
}

impl CycleReport {
    fn absorb(&mut self, batch: &BatchOutcome) {
        self.fetched += batch.fetched;
        self.published += batch.published;
        self.removed += batch.removed;
        self.decode_failures += batch.decode_failures;
        self.publish_failures += batch.publish_failures;
    }
}

/// How a reconnect pause ended.
enum Pause {
    Elapsed,
    Shutdown,
}

#[derive(Debug, Default)]
struct BatchOutcome {
    fetched: usize,
    published: usize,
    removed: usize,
    decode_failures: usize,
    publish_failures: usize,
    highest_block: Option<u64>,
}

pub struct EventPoller {
    node: Arc<dyn NodeRpc>,
    monitor: Arc<ConnectionMonitor>,
    publisher: Publisher,
    filters: LogFilterSet,
    config: PollerConfig,
    state_tx: PollerStateSender,
}

impl EventPoller {
    pub fn new(
        node: Arc<dyn NodeRpc>,
        monitor: Arc<ConnectionMonitor>,
        publisher: Publisher,
        filters: LogFilterSet,
        config: PollerConfig,
    ) -> Self {
        let (state_tx, _) = poller_state_channel();
        Self {
            node,
            monitor,
            publisher,
            filters,
            config,
            state_tx,
        }
    }

    pub fn state(&self) -> PollerState {
        *self.state_tx.borrow()
    }

    /// Watch state transitions.
    pub fn subscribe_state(&self) -> PollerStateReceiver {
        self.state_tx.subscribe()
    }

    pub fn filters(&self) -> &LogFilterSet {
        &self.filters
    }

    pub fn monitor(&self) -> &Arc<ConnectionMonitor> {
        &self.monitor
    }

    fn set_state(&self, state: PollerState) {
        let previous = self.state_tx.send_replace(state);
        if previous != state {
            debug!(from = %previous, to = %state, "Poller state changed");
        }
    }

    /// Run until shutdown or until the reconnect budget runs out.
    ///
    /// A cycle that has started is always allowed to finish; shutdown is
    /// observed while idle or backing off. The backoff is only reset by a
    /// completed cycle, so a node that answers probes but drops every cycle
    /// is still retried no faster than the poll interval.
    pub async fn run(&mut self, mut shutdown_rx: ShutdownReceiver) -> Result<(), PollerError> {
        info!(
            filters = self.filters.len(),
            poll_interval_secs = self.config.poll_interval.as_secs_f64(),
            confirmations = self.config.confirmations,
            "EventPoller started"
        );

        let mut backoff = Backoff::new(self.config.backoff);

        'outer: loop {
            // -- Disconnected: probe, back off, repeat -----------------------
            if *shutdown_rx.borrow() {
                break;
            }
            if !self.monitor.probe().await {
                match self.pause_before_reconnect(&mut backoff, &mut shutdown_rx).await? {
                    Pause::Shutdown => break,
                    Pause::Elapsed => continue,
                }
            }
            if backoff.attempts() > 0 {
                info!(attempts = backoff.attempts(), "Reconnected to node");
            }
            self.set_state(PollerState::ConnectedIdle);

            // -- Connected: tick, gate, cycle --------------------------------
            let mut ticker = tokio::time::interval(self.config.poll_interval.max(MIN_POLL_INTERVAL));
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    biased;

                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            break 'outer;
                        }
                        continue;
                    }

                    _ = ticker.tick() => {}
                }

                if !self.monitor.probe().await {
                    match self.pause_before_reconnect(&mut backoff, &mut shutdown_rx).await? {
                        Pause::Shutdown => break 'outer,
                        Pause::Elapsed => continue 'outer,
                    }
                }

                self.set_state(PollerState::Polling);
                match self.poll_cycle().await {
                    Ok(report) => {
                        debug!(?report, "Poll cycle completed");
                        backoff.reset();
                        self.set_state(PollerState::ConnectedIdle);
                    }
                    Err(CycleError::ConnectionLost(e)) => {
                        self.monitor.mark_lost(&e.to_string());
                        match self.pause_before_reconnect(&mut backoff, &mut shutdown_rx).await? {
                            Pause::Shutdown => break 'outer,
                            Pause::Elapsed => continue 'outer,
                        }
                    }
                    Err(e) => {
                        warn!(error_kind = "head_read", error = %e, "Poll cycle aborted");
                        self.set_state(PollerState::ConnectedIdle);
                    }
                }
            }
        }

        info!("EventPoller shutting down");
        self.set_state(PollerState::Terminated);
        Ok(())
    }

    /// Wait out the next backoff delay, or give up when the budget is spent.
    async fn pause_before_reconnect(
        &self,
        backoff: &mut Backoff,
        shutdown_rx: &mut ShutdownReceiver,
    ) -> Result<Pause, PollerError> {
        self.set_state(PollerState::Disconnected);
        if backoff.exhausted() {
            let attempts = backoff.attempts();
            error!(
                error_kind = "reconnect_budget_exhausted",
                attempts, "Giving up on the node"
            );
            self.set_state(PollerState::Terminated);
            return Err(PollerError::ReconnectBudgetExhausted { attempts });
        }

        let delay = backoff.next_delay();
        warn!(
            attempt = backoff.attempts(),
            delay_secs = delay.as_secs_f64(),
            "Node unreachable, retrying"
        );
        tokio::select! {
            biased;

            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    return Ok(Pause::Shutdown);
                }
            }

            _ = tokio::time::sleep(delay) => {}
        }
        Ok(Pause::Elapsed)
    }

    /// Run one poll cycle over every filter.
    pub async fn poll_cycle(&mut self) -> Result<CycleReport, CycleError> {
        let head = self.node.latest_block().await.map_err(|e| {
            if e.is_connection_lost() {
                CycleError::ConnectionLost(e)
            } else {
                CycleError::Head(e)
            }
        })?;
        let confirmed = head.saturating_sub(self.config.confirmations);
        self.filters.anchor(confirmed);

        let mut report = CycleReport {
            head,
            confirmed,
            ..CycleReport::default()
        };

        // Phase 1: fetch everything before delivering anything.
        let node = &self.node;
        let fetches = self
            .filters
            .filters()
            .iter()
            .enumerate()
            .filter_map(|(idx, filter)| filter.range(confirmed).map(|r| (idx, filter.query(&r))))
            .map(|(idx, query)| async move { (idx, node.get_logs(&query).await) });
        let results = join_all(fetches).await;
        report.filters_polled = results.len();

        let mut batches = Vec::with_capacity(results.len());
        let mut faults = Vec::new();
        for (idx, result) in results {
            match result {
                Ok(entries) => batches.push((idx, entries)),
                Err(e) if e.is_connection_lost() => faults.push((idx, e)),
                Err(e) => {
                    report.fetch_failures += 1;
                    report_fetch_failure(&self.filters.filters()[idx], &e);
                }
            }
        }

        // A transport fault only means the node is gone if it also stops
        // answering; otherwise it fails just that filter.
        if !faults.is_empty() && !self.node.is_connected().await {
            let (_, e) = faults.swap_remove(0);
            return Err(CycleError::ConnectionLost(e));
        }
        for (idx, e) in &faults {
            report.fetch_failures += 1;
            report_fetch_failure(&self.filters.filters()[*idx], e);
        }

        // Phase 2: deliver, concurrently across filters.
        let publisher = &self.publisher;
        let filters = self.filters.filters();
        let deliveries = batches.into_iter().map(|(idx, entries)| {
            let filter = &filters[idx];
            async move { (idx, deliver_batch(publisher, filter, entries).await) }
        });
        let outcomes = join_all(deliveries).await;

        for (idx, outcome) in outcomes {
            report.absorb(&outcome);
            let filter = &mut self.filters.filters_mut()[idx];
            if let Some(highest) = outcome.highest_block {
                filter.advance(highest.saturating_add(1));
            }
            filter.mark_scanned(confirmed);
        }

        Ok(report)
    }
}

fn report_fetch_failure(filter: &LogFilter, error: &NodeError) {
    warn!(
        error_kind = "filter_fetch",
        contract = %filter.contract(),
        event = %filter.event().name(),
        error = %error,
        "Failed to fetch logs, range will be retried"
    );
}

/// Decode and publish one filter's batch in chain order.
async fn deliver_batch(
    publisher: &Publisher,
    filter: &LogFilter,
    mut entries: Vec<RawLogEntry>,
) -> BatchOutcome {
    entries.sort_by_key(|e| (e.block_number, e.log_index));

    let mut outcome = BatchOutcome {
        fetched: entries.len(),
        highest_block: entries.iter().map(|e| e.block_number).max(),
        ..BatchOutcome::default()
    };

    for entry in entries {
        if entry.removed {
            outcome.removed += 1;
            debug!(
                contract = %filter.contract(),
                event = %filter.event().name(),
                block = entry.block_number,
                log_index = entry.log_index,
                "Skipping removed log"
            );
            continue;
        }

        let decoded = match filter.event().decode(&entry) {
            Ok(decoded) => decoded,
            Err(e) => {
                outcome.decode_failures += 1;
                warn!(
                    error_kind = "decode",
                    contract = %filter.contract(),
                    event = %filter.event().name(),
                    block = entry.block_number,
                    log_index = entry.log_index,
                    error = %e,
                    "Failed to decode log, skipping"
                );
                continue;
            }
        };

        match publisher.process(decoded).await {
            Ok(_) => outcome.published += 1,
            Err(e) => {
                outcome.publish_failures += 1;
                warn!(
                    error_kind = e.kind(),
                    contract = %filter.contract(),
                    event = %filter.event().name(),
                    block = entry.block_number,
                    log_index = entry.log_index,
                    error = %e,
                    "Failed to publish notification"
                );
            }
        }
    }

    outcome
}

impl std::fmt::Debug for EventPoller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventPoller")
            .field("filters", &self.filters)
            .field("config", &self.config)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}
