//! Processors of the poll loop:
//!
//! - `EventPoller`: owns the filters, fetches logs and drives delivery
//! - `Publisher`: renders decoded logs and puts them on the event bus
//! - `ConnectionMonitor`: tracks node reachability and gates each cycle

pub mod connection_monitor;
pub mod filter;
pub mod poller;
pub mod publisher;

pub use connection_monitor::ConnectionMonitor;
pub use filter::{BlockMarker, LogFilter, LogFilterSet};
pub use poller::{CycleError, CycleReport, EventPoller, PollerError};
pub use publisher::{BusCreation, EventBus, PublishError, Publisher};
