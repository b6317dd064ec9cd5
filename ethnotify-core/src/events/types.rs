//! Event type definitions for the poll loop.
//!
//! A [`DecodedLog`] is produced once per raw log entry and consumed once by
//! the publisher; nothing here is persisted.

use compact_str::CompactString;
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use serde_json::Value;

/// Lifecycle of an [`EventPoller`](crate::processors::EventPoller).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PollerState {
    /// The node is unreachable; reconnect attempts are on backoff.
    Disconnected,
    /// Connected and waiting for the next poll tick.
    ConnectedIdle,
    /// A poll cycle is running.
    Polling,
    /// The poller has stopped and will not restart.
    Terminated,
}

impl std::fmt::Display for PollerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            PollerState::Disconnected => "disconnected",
            PollerState::ConnectedIdle => "connected_idle",
            PollerState::Polling => "polling",
            PollerState::Terminated => "terminated",
        };
        f.write_str(name)
    }
}

/// Decoded event arguments, kept in ABI declaration order.
///
/// Serialized as a JSON object whose keys follow that order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventArgs(pub Vec<(CompactString, Value)>);

impl EventArgs {
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.iter().find(|(k, _)| k == name).map(|(_, v)| v)
    }
}

impl Serialize for EventArgs {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (name, value) in &self.0 {
            map.serialize_entry(name.as_str(), value)?;
        }
        map.end()
    }
}

/// A log entry decoded against its event's ABI.
///
/// Field order and naming match what web3 clients produce for a contract
/// event; every integer is written as a decimal string.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DecodedLog {
    pub args: EventArgs,
    pub event: CompactString,
    #[serde(serialize_with = "serialize_decimal")]
    pub log_index: u64,
    #[serde(serialize_with = "serialize_decimal")]
    pub transaction_index: u64,
    pub transaction_hash: Option<String>,
    pub address: String,
    pub block_hash: Option<String>,
    #[serde(serialize_with = "serialize_decimal")]
    pub block_number: u64,
}

impl DecodedLog {
    /// Position of the entry on chain, used for ordering within a batch.
    pub fn position(&self) -> (u64, u64) {
        (self.block_number, self.log_index)
    }

    /// The `Detail` text of the notification message.
    pub fn to_detail(&self) -> Result<String, serde_json::Error> {
        ethnotify_sdk::objects::to_python_json(self)
    }
}

fn serialize_decimal<S: Serializer>(value: &u64, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(value)
}
