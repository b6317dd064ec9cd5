//! Event catalog derived from a contract ABI.
//!
//! The catalog keeps one [`EventDescriptor`] per non-anonymous event. Each
//! descriptor carries the parsed ABI item, so decoding a log is a direct call
//! on the descriptor attached to the filter rather than a lookup by name.

use alloy_dyn_abi::{DynSolValue, EventExt};
use alloy_json_abi::{Event, JsonAbi};
use alloy_primitives::{Address, B256};
use compact_str::{CompactString, ToCompactString};
use serde_json::Value;
use smallvec::SmallVec;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;

use crate::events::{DecodedLog, EventArgs};
use crate::node::RawLogEntry;

/// Errors that can occur while decoding a single log entry.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// A topic is not a 32-byte hex word
    #[error("invalid topic {topic}")]
    Topic { topic: String },

    /// The data payload is not valid hex
    #[error("invalid data hex: {0}")]
    Data(#[from] hex::FromHexError),

    /// The emitting address is not a valid address
    #[error("invalid contract address {0}")]
    Address(String),

    /// Topic 0 belongs to a different event
    #[error("topic0 {found} does not match selector {expected}")]
    SelectorMismatch { expected: B256, found: String },

    /// Topics or data do not fit the event's argument schema
    #[error("abi decode failed: {0}")]
    Abi(#[from] alloy_dyn_abi::Error),

    /// A decoded value has no JSON rendering
    #[error("argument {argument} holds an unsupported {kind} value")]
    UnsupportedValue { argument: CompactString, kind: String },
}

/// One argument of an event, in declaration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventArgument {
    pub name: CompactString,
    pub ty: String,
    pub indexed: bool,
}

/// Everything needed to filter and decode one event type.
#[derive(Debug, Clone)]
pub struct EventDescriptor {
    name: CompactString,
    signature: String,
    selector: B256,
    arguments: Vec<EventArgument>,
    abi: Event,
}

impl EventDescriptor {
    /// Build a descriptor from a parsed ABI event item.
    pub fn from_abi(event: &Event) -> Self {
        let arguments = event
            .inputs
            .iter()
            .enumerate()
            .map(|(idx, param)| EventArgument {
                name: if param.name.is_empty() {
                    idx.to_compact_string()
                } else {
                    CompactString::from(param.name.as_str())
                },
                ty: param.selector_type().into_owned(),
                indexed: param.indexed,
            })
            .collect();

        Self {
            name: CompactString::from(event.name.as_str()),
            signature: event.signature(),
            selector: event.selector(),
            arguments,
            abi: event.clone(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Canonical signature, e.g. `Transfer(address,address,uint256)`.
    pub fn signature(&self) -> &str {
        &self.signature
    }

    /// keccak256 of the signature; topic 0 of every matching log.
    pub fn selector(&self) -> B256 {
        self.selector
    }

    pub fn arguments(&self) -> &[EventArgument] {
        &self.arguments
    }

    /// Decode a raw log entry of this event.
    pub fn decode(&self, raw: &RawLogEntry) -> Result<DecodedLog, DecodeError> {
        let topics = raw
            .topics
            .iter()
            .map(|topic| {
                B256::from_str(topic).map_err(|_| DecodeError::Topic {
                    topic: topic.clone(),
                })
            })
            .collect::<Result<SmallVec<[B256; 4]>, _>>()?;

        match topics.first() {
            Some(topic0) if *topic0 == self.selector => {}
            found => {
                return Err(DecodeError::SelectorMismatch {
                    expected: self.selector,
                    found: found.map(|t| t.to_string()).unwrap_or_default(),
                });
            }
        }

        let data = hex::decode(raw.data.strip_prefix("0x").unwrap_or(&raw.data))?;
        let decoded = self.abi.decode_log_parts(topics.iter().copied(), &data, true)?;

        let mut indexed = decoded.indexed.into_iter();
        let mut body = decoded.body.into_iter();
        let mut args = Vec::with_capacity(self.arguments.len());
        for argument in &self.arguments {
            let value = if argument.indexed {
                indexed.next()
            } else {
                body.next()
            };
            let value = match value {
                Some(value) => value_to_json(value).map_err(|kind| {
                    DecodeError::UnsupportedValue {
                        argument: argument.name.clone(),
                        kind,
                    }
                })?,
                None => Value::Null,
            };
            args.push((argument.name.clone(), value));
        }

        let address = Address::from_str(&raw.contract_address)
            .map_err(|_| DecodeError::Address(raw.contract_address.clone()))?;

        Ok(DecodedLog {
            args: EventArgs(args),
            event: self.name.clone(),
            log_index: raw.log_index,
            transaction_index: raw.transaction_index,
            transaction_hash: raw.transaction_hash.clone(),
            address: address.to_checksum(None),
            block_hash: raw.block_hash.clone(),
            block_number: raw.block_number,
        })
    }
}

/// Convert a decoded ABI value to JSON.
///
/// Integers of every width become decimal strings so that consumers never
/// lose precision; addresses are EIP-55 checksummed; byte strings are `0x`
/// hex.
///
/// A value kind without a rendering is returned as `Err` with its type name.
/// Named structs only come out of EIP-712 decoding, never out of an event log.
fn value_to_json(value: DynSolValue) -> Result<Value, String> {
    Ok(match value {
        DynSolValue::Bool(b) => Value::Bool(b),
        DynSolValue::Int(i, _) => Value::String(i.to_string()),
        DynSolValue::Uint(u, _) => Value::String(u.to_string()),
        DynSolValue::FixedBytes(word, size) => {
            Value::String(format!("0x{}", hex::encode(&word[..size.min(32)])))
        }
        DynSolValue::Bytes(bytes) => Value::String(format!("0x{}", hex::encode(bytes))),
        DynSolValue::String(s) => Value::String(s),
        DynSolValue::Address(address) => Value::String(address.to_checksum(None)),
        DynSolValue::Function(function) => {
            Value::String(format!("0x{}", hex::encode(function.as_slice())))
        }
        DynSolValue::Array(values)
        | DynSolValue::FixedArray(values)
        | DynSolValue::Tuple(values) => Value::Array(
            values
                .into_iter()
                .map(value_to_json)
                .collect::<Result<Vec<_>, _>>()?,
        ),
        DynSolValue::CustomStruct { name, .. } => return Err(format!("struct {name}")),
    })
}

/// The pollable events of one contract.
#[derive(Debug, Clone, Default)]
pub struct EventCatalog {
    events: Vec<Arc<EventDescriptor>>,
    anonymous: Vec<CompactString>,
}

impl EventCatalog {
    /// Derive the catalog from a parsed ABI.
    ///
    /// Anonymous events have no selector topic to filter on and are set
    /// aside in [`anonymous_events`](Self::anonymous_events).
    pub fn from_abi(abi: &JsonAbi) -> Self {
        let mut events = Vec::new();
        let mut anonymous = Vec::new();
        for event in abi.events() {
            if event.anonymous {
                anonymous.push(CompactString::from(event.name.as_str()));
            } else {
                events.push(Arc::new(EventDescriptor::from_abi(event)));
            }
        }
        events.sort_by(|a, b| (a.name(), a.signature()).cmp(&(b.name(), b.signature())));
        Self { events, anonymous }
    }

    /// Parse a JSON ABI document and derive the catalog.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let abi: JsonAbi = serde_json::from_str(json)?;
        Ok(Self::from_abi(&abi))
    }

    pub fn events(&self) -> &[Arc<EventDescriptor>] {
        &self.events
    }

    pub fn event_names(&self) -> Vec<&str> {
        self.events.iter().map(|e| e.name()).collect()
    }

    pub fn anonymous_events(&self) -> &[CompactString] {
        &self.anonymous
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
