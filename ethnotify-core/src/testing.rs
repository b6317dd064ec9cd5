//! In-crate test doubles for the node, the bus and the ABI directory.

use async_trait::async_trait;
use ethnotify_sdk::client::ClientError;
use ethnotify_sdk::objects::{JsonRpcError, LogQuery, NotificationMessage};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::Notify;

use crate::abi::{AbiError, AbiResolver, ContractHandle, EventCatalog};
use crate::node::{NodeError, NodeRpc, RawLogEntry};
use crate::processors::{BusCreation, EventBus, PublishError};

pub const ERC20_ABI: &str = r#"[
    {"type":"function","name":"balanceOf","stateMutability":"view",
     "inputs":[{"name":"owner","type":"address"}],
     "outputs":[{"name":"","type":"uint256"}]},
    {"type":"event","name":"Transfer","anonymous":false,"inputs":[
        {"name":"from","type":"address","indexed":true},
        {"name":"to","type":"address","indexed":true},
        {"name":"value","type":"uint256","indexed":false}]},
    {"type":"event","name":"Approval","anonymous":false,"inputs":[
        {"name":"owner","type":"address","indexed":true},
        {"name":"spender","type":"address","indexed":true},
        {"name":"value","type":"uint256","indexed":false}]}
]"#;

pub const TRANSFER_TOPIC: &str =
    "0xddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef";
pub const APPROVAL_TOPIC: &str =
    "0x8c5be1e5ebec7d5bd14f71427d1e84f3dd0314c0f7b2291e5b200ac8c7c3b925";

const DAI: &str = "0x6b175474e89094c44da98b954eedeac495271d0f";
const FROM_TOPIC: &str = "0x000000000000000000000000d8da6bf26964af9d7eed9e03e53415d37aa96045";
const TO_TOPIC: &str = "0x000000000000000000000000a0b86991c6218b36c1d19d4a2e9eb0ce3606eb48";

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

/// A `Transfer`/`Approval`-shaped log emitted by DAI.
pub fn log_entry(topic0: &str, block: u64, log_index: u64, value: u64) -> RawLogEntry {
    RawLogEntry {
        contract_address: DAI.to_string(),
        block_number: block,
        block_hash: Some(format!("0x{block:064x}")),
        transaction_hash: Some(format!("0x{:064x}", block * 1_000 + log_index)),
        transaction_index: log_index,
        log_index,
        topics: [topic0, FROM_TOPIC, TO_TOPIC]
            .into_iter()
            .map(str::to_string)
            .collect(),
        data: format!("0x{value:064x}"),
        removed: false,
    }
}

pub fn transfer_log(block: u64, log_index: u64, value: u64) -> RawLogEntry {
    log_entry(TRANSFER_TOPIC, block, log_index, value)
}

pub fn contract(address: &str, abi: &str) -> ContractHandle {
    ContractHandle::new(address, EventCatalog::from_json(abi).unwrap()).unwrap()
}

/// Node double: a head, a log store, and switches for failure injection.
pub struct MockNode {
    head: AtomicU64,
    reachable: AtomicBool,
    probes: AtomicUsize,
    logs: Mutex<Vec<RawLogEntry>>,
    queries: Mutex<Vec<LogQuery>>,
    failing_topics: Mutex<HashSet<String>>,
    dropping_topics: Mutex<HashSet<String>>,
    crashing_topics: Mutex<HashSet<String>>,
}

impl MockNode {
    pub fn new(head: u64) -> Self {
        Self {
            head: AtomicU64::new(head),
            reachable: AtomicBool::new(true),
            probes: AtomicUsize::new(0),
            logs: Mutex::new(Vec::new()),
            queries: Mutex::new(Vec::new()),
            failing_topics: Mutex::new(HashSet::new()),
            dropping_topics: Mutex::new(HashSet::new()),
            crashing_topics: Mutex::new(HashSet::new()),
        }
    }

    pub fn set_head(&self, head: u64) {
        self.head.store(head, Ordering::SeqCst);
    }

    pub fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::SeqCst);
    }

    pub fn push_log(&self, entry: RawLogEntry) {
        lock(&self.logs).push(entry);
    }

    /// Answer `eth_getLogs` for `topic` with a JSON-RPC error.
    pub fn fail_topic(&self, topic: &str) {
        lock(&self.failing_topics).insert(topic.to_string());
    }

    /// Fail `eth_getLogs` for `topic` with a transport error while the node
    /// keeps answering liveness probes.
    pub fn drop_topic_connection(&self, topic: &str) {
        lock(&self.dropping_topics).insert(topic.to_string());
    }

    /// Take the whole node down the moment `eth_getLogs` asks for `topic`.
    pub fn lose_connection_on(&self, topic: &str) {
        lock(&self.crashing_topics).insert(topic.to_string());
    }

    pub fn clear_failures(&self) {
        lock(&self.failing_topics).clear();
        lock(&self.dropping_topics).clear();
        lock(&self.crashing_topics).clear();
    }

    /// Block ranges requested for `topic`, in request order.
    pub fn ranges_for(&self, topic: &str) -> Vec<(u64, u64)> {
        lock(&self.queries)
            .iter()
            .filter(|q| q.topics.first().is_some_and(|t| t == topic))
            .map(|q| (q.from_block, q.to_block))
            .collect()
    }

    pub fn probes(&self) -> usize {
        self.probes.load(Ordering::SeqCst)
    }

    pub fn queries(&self) -> Vec<LogQuery> {
        lock(&self.queries).clone()
    }

    fn connection_error() -> NodeError {
        NodeError::ConnectionLost(ClientError::Api {
            status: reqwest::StatusCode::BAD_GATEWAY,
            body: "upstream unavailable".to_string(),
        })
    }
}

#[async_trait]
impl NodeRpc for MockNode {
    async fn latest_block(&self) -> Result<u64, NodeError> {
        if !self.reachable.load(Ordering::SeqCst) {
            return Err(Self::connection_error());
        }
        Ok(self.head.load(Ordering::SeqCst))
    }

    async fn get_logs(&self, query: &LogQuery) -> Result<Vec<RawLogEntry>, NodeError> {
        lock(&self.queries).push(query.clone());
        if !self.reachable.load(Ordering::SeqCst) {
            return Err(Self::connection_error());
        }
        let topic = query.topics.first().cloned().unwrap_or_default();
        if lock(&self.crashing_topics).contains(&topic) {
            self.set_reachable(false);
            return Err(Self::connection_error());
        }
        if lock(&self.dropping_topics).contains(&topic) {
            return Err(Self::connection_error());
        }
        if lock(&self.failing_topics).contains(&topic) {
            return Err(NodeError::Rpc(ClientError::Rpc(JsonRpcError {
                code: -32000,
                message: "query timeout exceeded".to_string(),
                data: None,
            })));
        }
        let logs = lock(&self.logs)
            .iter()
            .filter(|l| l.contract_address.eq_ignore_ascii_case(&query.address))
            .filter(|l| l.topics.first() == Some(&topic))
            .filter(|l| (query.from_block..=query.to_block).contains(&l.block_number))
            .cloned()
            .collect();
        Ok(logs)
    }

    async fn is_connected(&self) -> bool {
        self.probes.fetch_add(1, Ordering::SeqCst);
        self.reachable.load(Ordering::SeqCst)
    }
}

/// Bus double recording created buses and published messages.
#[derive(Default)]
pub struct MockBus {
    buses: Mutex<Vec<String>>,
    published: Mutex<Vec<NotificationMessage>>,
    failing: AtomicBool,
    gate: Mutex<Option<Arc<Notify>>>,
    waiting: AtomicUsize,
}

impl MockBus {
    pub fn fail_publishes(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Make every `put_event` wait for a permit on the returned gate.
    pub fn hold_publishes(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *lock(&self.gate) = Some(gate.clone());
        gate
    }

    /// Calls that have reached the gate so far.
    pub fn waiting(&self) -> usize {
        self.waiting.load(Ordering::SeqCst)
    }

    pub fn buses(&self) -> Vec<String> {
        lock(&self.buses).clone()
    }

    pub fn published(&self) -> Vec<NotificationMessage> {
        lock(&self.published).clone()
    }
}

#[async_trait]
impl EventBus for MockBus {
    async fn create_bus_if_absent(&self, name: &str) -> Result<BusCreation, PublishError> {
        let mut buses = lock(&self.buses);
        if buses.iter().any(|b| b == name) {
            return Ok(BusCreation::AlreadyExists);
        }
        buses.push(name.to_string());
        Ok(BusCreation::Created {
            arn: Some(format!("arn:aws:events:us-east-1:000000000000:event-bus/{name}")),
        })
    }

    async fn put_event(&self, message: NotificationMessage) -> Result<String, PublishError> {
        let gate = lock(&self.gate).clone();
        if let Some(gate) = gate {
            self.waiting.fetch_add(1, Ordering::SeqCst);
            gate.notified().await;
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(PublishError::Unavailable("connection refused".to_string()));
        }
        let mut published = lock(&self.published);
        published.push(message);
        Ok(format!("event-{}", published.len()))
    }
}

/// Resolver that hands out the same ABI document for every address.
pub struct StaticAbiResolver {
    abi: String,
}

impl StaticAbiResolver {
    pub fn new(abi: &str) -> Self {
        Self {
            abi: abi.to_string(),
        }
    }
}

#[async_trait]
impl AbiResolver for StaticAbiResolver {
    async fn resolve(&self, _address: &str) -> Result<EventCatalog, AbiError> {
        Ok(EventCatalog::from_json(&self.abi)?)
    }
}
