//! Node adapter: the RPC surface the poller needs, and its JSON-RPC
//! implementation.

use async_trait::async_trait;
use ethnotify_sdk::client::{ClientError, NodeClient};
use ethnotify_sdk::objects::{LogQuery, RpcLog, parse_quantity};
use smallvec::SmallVec;
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum NodeError {
    /// The node could not be reached at all.
    #[error("connection lost: {0}")]
    ConnectionLost(#[source] ClientError),

    /// The node answered, but the call failed.
    #[error("rpc call failed: {0}")]
    Rpc(#[source] ClientError),

    /// A log entry lacks a field a mined log always has.
    #[error("malformed log entry: {0}")]
    MalformedLog(String),
}

impl NodeError {
    pub fn is_connection_lost(&self) -> bool {
        matches!(self, NodeError::ConnectionLost(_))
    }
}

impl From<ClientError> for NodeError {
    fn from(e: ClientError) -> Self {
        if e.is_connection_error() {
            NodeError::ConnectionLost(e)
        } else {
            NodeError::Rpc(e)
        }
    }
}

/// A mined log entry as reported by the node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawLogEntry {
    pub contract_address: String,
    pub block_number: u64,
    pub block_hash: Option<String>,
    pub transaction_hash: Option<String>,
    pub transaction_index: u64,
    pub log_index: u64,
    pub topics: SmallVec<[String; 4]>,
    pub data: String,
    pub removed: bool,
}

impl TryFrom<RpcLog> for RawLogEntry {
    type Error = NodeError;

    fn try_from(log: RpcLog) -> Result<Self, Self::Error> {
        fn quantity(field: &str, value: Option<&str>) -> Result<u64, NodeError> {
            let value = value.ok_or_else(|| NodeError::MalformedLog(format!("missing {field}")))?;
            parse_quantity(value)
                .map_err(|e| NodeError::MalformedLog(format!("invalid {field} {value}: {e}")))
        }

        Ok(Self {
            block_number: quantity("blockNumber", log.block_number.as_deref())?,
            transaction_index: quantity("transactionIndex", log.transaction_index.as_deref())?,
            log_index: quantity("logIndex", log.log_index.as_deref())?,
            contract_address: log.address,
            block_hash: log.block_hash,
            transaction_hash: log.transaction_hash,
            topics: log.topics.into_iter().collect(),
            data: log.data,
            removed: log.removed,
        })
    }
}

/// What the poller asks of an Ethereum node.
#[async_trait]
pub trait NodeRpc: Send + Sync {
    /// Number of the most recent block.
    async fn latest_block(&self) -> Result<u64, NodeError>;

    /// Mined logs matching `query`, in the order the node returns them.
    async fn get_logs(&self, query: &LogQuery) -> Result<Vec<RawLogEntry>, NodeError>;

    /// Liveness probe.
    async fn is_connected(&self) -> bool;
}

#[async_trait]
impl NodeRpc for NodeClient {
    async fn latest_block(&self) -> Result<u64, NodeError> {
        Ok(self.block_number().await?)
    }

    async fn get_logs(&self, query: &LogQuery) -> Result<Vec<RawLogEntry>, NodeError> {
        let logs = NodeClient::get_logs(self, query).await?;
        let entries = logs
            .into_iter()
            .filter_map(|log| match RawLogEntry::try_from(log) {
                Ok(entry) => Some(entry),
                Err(e) => {
                    warn!(
                        error_kind = "malformed_log",
                        contract = %query.address,
                        error = %e,
                        "Skipping log entry the node returned without a position"
                    );
                    None
                }
            })
            .collect();
        Ok(entries)
    }

    async fn is_connected(&self) -> bool {
        match self.client_version().await {
            Ok(_) => true,
            Err(e) => {
                warn!(node = %self.url(), error = %e, "Node liveness probe failed");
                false
            }
        }
    }
}
