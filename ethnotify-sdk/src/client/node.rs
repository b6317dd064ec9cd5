//! Ethereum JSON-RPC client.

use reqwest::Client;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use url::Url;

use super::{ClientError, parse_response};
use crate::objects::rpc::{JsonRpcRequest, JsonRpcResponse, LogQuery, RpcLog, parse_quantity};

/// Typed HTTP client for an Ethereum node's JSON-RPC endpoint.
///
/// Cloning is cheap; clones share the request id counter.
#[derive(Debug, Clone)]
pub struct NodeClient {
    http: Client,
    url: Url,
    next_id: Arc<AtomicU64>,
}

impl NodeClient {
    /// Create a new `NodeClient` for the given endpoint.
    pub fn new(url: Url) -> Self {
        Self {
            http: Client::new(),
            url,
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Replace the default `reqwest::Client` with a custom one (e.g. to
    /// configure timeouts or a proxy).
    pub fn with_http_client(mut self, client: Client) -> Self {
        self.http = client;
        self
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// `eth_blockNumber` – number of the most recent block.
    pub async fn block_number(&self) -> Result<u64, ClientError> {
        let quantity: String = self.call("eth_blockNumber", [(); 0]).await?;
        Ok(parse_quantity(&quantity)?)
    }

    /// `eth_getLogs` – all logs matching `query`.
    pub async fn get_logs(&self, query: &LogQuery) -> Result<Vec<RpcLog>, ClientError> {
        self.call("eth_getLogs", [query]).await
    }

    /// `web3_clientVersion` – the node's client string, used as a liveness probe.
    pub async fn client_version(&self) -> Result<String, ClientError> {
        self.call("web3_clientVersion", [(); 0]).await
    }

    async fn call<P, T>(&self, method: &str, params: P) -> Result<T, ClientError>
    where
        P: Serialize,
        T: DeserializeOwned,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let request = JsonRpcRequest::new(id, method, params);

        let resp = self
            .http
            .post(self.url.clone())
            .json(&request)
            .send()
            .await?;

        let body: JsonRpcResponse<T> = parse_response(resp).await?;
        if let Some(error) = body.error {
            return Err(ClientError::Rpc(error));
        }
        body.result.ok_or(ClientError::MissingResult)
    }
}
