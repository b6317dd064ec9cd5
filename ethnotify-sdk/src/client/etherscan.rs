//! Etherscan-compatible ABI directory client.

use reqwest::Client;
use url::Url;

use super::{ClientError, parse_response};
use crate::objects::etherscan::EtherscanResponse;

/// Typed HTTP client for the `contract/getabi` endpoint of an
/// Etherscan-compatible explorer.
#[derive(Debug, Clone)]
pub struct EtherscanClient {
    http: Client,
    base_url: Url,
    api_key: Option<String>,
}

impl EtherscanClient {
    pub const DEFAULT_API_URL: &str = "https://api.etherscan.io/api";

    /// Create a new `EtherscanClient`.
    ///
    /// * `base_url` – the explorer's API endpoint (e.g. `https://api.etherscan.io/api`).
    /// * `api_key` – optional API key; anonymous requests are heavily rate limited.
    pub fn new(base_url: Url, api_key: Option<String>) -> Self {
        Self {
            http: Client::new(),
            base_url,
            api_key,
        }
    }

    /// Replace the default `reqwest::Client` with a custom one.
    pub fn with_http_client(mut self, client: Client) -> Self {
        self.http = client;
        self
    }

    /// `GET ?module=contract&action=getabi&address=…` – the verified ABI of
    /// `address` as a JSON document.
    pub async fn get_abi(&self, address: &str) -> Result<String, ClientError> {
        let mut query = vec![
            ("module", "contract"),
            ("action", "getabi"),
            ("address", address),
        ];
        if let Some(key) = &self.api_key {
            query.push(("apikey", key.as_str()));
        }

        let resp = self
            .http
            .get(self.base_url.clone())
            .query(&query)
            .send()
            .await?;

        let envelope: EtherscanResponse<String> = parse_response(resp).await?;
        if !envelope.is_ok() {
            return Err(ClientError::Explorer {
                message: envelope.message,
                result: envelope.result,
            });
        }
        Ok(envelope.result)
    }
}
