//! HTTP clients for the node, the ABI directory and the event bus.
//!
//! Gated behind the `client` cargo feature so downstream crates that only
//! need the shared types do not pull in `reqwest`.

mod credentials;
mod etherscan;
mod eventbridge;
mod node;

pub use credentials::{
    CONTAINER_CREDENTIALS_HOST, ContainerAuth, CredentialSource, CredentialsProvider,
    IMDS_ENDPOINT, REFRESH_WINDOW,
};
pub use etherscan::EtherscanClient;
pub use eventbridge::EventBridgeClient;
pub use node::NodeClient;

use reqwest::StatusCode;

use crate::objects::JsonRpcError;

/// Errors produced by the SDK HTTP clients.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Transport-level failure (DNS, TLS, connection reset, …).
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// The server returned a non-2xx status code.
    #[error("api error: status {status}, body: {body}")]
    Api { status: StatusCode, body: String },

    /// Response body could not be deserialized.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// The base URL could not be joined with the endpoint path.
    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),

    /// The node answered with a JSON-RPC error object.
    #[error("{0}")]
    Rpc(JsonRpcError),

    /// The node answered with neither `result` nor `error`.
    #[error("JSON-RPC response has no result")]
    MissingResult,

    /// A hex quantity in a node response could not be parsed.
    #[error("invalid quantity: {0}")]
    Quantity(#[from] std::num::ParseIntError),

    /// The explorer envelope reported a failure.
    #[error("explorer error: {message}: {result}")]
    Explorer { message: String, result: String },

    /// No usable AWS credentials could be obtained.
    #[error("aws credentials: {0}")]
    Credentials(String),

    /// AWS returned a typed error.
    #[error("aws error {code} (status {status}): {message}")]
    Aws {
        status: StatusCode,
        code: String,
        message: String,
    },
}

impl ClientError {
    /// Whether the failure means the remote end could not be reached at all,
    /// as opposed to a well-formed refusal.
    pub fn is_connection_error(&self) -> bool {
        match self {
            ClientError::Http(e) => e.is_connect() || e.is_timeout() || e.is_request(),
            ClientError::Api { status, .. } => matches!(
                *status,
                StatusCode::BAD_GATEWAY | StatusCode::SERVICE_UNAVAILABLE | StatusCode::GATEWAY_TIMEOUT
            ),
            _ => false,
        }
    }

    /// The AWS error code, if this is a typed AWS error.
    pub fn aws_code(&self) -> Option<&str> {
        match self {
            ClientError::Aws { code, .. } => Some(code.as_str()),
            _ => None,
        }
    }
}

async fn parse_response<T: serde::de::DeserializeOwned>(
    resp: reqwest::Response,
) -> Result<T, ClientError> {
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(ClientError::Api { status, body });
    }
    let bytes = resp.bytes().await?;
    serde_json::from_slice(&bytes).map_err(ClientError::Json)
}
