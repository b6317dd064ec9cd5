//! Configuration for ethnotify-relay.
//!
//! Every setting comes from the environment and can be overridden by the
//! matching command line flag. [`Args::into_config`] validates the raw values
//! into a [`RelayConfig`].

use clap::Parser;
use ethnotify_core::config::PollerConfig;
use ethnotify_sdk::client::EtherscanClient;
use ethnotify_sdk::objects::DEFAULT_EVENT_BUS_NAME;
use std::time::Duration;
use thiserror::Error;
use url::Url;

const DEFAULT_REGION: &str = "us-east-1";
const MAX_BUS_NAME_LEN: usize = 256;

/// Errors that can occur while validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid url for {field}: {source}")]
    InvalidUrl {
        field: &'static str,
        #[source]
        source: url::ParseError,
    },

    #[error("invalid contract address {0:?}: expected 0x followed by 40 hex digits")]
    InvalidContract(String),

    #[error("validation error: {0}")]
    ValidationError(String),
}

/// ethnotify-relay - publish Ethereum contract events to EventBridge
#[derive(Parser, Debug, Clone)]
#[command(name = "ethnotify-relay")]
#[command(version, about, long_about = None)]
pub struct Args {
    /// JSON-RPC endpoint of the Ethereum node
    #[arg(long, env = "NODE_URL")]
    pub node_url: String,

    /// Contract address to monitor; a comma-separated list monitors several
    #[arg(long, env = "CONTRACT_ADDRESS", value_delimiter = ',', required = true)]
    pub contract_address: Vec<String>,

    /// Seconds between poll cycles
    #[arg(long, env = "POLL_INTERVAL", default_value_t = 10)]
    pub poll_interval: u64,

    /// Blocks below the head treated as confirmed
    #[arg(long, env = "CONFIRMATIONS", default_value_t = 0)]
    pub confirmations: u64,

    /// Event bus to create and publish to
    #[arg(long, env = "EVENT_BUS_NAME", default_value = DEFAULT_EVENT_BUS_NAME)]
    pub event_bus_name: String,

    /// Etherscan-compatible ABI endpoint
    #[arg(long, env = "ABI_DIRECTORY_URL", default_value = EtherscanClient::DEFAULT_API_URL)]
    pub abi_directory_url: String,

    /// API key for the ABI directory
    #[arg(long, env = "ETHERSCAN_API_KEY", hide_env_values = true)]
    pub etherscan_api_key: Option<String>,

    /// EventBridge region; falls back to AWS_DEFAULT_REGION, then us-east-1
    #[arg(long, env = "AWS_REGION")]
    pub aws_region: Option<String>,

    /// EventBridge endpoint override (e.g. a localstack URL)
    #[arg(long, env = "EVENTBRIDGE_ENDPOINT")]
    pub eventbridge_endpoint: Option<String>,

    /// Ceiling for the reconnect backoff, in seconds
    #[arg(long, env = "MAX_RECONNECT_DELAY", default_value_t = 300)]
    pub max_reconnect_delay: u64,

    /// Give up after this many failed reconnect attempts (default: never)
    #[arg(long, env = "MAX_RECONNECT_ATTEMPTS")]
    pub max_reconnect_attempts: Option<u32>,

    /// HTTP timeout for node, ABI directory and bus calls, in seconds
    #[arg(long, env = "RPC_TIMEOUT", default_value_t = 30)]
    pub rpc_timeout: u64,

    /// Grace period for the in-flight poll cycle on shutdown, in seconds
    #[arg(long, env = "SHUTDOWN_GRACE_SECS", default_value_t = 30)]
    pub shutdown_grace_secs: u64,
}

/// Validated relay configuration.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub node_url: Url,
    /// Deduplicated, in the order given.
    pub contracts: Vec<String>,
    pub poller: PollerConfig,
    pub event_bus_name: String,
    pub abi_directory_url: Url,
    pub etherscan_api_key: Option<String>,
    pub aws_region: String,
    pub eventbridge_endpoint: Option<Url>,
    pub rpc_timeout: Duration,
    pub shutdown_grace: Duration,
}

impl Args {
    /// Validate the raw arguments.
    ///
    /// `default_region` is consulted when no region was given explicitly.
    pub fn into_config(self, default_region: Option<String>) -> Result<RelayConfig, ConfigError> {
        let node_url = parse_url("NODE_URL", &self.node_url)?;
        let abi_directory_url = parse_url("ABI_DIRECTORY_URL", &self.abi_directory_url)?;
        let eventbridge_endpoint = self
            .eventbridge_endpoint
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .map(|s| parse_url("EVENTBRIDGE_ENDPOINT", s))
            .transpose()?;

        let mut contracts: Vec<String> = Vec::with_capacity(self.contract_address.len());
        for raw in &self.contract_address {
            let address = raw.trim();
            if address.is_empty() {
                continue;
            }
            if !is_contract_address(address) {
                return Err(ConfigError::InvalidContract(address.to_string()));
            }
            if !contracts.iter().any(|c| c.eq_ignore_ascii_case(address)) {
                contracts.push(address.to_string());
            }
        }
        if contracts.is_empty() {
            return Err(ConfigError::ValidationError(
                "CONTRACT_ADDRESS names no contract".to_string(),
            ));
        }

        if self.poll_interval == 0 {
            return Err(ConfigError::ValidationError(
                "POLL_INTERVAL must be at least 1 second".to_string(),
            ));
        }
        if self.rpc_timeout == 0 {
            return Err(ConfigError::ValidationError(
                "RPC_TIMEOUT must be at least 1 second".to_string(),
            ));
        }
        validate_bus_name(&self.event_bus_name)?;

        let aws_region = self
            .aws_region
            .or(default_region)
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty())
            .unwrap_or_else(|| DEFAULT_REGION.to_string());

        let poller = PollerConfig::new(Duration::from_secs(self.poll_interval), self.confirmations)
            .with_max_reconnect_delay(Duration::from_secs(self.max_reconnect_delay))
            .with_max_reconnect_attempts(self.max_reconnect_attempts);

        Ok(RelayConfig {
            node_url,
            contracts,
            poller,
            event_bus_name: self.event_bus_name,
            abi_directory_url,
            etherscan_api_key: self.etherscan_api_key.filter(|k| !k.is_empty()),
            aws_region,
            eventbridge_endpoint,
            rpc_timeout: Duration::from_secs(self.rpc_timeout),
            shutdown_grace: Duration::from_secs(self.shutdown_grace_secs),
        })
    }
}

fn parse_url(field: &'static str, value: &str) -> Result<Url, ConfigError> {
    Url::parse(value.trim()).map_err(|source| ConfigError::InvalidUrl { field, source })
}

fn is_contract_address(address: &str) -> bool {
    address
        .strip_prefix("0x")
        .or_else(|| address.strip_prefix("0X"))
        .is_some_and(|hex| hex.len() == 40 && hex.bytes().all(|b| b.is_ascii_hexdigit()))
}

/// EventBridge bus names: 1-256 characters of `A-Z a-z 0-9 . - _ /`.
fn validate_bus_name(name: &str) -> Result<(), ConfigError> {
    let valid = !name.is_empty()
        && name.len() <= MAX_BUS_NAME_LEN
        && name
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'.' | b'-' | b'_' | b'/'));
    if valid {
        Ok(())
    } else {
        Err(ConfigError::ValidationError(format!(
            "EVENT_BUS_NAME {name:?} is not a valid event bus name"
        )))
    }
}
