//! Contract interface resolution.

mod catalog;

pub use catalog::{DecodeError, EventArgument, EventCatalog, EventDescriptor};

use alloy_primitives::Address;
use async_trait::async_trait;
use ethnotify_sdk::client::{ClientError, EtherscanClient};
use std::str::FromStr;
use thiserror::Error;
use tracing::{info, warn};

/// The contract's interface could not be obtained.
#[derive(Debug, Error)]
pub enum AbiError {
    #[error("invalid contract address {0}")]
    InvalidAddress(String),

    #[error("abi directory request failed: {0}")]
    Request(#[from] ClientError),

    #[error("abi document is malformed: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Resolves a contract address to the events it can emit.
#[async_trait]
pub trait AbiResolver: Send + Sync {
    async fn resolve(&self, address: &str) -> Result<EventCatalog, AbiError>;
}

/// Resolver backed by an Etherscan-compatible `getabi` endpoint.
#[derive(Debug, Clone)]
pub struct EtherscanAbiResolver {
    client: EtherscanClient,
}

impl EtherscanAbiResolver {
    pub fn new(client: EtherscanClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl AbiResolver for EtherscanAbiResolver {
    async fn resolve(&self, address: &str) -> Result<EventCatalog, AbiError> {
        let abi = self.client.get_abi(address).await?;
        let catalog = EventCatalog::from_json(&abi)?;
        if !catalog.anonymous_events().is_empty() {
            warn!(
                contract = %address,
                events = ?catalog.anonymous_events(),
                "Anonymous events carry no selector topic and will not be polled"
            );
        }
        info!(
            contract = %address,
            events = ?catalog.event_names(),
            "Resolved contract ABI"
        );
        Ok(catalog)
    }
}

/// One monitored contract and its event catalog.
#[derive(Debug, Clone)]
pub struct ContractHandle {
    address: Address,
    checksum: String,
    catalog: EventCatalog,
}

impl ContractHandle {
    /// Validate `address` and pair it with its catalog.
    pub fn new(address: &str, catalog: EventCatalog) -> Result<Self, AbiError> {
        let address = parse_address(address)?;
        Ok(Self {
            checksum: address.to_checksum(None),
            address,
            catalog,
        })
    }

    /// Resolve the catalog for `address` and build the handle.
    pub async fn resolve(resolver: &dyn AbiResolver, address: &str) -> Result<Self, AbiError> {
        let parsed = parse_address(address)?;
        let checksum = parsed.to_checksum(None);
        let catalog = resolver.resolve(&checksum).await?;
        Ok(Self {
            address: parsed,
            checksum,
            catalog,
        })
    }

    pub fn address(&self) -> Address {
        self.address
    }

    /// EIP-55 form of the address.
    pub fn checksum_address(&self) -> &str {
        &self.checksum
    }

    pub fn catalog(&self) -> &EventCatalog {
        &self.catalog
    }
}

fn parse_address(address: &str) -> Result<Address, AbiError> {
    let trimmed = address.trim();
    if !trimmed.starts_with("0x") && !trimmed.starts_with("0X") {
        return Err(AbiError::InvalidAddress(address.to_string()));
    }
    Address::from_str(trimmed).map_err(|_| AbiError::InvalidAddress(address.to_string()))
}
