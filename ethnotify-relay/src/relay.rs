//! Wiring: builds the clients, resolves the contracts and assembles the
//! poller.

use anyhow::Context;
use ethnotify_core::abi::{AbiResolver, ContractHandle, EtherscanAbiResolver};
use ethnotify_core::node::NodeRpc;
use ethnotify_core::processors::{ConnectionMonitor, EventBus, EventPoller, LogFilterSet, Publisher};
use ethnotify_sdk::client::{
    CredentialSource, CredentialsProvider, EtherscanClient, EventBridgeClient, NodeClient,
};
use std::sync::Arc;
use tracing::{error, info};

use crate::config::RelayConfig;

/// Resolve every contract's ABI, make sure the bus exists and build the
/// poller. Any failure here is fatal for the process.
pub async fn build_poller(config: &RelayConfig) -> anyhow::Result<EventPoller> {
    let http = reqwest::Client::builder()
        .timeout(config.rpc_timeout)
        .build()
        .context("failed to build HTTP client")?;

    let node: Arc<dyn NodeRpc> =
        Arc::new(NodeClient::new(config.node_url.clone()).with_http_client(http.clone()));

    let resolver = EtherscanAbiResolver::new(
        EtherscanClient::new(
            config.abi_directory_url.clone(),
            config.etherscan_api_key.clone(),
        )
        .with_http_client(http.clone()),
    );
    let contracts = resolve_contracts(&resolver, &config.contracts).await?;

    let source = CredentialSource::from_env().context("AWS credentials are not configured")?;
    info!(source = source.kind(), "Resolved AWS credential source");
    let credentials = CredentialsProvider::new(source).with_http_client(http.clone());
    let mut bridge = EventBridgeClient::new(config.aws_region.clone(), credentials)
        .context("invalid EventBridge region")?
        .with_http_client(http);
    if let Some(endpoint) = &config.eventbridge_endpoint {
        bridge = bridge.with_endpoint(endpoint.clone());
    }
    let bus: Arc<dyn EventBus> = Arc::new(bridge);

    let publisher = Publisher::new(bus, config.event_bus_name.clone());
    publisher.ensure_bus(&config.event_bus_name).await.map_err(|e| {
        error!(
            error_kind = e.kind(),
            bus = %config.event_bus_name,
            error = %e,
            "Failed to create event bus"
        );
        e
    })?;

    let filters = LogFilterSet::new(&contracts);
    let monitor = Arc::new(ConnectionMonitor::new(node.clone()));
    monitor.on_disconnect(|reason| {
        tracing::debug!(reason = %reason, "Poll loop gated until the node answers again");
    });

    for contract in &contracts {
        info!(
            contract = %contract.checksum_address(),
            events = ?contract.catalog().event_names(),
            "Monitoring contract"
        );
    }
    info!(
        node = %config.node_url,
        bus = %config.event_bus_name,
        region = %config.aws_region,
        filters = filters.len(),
        poll_interval_secs = config.poller.poll_interval.as_secs(),
        confirmations = config.poller.confirmations,
        "Relay configured"
    );

    Ok(EventPoller::new(node, monitor, publisher, filters, config.poller))
}

/// Resolve every address, failing on the first one whose ABI is unavailable.
async fn resolve_contracts(
    resolver: &dyn AbiResolver,
    addresses: &[String],
) -> anyhow::Result<Vec<ContractHandle>> {
    let lookups = addresses.iter().map(|address| async move {
        ContractHandle::resolve(resolver, address).await.map_err(|e| {
            error!(
                error_kind = "abi_unavailable",
                contract = %address,
                error = %e,
                "Failed to resolve contract ABI"
            );
            anyhow::Error::new(e).context(format!("ABI unavailable for {address}"))
        })
    });
    futures_util::future::try_join_all(lookups).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use ethnotify_core::abi::{AbiError, EventCatalog};

    /// Knows exactly one contract.
    struct OneContract;

    #[async_trait::async_trait]
    impl AbiResolver for OneContract {
        async fn resolve(&self, address: &str) -> Result<EventCatalog, AbiError> {
            if address == "0x6B175474E89094C44Da98b954EedeAC495271d0F" {
                Ok(EventCatalog::default())
            } else {
                Err(AbiError::InvalidAddress(address.to_string()))
            }
        }
    }

    #[tokio::test]
    async fn test_resolve_contracts() {
        let resolved = resolve_contracts(
            &OneContract,
            &["0x6b175474e89094c44da98b954eedeac495271d0f".to_string()],
        )
        .await
        .unwrap();
        assert_eq!(resolved.len(), 1);
        assert!(resolved[0].catalog().is_empty());

        let err = resolve_contracts(
            &OneContract,
            &[
                "0x6b175474e89094c44da98b954eedeac495271d0f".to_string(),
                "0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48".to_string(),
            ],
        )
        .await
        .unwrap_err();
        assert!(err.to_string().contains("ABI unavailable"));
    }
}
