//! Ethereum JSON-RPC 2.0 wire types.

use serde::{Deserialize, Serialize, Serializer};
use std::num::ParseIntError;

/// A JSON-RPC 2.0 request with positional params.
#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcRequest<'a, P> {
    pub jsonrpc: &'static str,
    pub method: &'a str,
    pub params: P,
    pub id: u64,
}

impl<'a, P: Serialize> JsonRpcRequest<'a, P> {
    pub fn new(id: u64, method: &'a str, params: P) -> Self {
        Self {
            jsonrpc: "2.0",
            method,
            params,
            id,
        }
    }
}

/// A JSON-RPC 2.0 error object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl std::fmt::Display for JsonRpcError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "JSON-RPC error {}: {}", self.code, self.message)
    }
}

/// A JSON-RPC 2.0 response carrying either `result` or `error`.
#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcResponse<T> {
    pub id: Option<serde_json::Value>,
    pub result: Option<T>,
    pub error: Option<JsonRpcError>,
}

/// Parameters of `eth_getLogs` scoped to one contract and one event topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogQuery {
    pub address: String,
    pub topics: Vec<String>,
    #[serde(serialize_with = "serialize_quantity")]
    pub from_block: u64,
    #[serde(serialize_with = "serialize_quantity")]
    pub to_block: u64,
}

/// A log entry as returned by `eth_getLogs`.
///
/// Block and position fields are optional on the wire because pending logs
/// omit them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcLog {
    pub address: String,
    #[serde(default)]
    pub topics: Vec<String>,
    #[serde(default)]
    pub data: String,
    #[serde(default)]
    pub block_number: Option<String>,
    #[serde(default)]
    pub block_hash: Option<String>,
    #[serde(default)]
    pub transaction_hash: Option<String>,
    #[serde(default)]
    pub transaction_index: Option<String>,
    #[serde(default)]
    pub log_index: Option<String>,
    #[serde(default)]
    pub removed: bool,
}

/// Parse a hex quantity (`"0x1b4"`) into a `u64`.
pub fn parse_quantity(value: &str) -> Result<u64, ParseIntError> {
    let digits = value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
        .unwrap_or(value);
    u64::from_str_radix(digits, 16)
}

/// Format a `u64` as a minimal hex quantity.
pub fn format_quantity(value: u64) -> String {
    format!("{value:#x}")
}

fn serialize_quantity<S: Serializer>(value: &u64, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&format_quantity(*value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quantity_round_trip() {
        assert_eq!(parse_quantity("0x0").unwrap(), 0);
        assert_eq!(parse_quantity("0x64").unwrap(), 100);
        assert_eq!(parse_quantity("ff").unwrap(), 255);
        assert!(parse_quantity("0x").is_err());
        assert!(parse_quantity("0xzz").is_err());
        assert_eq!(format_quantity(0), "0x0");
        assert_eq!(format_quantity(100), "0x64");
    }

    #[test]
    fn test_log_query_wire_format() {
        let query = LogQuery {
            address: "0x6B175474E89094C44Da98b954EedeAC495271d0F".to_string(),
            topics: vec![
                "0xddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef".to_string(),
            ],
            from_block: 100,
            to_block: 101,
        };
        let request = JsonRpcRequest::new(7, "eth_getLogs", [&query]);
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["jsonrpc"], "2.0");
        assert_eq!(json["id"], 7);
        assert_eq!(json["params"][0]["fromBlock"], "0x64");
        assert_eq!(json["params"][0]["toBlock"], "0x65");
        assert_eq!(json["params"][0]["topics"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn test_response_with_error() {
        let body = r#"{"jsonrpc":"2.0","id":1,"error":{"code":-32005,"message":"query returned more than 10000 results"}}"#;
        let resp: JsonRpcResponse<Vec<RpcLog>> = serde_json::from_str(body).unwrap();
        assert!(resp.result.is_none());
        assert_eq!(resp.error.unwrap().code, -32005);
    }

    /// Same bound as the node client: any deserializable result type.
    fn parse_response<T: serde::de::DeserializeOwned>(body: &str) -> JsonRpcResponse<T> {
        serde_json::from_str(body).unwrap()
    }

    #[test]
    fn test_response_result_type_needs_no_default() {
        let resp: JsonRpcResponse<RpcLog> =
            parse_response(r#"{"jsonrpc":"2.0","id":3,"error":{"code":-32000,"message":"gone"}}"#);
        assert!(resp.result.is_none());
        assert_eq!(resp.id, Some(serde_json::json!(3)));

        let resp: JsonRpcResponse<String> =
            parse_response(r#"{"jsonrpc":"2.0","result":"Geth/v1.14.0"}"#);
        assert_eq!(resp.result.as_deref(), Some("Geth/v1.14.0"));
        assert!(resp.id.is_none());
        assert!(resp.error.is_none());
    }

    #[test]
    fn test_log_deserialization() {
        let body = r#"{
            "address": "0x6b175474e89094c44da98b954eedeac495271d0f",
            "topics": ["0xddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef"],
            "data": "0x",
            "blockNumber": "0x64",
            "blockHash": "0xabc",
            "transactionHash": "0xdef",
            "transactionIndex": "0x0",
            "logIndex": "0x1",
            "removed": false
        }"#;
        let log: RpcLog = serde_json::from_str(body).unwrap();
        assert_eq!(log.block_number.as_deref(), Some("0x64"));
        assert_eq!(log.log_index.as_deref(), Some("0x1"));
        assert!(!log.removed);
    }
}
