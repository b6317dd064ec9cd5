//! Etherscan-compatible explorer envelope.

use serde::{Deserialize, Serialize};

/// Envelope returned by every Etherscan API call.
///
/// `status == "1"` means success. On failure `message` is `"NOTOK"` and
/// `result` carries the human readable reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EtherscanResponse<T> {
    pub status: String,
    pub message: String,
    pub result: T,
}

impl<T> EtherscanResponse<T> {
    pub fn is_ok(&self) -> bool {
        self.status == "1"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_getabi_envelope() {
        let body = r#"{"status":"1","message":"OK","result":"[{\"type\":\"event\",\"name\":\"Ping\",\"inputs\":[],\"anonymous\":false}]"}"#;
        let resp: EtherscanResponse<String> = serde_json::from_str(body).unwrap();
        assert!(resp.is_ok());
        assert!(resp.result.starts_with('['));
    }

    #[test]
    fn test_unverified_contract() {
        let body = r#"{"status":"0","message":"NOTOK","result":"Contract source code not verified"}"#;
        let resp: EtherscanResponse<String> = serde_json::from_str(body).unwrap();
        assert!(!resp.is_ok());
        assert_eq!(resp.result, "Contract source code not verified");
    }
}
