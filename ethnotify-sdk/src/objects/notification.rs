//! The notification message put onto the event bus.
//!
//! Downstream consumers match on these exact values, so both the envelope
//! and the `Detail` text layout are part of the wire contract.

use serde::{Deserialize, Serialize};
use std::io;

/// `DetailType` of every notification.
pub const DETAIL_TYPE: &str = "Ethereum contract event notifications";

/// `Source` of every notification.
pub const SOURCE: &str = "ethereum";

/// Bus the relay creates and publishes to unless configured otherwise.
pub const DEFAULT_EVENT_BUS_NAME: &str = "ethereum_contract_events";

/// One bus entry. Field order is the serialized order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct NotificationMessage {
    pub detail_type: String,
    /// JSON text of the decoded log.
    pub detail: String,
    pub event_bus_name: String,
    pub source: String,
}

impl NotificationMessage {
    /// Wrap an already rendered detail document.
    pub fn new(detail: String, event_bus_name: impl Into<String>) -> Self {
        Self {
            detail_type: DETAIL_TYPE.to_string(),
            detail,
            event_bus_name: event_bus_name.into(),
            source: SOURCE.to_string(),
        }
    }
}

/// Serialize `value` the way Python's `json.dumps` does with default
/// arguments: `", "` and `": "` separators, everything outside printable
/// ASCII escaped as `\uXXXX`.
pub fn to_python_json<T: Serialize + ?Sized>(value: &T) -> Result<String, serde_json::Error> {
    let mut buf = Vec::with_capacity(256);
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, PythonFormatter);
    value.serialize(&mut ser)?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

struct PythonFormatter;

impl serde_json::ser::Formatter for PythonFormatter {
    fn begin_array_value<W: ?Sized + io::Write>(&mut self, writer: &mut W, first: bool) -> io::Result<()> {
        if first { Ok(()) } else { writer.write_all(b", ") }
    }

    fn begin_object_key<W: ?Sized + io::Write>(&mut self, writer: &mut W, first: bool) -> io::Result<()> {
        if first { Ok(()) } else { writer.write_all(b", ") }
    }

    fn begin_object_value<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        writer.write_all(b": ")
    }

    fn write_string_fragment<W: ?Sized + io::Write>(&mut self, writer: &mut W, fragment: &str) -> io::Result<()> {
        // Quotes, backslashes and C0 controls never reach this point.
        let mut start = 0;
        for (idx, ch) in fragment.char_indices() {
            if (' '..='~').contains(&ch) {
                continue;
            }
            writer.write_all(&fragment.as_bytes()[start..idx])?;
            let mut units = [0u16; 2];
            for unit in ch.encode_utf16(&mut units) {
                write!(writer, "\\u{unit:04x}")?;
            }
            start = idx + ch.len_utf8();
        }
        writer.write_all(&fragment.as_bytes()[start..])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_envelope_field_order() {
        let message = NotificationMessage::new("{}".to_string(), DEFAULT_EVENT_BUS_NAME);
        let json = serde_json::to_string(&message).unwrap();
        assert_eq!(
            json,
            r#"{"DetailType":"Ethereum contract event notifications","Detail":"{}","EventBusName":"ethereum_contract_events","Source":"ethereum"}"#
        );
    }

    #[test]
    fn test_python_separators() {
        let value = json!({"args": {"value": "1000"}, "list": ["a", "b"]});
        // serde_json's default map is sorted by key.
        assert_eq!(
            to_python_json(&value).unwrap(),
            r#"{"args": {"value": "1000"}, "list": ["a", "b"]}"#
        );
    }

    #[test]
    fn test_python_ascii_escaping() {
        assert_eq!(to_python_json("caf\u{e9}").unwrap(), r#""caf\u00e9""#);
        assert_eq!(to_python_json("\u{7f}").unwrap(), r#""\u007f""#);
        assert_eq!(to_python_json("\u{1f600}").unwrap(), r#""\ud83d\ude00""#);
        assert_eq!(to_python_json("a\"b\n").unwrap(), r#""a\"b\n""#);
    }
}
