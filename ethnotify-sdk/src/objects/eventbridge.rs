//! Amazon EventBridge JSON 1.1 request and response bodies.

use serde::{Deserialize, Serialize};

use super::notification::NotificationMessage;

/// Error code EventBridge returns when `CreateEventBus` targets an existing bus.
pub const RESOURCE_ALREADY_EXISTS: &str = "ResourceAlreadyExistsException";

/// Body of `AWSEvents.CreateEventBus`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CreateEventBusRequest {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CreateEventBusResponse {
    #[serde(default)]
    pub event_bus_arn: Option<String>,
}

/// Body of `AWSEvents.PutEvents`.
///
/// Each entry is a [`NotificationMessage`], whose field layout matches the
/// `PutEventsRequestEntry` shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PutEventsRequest {
    pub entries: Vec<NotificationMessage>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PutEventsResponse {
    #[serde(default)]
    pub failed_entry_count: u32,
    #[serde(default)]
    pub entries: Vec<PutEventsResultEntry>,
}

/// Per-entry outcome: either an `EventId` or an error code and message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PutEventsResultEntry {
    #[serde(default)]
    pub event_id: Option<String>,
    #[serde(default)]
    pub error_code: Option<String>,
    #[serde(default)]
    pub error_message: Option<String>,
}

/// Error body of an AWS JSON protocol response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AwsErrorBody {
    #[serde(rename = "__type", default)]
    pub error_type: String,
    #[serde(alias = "Message", default)]
    pub message: Option<String>,
}

impl AwsErrorBody {
    /// The bare error code, without the optional `namespace#` prefix.
    pub fn code(&self) -> &str {
        self.error_type
            .rsplit_once('#')
            .map_or(self.error_type.as_str(), |(_, code)| code)
    }
}
