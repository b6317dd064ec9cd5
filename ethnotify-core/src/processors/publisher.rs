//! Publisher - renders decoded logs into notification messages and hands
//! them to the event bus.
//!
//! Delivery is best effort: one attempt per entry, failures are reported
//! to the caller and never retried here.

use async_trait::async_trait;
use ethnotify_sdk::client::{ClientError, EventBridgeClient};
use ethnotify_sdk::objects::{NotificationMessage, RESOURCE_ALREADY_EXISTS};
use kanau::processor::Processor;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

use crate::events::DecodedLog;

/// Errors returned by an [`EventBus`] or the [`Publisher`].
#[derive(Debug, Error)]
pub enum PublishError {
    /// The bus could not be reached.
    #[error("event bus unavailable: {0}")]
    Unavailable(String),

    /// The bus answered and refused the request.
    #[error("event bus rejected the request: {code}: {message}")]
    Rejected { code: String, message: String },

    /// The decoded log could not be rendered.
    #[error("failed to render detail: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl PublishError {
    /// Short tag used as the `error_kind` log field.
    pub fn kind(&self) -> &'static str {
        match self {
            PublishError::Unavailable(_) => "publish_unavailable",
            PublishError::Rejected { .. } => "publish_rejected",
            PublishError::Serialization(_) => "publish_serialization",
        }
    }
}

impl From<ClientError> for PublishError {
    fn from(e: ClientError) -> Self {
        match e {
            ClientError::Aws { code, message, .. } => PublishError::Rejected { code, message },
            ClientError::Api { status, body } if status.is_client_error() => {
                PublishError::Rejected {
                    code: status.to_string(),
                    message: body,
                }
            }
            other => PublishError::Unavailable(other.to_string()),
        }
    }
}

/// Outcome of an idempotent bus creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BusCreation {
    Created { arn: Option<String> },
    AlreadyExists,
}

/// The message bus notifications are delivered to.
#[async_trait]
pub trait EventBus: Send + Sync {
    async fn create_bus_if_absent(&self, name: &str) -> Result<BusCreation, PublishError>;

    /// Deliver one message, returning the bus-assigned event id.
    async fn put_event(&self, message: NotificationMessage) -> Result<String, PublishError>;
}

#[async_trait]
impl EventBus for EventBridgeClient {
    async fn create_bus_if_absent(&self, name: &str) -> Result<BusCreation, PublishError> {
        match self.create_event_bus(name).await {
            Ok(resp) => Ok(BusCreation::Created {
                arn: resp.event_bus_arn,
            }),
            Err(e) if e.aws_code() == Some(RESOURCE_ALREADY_EXISTS) => Ok(BusCreation::AlreadyExists),
            Err(e) => Err(e.into()),
        }
    }

    async fn put_event(&self, message: NotificationMessage) -> Result<String, PublishError> {
        let resp = self.put_events(vec![message]).await?;
        let entry = resp.entries.into_iter().next();
        match entry {
            Some(entry) if entry.error_code.is_none() && resp.failed_entry_count == 0 => {
                Ok(entry.event_id.unwrap_or_default())
            }
            Some(entry) => Err(PublishError::Rejected {
                code: entry.error_code.unwrap_or_default(),
                message: entry.error_message.unwrap_or_default(),
            }),
            None => Err(PublishError::Rejected {
                code: "EmptyResponse".to_string(),
                message: "PutEvents returned no result entry".to_string(),
            }),
        }
    }
}

/// Turns decoded logs into notification messages on one bus.
#[derive(Clone)]
pub struct Publisher {
    bus: Arc<dyn EventBus>,
    bus_name: String,
}

impl Publisher {
    pub fn new(bus: Arc<dyn EventBus>, bus_name: impl Into<String>) -> Self {
        Self {
            bus,
            bus_name: bus_name.into(),
        }
    }

    pub fn bus_name(&self) -> &str {
        &self.bus_name
    }

    /// Create bus `name` unless it already exists. Safe to call repeatedly.
    pub async fn ensure_bus(&self, name: &str) -> Result<BusCreation, PublishError> {
        let outcome = self.bus.create_bus_if_absent(name).await?;
        match &outcome {
            BusCreation::Created { arn } => {
                info!(bus = %name, arn = ?arn, "Created event bus");
            }
            BusCreation::AlreadyExists => {
                info!(bus = %name, "Event bus already exists");
            }
        }
        Ok(outcome)
    }

    /// Render `log` and deliver it, returning the bus event id.
    pub async fn publish(&self, log: &DecodedLog) -> Result<String, PublishError> {
        let detail = log.to_detail()?;
        let message = NotificationMessage::new(detail, self.bus_name.as_str());
        let event_id = self.bus.put_event(message).await?;
        debug!(
            bus = %self.bus_name,
            event = %log.event,
            block = log.block_number,
            log_index = log.log_index,
            event_id = %event_id,
            "Published notification"
        );
        Ok(event_id)
    }
}

impl std::fmt::Debug for Publisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Publisher")
            .field("bus_name", &self.bus_name)
            .finish_non_exhaustive()
    }
}

impl Processor<DecodedLog> for Publisher {
    type Output = String;
    type Error = PublishError;

    async fn process(&self, log: DecodedLog) -> Result<String, PublishError> {
        self.publish(&log).await
    }
}
