//! Amazon EventBridge client (JSON 1.1 protocol, SigV4 signed).

use reqwest::Client;
use serde::Serialize;
use serde::de::DeserializeOwned;
use url::Url;

use super::{ClientError, CredentialsProvider};
use crate::objects::eventbridge::{
    AwsErrorBody, CreateEventBusRequest, CreateEventBusResponse, PutEventsRequest,
    PutEventsResponse,
};
use crate::objects::notification::NotificationMessage;
use crate::signature::{AMZ_DATE_HEADER, SECURITY_TOKEN_HEADER, SigningParams, sign_post};

const SERVICE: &str = "events";
const CONTENT_TYPE: &str = "application/x-amz-json-1.1";
const TARGET_HEADER: &str = "X-Amz-Target";

/// Typed HTTP client for the EventBridge control and data plane calls the
/// relay needs.
#[derive(Debug, Clone)]
pub struct EventBridgeClient {
    http: Client,
    endpoint: Url,
    region: String,
    credentials: CredentialsProvider,
}

impl EventBridgeClient {
    /// Create a client for the regional endpoint
    /// `https://events.{region}.amazonaws.com/`.
    pub fn new(
        region: impl Into<String>,
        credentials: CredentialsProvider,
    ) -> Result<Self, ClientError> {
        let region = region.into();
        let endpoint = Url::parse(&format!("https://events.{region}.amazonaws.com/"))?;
        Ok(Self {
            http: Client::new(),
            endpoint,
            region,
            credentials,
        })
    }

    /// Point the client at a different endpoint (VPC endpoint, localstack).
    pub fn with_endpoint(mut self, endpoint: Url) -> Self {
        self.endpoint = endpoint;
        self
    }

    /// Replace the default `reqwest::Client` with a custom one.
    pub fn with_http_client(mut self, client: Client) -> Self {
        self.http = client;
        self
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// `AWSEvents.CreateEventBus`.
    pub async fn create_event_bus(&self, name: &str) -> Result<CreateEventBusResponse, ClientError> {
        let body = CreateEventBusRequest {
            name: name.to_string(),
        };
        self.call("AWSEvents.CreateEventBus", &body).await
    }

    /// `AWSEvents.PutEvents`.
    pub async fn put_events(
        &self,
        entries: Vec<NotificationMessage>,
    ) -> Result<PutEventsResponse, ClientError> {
        let body = PutEventsRequest { entries };
        self.call("AWSEvents.PutEvents", &body).await
    }

    async fn call<B, T>(&self, target: &str, body: &B) -> Result<T, ClientError>
    where
        B: Serialize,
        T: DeserializeOwned,
    {
        let json = serde_json::to_vec(body)?;
        let host = self.host()?;
        let credentials = self.credentials.credentials().await?;

        let params = SigningParams {
            credentials: &credentials,
            region: &self.region,
            service: SERVICE,
            time: time::OffsetDateTime::now_utc(),
        };
        let signed = sign_post(
            &params,
            &host,
            &[("content-type", CONTENT_TYPE), ("x-amz-target", target)],
            &json,
        );

        let mut request = self
            .http
            .post(self.endpoint.clone())
            .header(reqwest::header::CONTENT_TYPE, CONTENT_TYPE)
            .header(TARGET_HEADER, target)
            .header(AMZ_DATE_HEADER, &signed.amz_date)
            .header(reqwest::header::AUTHORIZATION, &signed.authorization);
        if let Some(token) = &signed.security_token {
            request = request.header(SECURITY_TOKEN_HEADER, token);
        }

        let resp = request.body(json).send().await?;
        let status = resp.status();
        let bytes = resp.bytes().await?;

        if !status.is_success() {
            return Err(match serde_json::from_slice::<AwsErrorBody>(&bytes) {
                Ok(error) if !error.error_type.is_empty() => ClientError::Aws {
                    status,
                    code: error.code().to_string(),
                    message: error.message.unwrap_or_default(),
                },
                _ => ClientError::Api {
                    status,
                    body: String::from_utf8_lossy(&bytes).into_owned(),
                },
            });
        }

        serde_json::from_slice(&bytes).map_err(ClientError::Json)
    }

    fn host(&self) -> Result<String, ClientError> {
        let host = self
            .endpoint
            .host_str()
            .ok_or(ClientError::Url(url::ParseError::EmptyHost))?;
        Ok(match self.endpoint.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::CredentialSource;
    use crate::signature::AwsCredentials;

    fn client() -> EventBridgeClient {
        let credentials =
            CredentialsProvider::new(CredentialSource::Static(AwsCredentials::new("AKID", "secret")));
        EventBridgeClient::new("eu-west-1", credentials).unwrap()
    }

    #[test]
    fn test_regional_endpoint() {
        let client = client();
        assert_eq!(client.endpoint().as_str(), "https://events.eu-west-1.amazonaws.com/");
        assert_eq!(client.host().unwrap(), "events.eu-west-1.amazonaws.com");
    }

    #[test]
    fn test_endpoint_override_keeps_port() {
        let client = client().with_endpoint(Url::parse("http://localhost:4566/").unwrap());
        assert_eq!(client.host().unwrap(), "localhost:4566");
    }
}
