//! AWS credential resolution for the EventBridge client.
//!
//! Sources are picked once, in the order the AWS SDKs use:
//!
//! 1. `AWS_ACCESS_KEY_ID` / `AWS_SECRET_ACCESS_KEY` (+ `AWS_SESSION_TOKEN`)
//! 2. the ECS container endpoint (`AWS_CONTAINER_CREDENTIALS_RELATIVE_URI`
//!    or `AWS_CONTAINER_CREDENTIALS_FULL_URI`), which is how a Fargate task
//!    role reaches the process
//! 3. the EC2 instance metadata service, IMDSv2 session tokens only
//!
//! Temporary credentials are cached and fetched again once they are within
//! [`REFRESH_WINDOW`] of their expiration.

use reqwest::Client;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use time::{Duration, OffsetDateTime};
use url::Url;

use super::{ClientError, parse_response};
use crate::objects::credentials::CredentialsDocument;
use crate::signature::AwsCredentials;

/// Base of `AWS_CONTAINER_CREDENTIALS_RELATIVE_URI`.
pub const CONTAINER_CREDENTIALS_HOST: &str = "http://169.254.170.2";

/// Default instance metadata endpoint.
pub const IMDS_ENDPOINT: &str = "http://169.254.169.254";

/// Temporary credentials are replaced this long before they expire.
pub const REFRESH_WINDOW: Duration = Duration::minutes(5);

const IMDS_TOKEN_TTL_HEADER: &str = "X-aws-ec2-metadata-token-ttl-seconds";
const IMDS_TOKEN_HEADER: &str = "X-aws-ec2-metadata-token";
const IMDS_TOKEN_TTL_SECS: &str = "21600";

/// How the container endpoint authenticates the caller.
#[derive(Clone, PartialEq, Eq)]
pub enum ContainerAuth {
    None,
    Token(String),
    /// Re-read on every fetch; the agent rotates it.
    TokenFile(PathBuf),
}

impl std::fmt::Debug for ContainerAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ContainerAuth::None => f.write_str("None"),
            ContainerAuth::Token(_) => f.write_str("Token(<redacted>)"),
            ContainerAuth::TokenFile(path) => f.debug_tuple("TokenFile").field(path).finish(),
        }
    }
}

/// Where credentials come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialSource {
    Static(AwsCredentials),
    Container { uri: Url, auth: ContainerAuth },
    InstanceMetadata { endpoint: Url },
}

impl CredentialSource {
    /// Pick the source from the process environment.
    pub fn from_env() -> Result<Self, ClientError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Pick the source from `lookup`, which maps a variable name to its value.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ClientError> {
        let var = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if let (Some(id), Some(secret)) = (var("AWS_ACCESS_KEY_ID"), var("AWS_SECRET_ACCESS_KEY")) {
            let mut credentials = AwsCredentials::new(id, secret);
            if let Some(token) = var("AWS_SESSION_TOKEN") {
                credentials = credentials.with_session_token(token);
            }
            return Ok(Self::Static(credentials));
        }

        let auth = match (
            var("AWS_CONTAINER_AUTHORIZATION_TOKEN_FILE"),
            var("AWS_CONTAINER_AUTHORIZATION_TOKEN"),
        ) {
            (Some(path), _) => ContainerAuth::TokenFile(PathBuf::from(path)),
            (None, Some(token)) => ContainerAuth::Token(token),
            (None, None) => ContainerAuth::None,
        };
        if let Some(relative) = var("AWS_CONTAINER_CREDENTIALS_RELATIVE_URI") {
            let uri = Url::parse(CONTAINER_CREDENTIALS_HOST)?.join(&relative)?;
            return Ok(Self::Container { uri, auth });
        }
        if let Some(full) = var("AWS_CONTAINER_CREDENTIALS_FULL_URI") {
            return Ok(Self::Container {
                uri: Url::parse(&full)?,
                auth,
            });
        }

        if var("AWS_EC2_METADATA_DISABLED").is_some_and(|v| v.eq_ignore_ascii_case("true")) {
            return Err(ClientError::Credentials(
                "no credentials in the environment and instance metadata is disabled".to_string(),
            ));
        }
        let endpoint = var("AWS_EC2_METADATA_SERVICE_ENDPOINT")
            .unwrap_or_else(|| IMDS_ENDPOINT.to_string());
        Ok(Self::InstanceMetadata {
            endpoint: Url::parse(&endpoint)?,
        })
    }

    /// Short name for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            CredentialSource::Static(_) => "environment",
            CredentialSource::Container { .. } => "container",
            CredentialSource::InstanceMetadata { .. } => "instance-metadata",
        }
    }
}

#[derive(Debug, Clone)]
struct CachedCredentials {
    credentials: AwsCredentials,
    expires_at: Option<OffsetDateTime>,
}

impl CachedCredentials {
    fn is_fresh(&self, now: OffsetDateTime) -> bool {
        self.expires_at
            .is_none_or(|expires_at| now + REFRESH_WINDOW < expires_at)
    }
}

impl TryFrom<CredentialsDocument> for CachedCredentials {
    type Error = ClientError;

    fn try_from(doc: CredentialsDocument) -> Result<Self, Self::Error> {
        if !doc.is_success() {
            return Err(ClientError::Credentials(format!(
                "credential endpoint reported {}",
                doc.code.as_deref().unwrap_or_default()
            )));
        }
        let expires_at = doc
            .expires_at()
            .map_err(|e| ClientError::Credentials(format!("invalid Expiration: {e}")))?;
        let mut credentials = AwsCredentials::new(doc.access_key_id, doc.secret_access_key);
        if let Some(token) = doc.token.filter(|t| !t.is_empty()) {
            credentials = credentials.with_session_token(token);
        }
        Ok(Self {
            credentials,
            expires_at,
        })
    }
}

/// Hands out signing credentials, fetching temporary ones as needed.
///
/// Cloning is cheap; clones share the cache.
#[derive(Clone)]
pub struct CredentialsProvider {
    http: Client,
    source: CredentialSource,
    cached: Arc<Mutex<Option<CachedCredentials>>>,
}

impl CredentialsProvider {
    pub fn new(source: CredentialSource) -> Self {
        Self {
            http: Client::new(),
            source,
            cached: Arc::new(Mutex::new(None)),
        }
    }

    /// Replace the default `reqwest::Client` with a custom one.
    pub fn with_http_client(mut self, client: Client) -> Self {
        self.http = client;
        self
    }

    pub fn source(&self) -> &CredentialSource {
        &self.source
    }

    /// Credentials valid for at least [`REFRESH_WINDOW`].
    pub async fn credentials(&self) -> Result<AwsCredentials, ClientError> {
        if let Some(credentials) = self.cached_at(OffsetDateTime::now_utc()) {
            return Ok(credentials);
        }

        let doc = match &self.source {
            CredentialSource::Static(credentials) => return Ok(credentials.clone()),
            CredentialSource::Container { uri, auth } => self.fetch_container(uri, auth).await?,
            CredentialSource::InstanceMetadata { endpoint } => {
                self.fetch_instance_metadata(endpoint).await?
            }
        };
        let fetched = CachedCredentials::try_from(doc)?;
        let credentials = fetched.credentials.clone();
        self.store(fetched);
        Ok(credentials)
    }

    fn cached_at(&self, now: OffsetDateTime) -> Option<AwsCredentials> {
        self.cached
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .filter(|cached| cached.is_fresh(now))
            .map(|cached| cached.credentials.clone())
    }

    fn store(&self, fetched: CachedCredentials) {
        *self.cached.lock().unwrap_or_else(PoisonError::into_inner) = Some(fetched);
    }

    async fn fetch_container(
        &self,
        uri: &Url,
        auth: &ContainerAuth,
    ) -> Result<CredentialsDocument, ClientError> {
        let mut request = self.http.get(uri.clone());
        match auth {
            ContainerAuth::None => {}
            ContainerAuth::Token(token) => {
                request = request.header(reqwest::header::AUTHORIZATION, token);
            }
            ContainerAuth::TokenFile(path) => {
                let token = std::fs::read_to_string(path).map_err(|e| {
                    ClientError::Credentials(format!(
                        "failed to read {}: {e}",
                        path.display()
                    ))
                })?;
                request = request.header(reqwest::header::AUTHORIZATION, token.trim());
            }
        }
        parse_response(request.send().await?).await
    }

    async fn fetch_instance_metadata(
        &self,
        endpoint: &Url,
    ) -> Result<CredentialsDocument, ClientError> {
        let token_resp = self
            .http
            .put(endpoint.join("latest/api/token")?)
            .header(IMDS_TOKEN_TTL_HEADER, IMDS_TOKEN_TTL_SECS)
            .send()
            .await?;
        let token = response_text(token_resp).await?;

        let roles_url = endpoint.join("latest/meta-data/iam/security-credentials/")?;
        let roles_resp = self
            .http
            .get(roles_url.clone())
            .header(IMDS_TOKEN_HEADER, token.as_str())
            .send()
            .await?;
        let roles = response_text(roles_resp).await?;
        let role = roles.lines().map(str::trim).find(|l| !l.is_empty()).ok_or_else(|| {
            ClientError::Credentials("instance profile has no role attached".to_string())
        })?;

        let resp = self
            .http
            .get(roles_url.join(role)?)
            .header(IMDS_TOKEN_HEADER, token.as_str())
            .send()
            .await?;
        parse_response(resp).await
    }
}

impl std::fmt::Debug for CredentialsProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialsProvider")
            .field("source", &self.source.kind())
            .finish_non_exhaustive()
    }
}

async fn response_text(resp: reqwest::Response) -> Result<String, ClientError> {
    let status = resp.status();
    let body = resp.text().await?;
    if !status.is_success() {
        return Err(ClientError::Api { status, body });
    }
    Ok(body.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn source(vars: &[(&str, &str)]) -> Result<CredentialSource, ClientError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        CredentialSource::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn test_static_keys_win() {
        let picked = source(&[
            ("AWS_ACCESS_KEY_ID", "AKID"),
            ("AWS_SECRET_ACCESS_KEY", "secret"),
            ("AWS_SESSION_TOKEN", "session"),
            ("AWS_CONTAINER_CREDENTIALS_RELATIVE_URI", "/v2/credentials/abc"),
        ])
        .unwrap();
        assert_eq!(
            picked,
            CredentialSource::Static(
                AwsCredentials::new("AKID", "secret").with_session_token("session")
            )
        );
        assert_eq!(picked.kind(), "environment");
    }

    #[test]
    fn test_task_role_through_container_endpoint() {
        let picked = source(&[
            ("AWS_ACCESS_KEY_ID", "AKID"),
            ("AWS_CONTAINER_CREDENTIALS_RELATIVE_URI", "/v2/credentials/abc"),
        ])
        .unwrap();
        assert_eq!(
            picked,
            CredentialSource::Container {
                uri: Url::parse("http://169.254.170.2/v2/credentials/abc").unwrap(),
                auth: ContainerAuth::None,
            }
        );
        assert_eq!(picked.kind(), "container");

        let picked = source(&[
            ("AWS_CONTAINER_CREDENTIALS_FULL_URI", "http://127.0.0.1:1338/creds"),
            ("AWS_CONTAINER_AUTHORIZATION_TOKEN", "Basic abc"),
        ])
        .unwrap();
        assert_eq!(
            picked,
            CredentialSource::Container {
                uri: Url::parse("http://127.0.0.1:1338/creds").unwrap(),
                auth: ContainerAuth::Token("Basic abc".to_string()),
            }
        );
        assert!(!format!("{picked:?}").contains("Basic abc"));

        let picked = source(&[
            ("AWS_CONTAINER_CREDENTIALS_FULL_URI", "http://127.0.0.1:1338/creds"),
            ("AWS_CONTAINER_AUTHORIZATION_TOKEN", "Basic abc"),
            ("AWS_CONTAINER_AUTHORIZATION_TOKEN_FILE", "/var/run/token"),
        ])
        .unwrap();
        assert!(matches!(
            picked,
            CredentialSource::Container { auth: ContainerAuth::TokenFile(_), .. }
        ));
    }

    #[test]
    fn test_instance_metadata_fallback() {
        let picked = source(&[]).unwrap();
        assert_eq!(
            picked,
            CredentialSource::InstanceMetadata {
                endpoint: Url::parse(IMDS_ENDPOINT).unwrap()
            }
        );

        let picked = source(&[("AWS_EC2_METADATA_SERVICE_ENDPOINT", "http://[fd00:ec2::254]")]).unwrap();
        assert_eq!(picked.kind(), "instance-metadata");

        assert!(matches!(
            source(&[("AWS_EC2_METADATA_DISABLED", "TRUE")]),
            Err(ClientError::Credentials(_))
        ));
    }

    #[test]
    fn test_refresh_before_expiry() {
        let doc: CredentialsDocument = serde_json::from_str(
            r#"{"AccessKeyId": "ASIA", "SecretAccessKey": "s", "Token": "t",
                "Expiration": "2026-10-19T16:00:00Z"}"#,
        )
        .unwrap();
        let cached = CachedCredentials::try_from(doc).unwrap();
        assert_eq!(cached.credentials.session_token.as_deref(), Some("t"));

        let expires_at = cached.expires_at.unwrap();
        assert!(cached.is_fresh(expires_at - Duration::minutes(10)));
        assert!(!cached.is_fresh(expires_at - Duration::minutes(5)));
        assert!(!cached.is_fresh(expires_at + Duration::minutes(1)));

        let provider = CredentialsProvider::new(CredentialSource::InstanceMetadata {
            endpoint: Url::parse(IMDS_ENDPOINT).unwrap(),
        });
        provider.store(cached);
        assert!(provider.cached_at(expires_at - Duration::hours(1)).is_some());
        assert!(provider.cached_at(expires_at - Duration::minutes(1)).is_none());
    }

    #[test]
    fn test_rejected_document() {
        let doc: CredentialsDocument = serde_json::from_str(
            r#"{"Code": "AssumeRoleUnauthorizedAccess", "AccessKeyId": "", "SecretAccessKey": ""}"#,
        )
        .unwrap();
        assert!(matches!(
            CachedCredentials::try_from(doc),
            Err(ClientError::Credentials(_))
        ));
    }
}
