//! Credential documents served by the ECS container endpoint and by the EC2
//! instance metadata service.

use serde::Deserialize;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

/// IMDS reports `Code: "Success"` on a usable document.
pub const IMDS_SUCCESS: &str = "Success";

/// Temporary credentials as both endpoints return them.
///
/// ```json
/// {"AccessKeyId": "...", "SecretAccessKey": "...", "Token": "...",
///  "Expiration": "2026-10-19T16:00:00Z"}
/// ```
#[derive(Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CredentialsDocument {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub token: Option<String>,
    pub expiration: Option<String>,
    /// Only present on IMDS documents.
    pub code: Option<String>,
}

impl CredentialsDocument {
    /// Parsed `Expiration`, if the document has one.
    pub fn expires_at(&self) -> Result<Option<OffsetDateTime>, time::error::Parse> {
        self.expiration
            .as_deref()
            .map(|s| OffsetDateTime::parse(s, &Rfc3339))
            .transpose()
    }

    pub fn is_success(&self) -> bool {
        self.code.as_deref().is_none_or(|code| code == IMDS_SUCCESS)
    }
}

impl std::fmt::Debug for CredentialsDocument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialsDocument")
            .field("access_key_id", &self.access_key_id)
            .field("expiration", &self.expiration)
            .field("code", &self.code)
            .finish_non_exhaustive()
    }
}
