//! Stripe Identity REST client
//!
//! Creates document verification sessions and reads the verified fields
//! back from the last verification report. The report and its date of birth
//! are not part of the default session payload, so both are requested
//! through `expand[]`.

use std::time::Duration;

use async_trait::async_trait;
use idv_common::{DateOfBirth, VerifiedDocument, USER_ID_METADATA_KEY};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::{PlatformError, Result};
use crate::provider::{IdentityProvider, VerificationSessionLink};

const SESSIONS_PATH: &str = "/v1/identity/verification_sessions";
const DOCUMENT_EXPANSIONS: [&str; 2] = [
    "last_verification_report",
    "last_verification_report.document.dob",
];

/// Stripe client configuration
#[derive(Debug, Clone)]
pub struct StripeClientConfig {
    /// API base URL
    pub api_base_url: String,
    /// Secret API key
    pub api_key: String,
    /// Connect timeout
    pub connect_timeout: Duration,
    /// Request timeout
    pub request_timeout: Duration,
}

impl Default for StripeClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: "https://api.stripe.com".to_string(),
            api_key: String::new(),
            connect_timeout: Duration::from_secs(5),
            request_timeout: Duration::from_secs(10),
        }
    }
}

/// A field that is either an object id or the expanded object
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Expandable<T> {
    Object(T),
    Id(#[allow(dead_code)] String),
}

impl<T> Expandable<T> {
    fn into_object(self) -> Option<T> {
        match self {
            Expandable::Object(object) => Some(object),
            Expandable::Id(_) => None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct SessionResponse {
    id: String,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    last_verification_report: Option<Expandable<ReportResponse>>,
}

#[derive(Debug, Deserialize)]
struct ReportResponse {
    #[serde(default)]
    document: Option<DocumentResponse>,
}

#[derive(Debug, Deserialize)]
struct DocumentResponse {
    #[serde(default)]
    first_name: Option<String>,
    #[serde(default)]
    last_name: Option<String>,
    #[serde(default)]
    dob: Option<DobResponse>,
}

#[derive(Debug, Deserialize)]
struct DobResponse {
    day: Option<u32>,
    month: Option<u32>,
    year: Option<i32>,
}

impl SessionResponse {
    fn into_document(self) -> VerifiedDocument {
        let document = self
            .last_verification_report
            .and_then(Expandable::into_object)
            .and_then(|report| report.document);

        match document {
            Some(doc) => VerifiedDocument {
                last_name: doc.last_name,
                first_name: doc.first_name,
                date_of_birth: doc
                    .dob
                    .map(|dob| DateOfBirth {
                        year: dob.year,
                        month: dob.month,
                        day: dob.day,
                    })
                    .unwrap_or_default(),
            },
            None => VerifiedDocument::default(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    code: Option<String>,
    #[serde(default, rename = "type")]
    error_type: Option<String>,
}

/// Machine-readable code of an error response. Messages can echo submitted
/// identity data and are never surfaced.
fn provider_error_code(body: &str) -> Option<String> {
    let envelope: ErrorEnvelope = serde_json::from_str(body).ok()?;
    envelope.error.code.or(envelope.error.error_type)
}

/// Stripe Identity client
pub struct StripeIdentityClient {
    config: StripeClientConfig,
    client: reqwest::Client,
}

impl StripeIdentityClient {
    pub fn new(config: StripeClientConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| PlatformError::configuration(format!("HTTP client: {}", e)))?;

        Ok(Self { config, client })
    }

    fn sessions_url(&self) -> String {
        format!("{}{}", self.config.api_base_url.trim_end_matches('/'), SESSIONS_PATH)
    }

    async fn read_session(&self, response: reqwest::Response) -> Result<SessionResponse> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let code = provider_error_code(&body);
            warn!(
                status = %status,
                code = code.as_deref().unwrap_or("unknown"),
                "Identity provider request failed"
            );
            return Err(PlatformError::provider_unavailable(format!("HTTP {}", status)));
        }

        response
            .json::<SessionResponse>()
            .await
            .map_err(|e| PlatformError::provider_unavailable(format!("Unreadable session: {}", e)))
    }
}

#[async_trait]
impl IdentityProvider for StripeIdentityClient {
    async fn create_verification_session(&self, user_id: &str) -> Result<VerificationSessionLink> {
        let metadata_key = format!("metadata[{}]", USER_ID_METADATA_KEY);
        let response = self
            .client
            .post(self.sessions_url())
            .bearer_auth(&self.config.api_key)
            .form(&[("type", "document"), (metadata_key.as_str(), user_id)])
            .send()
            .await
            .map_err(|e| PlatformError::provider_unavailable(e.to_string()))?;

        let session = self.read_session(response).await?;
        let url = session
            .url
            .ok_or_else(|| PlatformError::provider_unavailable("Session has no hosted URL"))?;

        debug!(user_id = %user_id, session_id = %session.id, "Verification session created");
        Ok(VerificationSessionLink {
            session_id: session.id,
            url,
        })
    }

    async fn fetch_verified_document(&self, session_id: &str) -> Result<VerifiedDocument> {
        let url = format!("{}/{}", self.sessions_url(), session_id);
        let expansions: Vec<(&str, &str)> =
            DOCUMENT_EXPANSIONS.iter().map(|path| ("expand[]", *path)).collect();

        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.config.api_key)
            .query(&expansions)
            .send()
            .await
            .map_err(|e| PlatformError::provider_unavailable(e.to_string()))?;

        let session = self.read_session(response).await?;
        debug!(session_id = %session.id, "Verified document fetched");
        Ok(session.into_document())
    }
}
