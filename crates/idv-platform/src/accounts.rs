//! Account Deletion
//!
//! Removes the authentication identity behind a rejected user through the
//! auth provider's admin REST API (`accounts:delete`).

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{PlatformError, Result};

/// Every failure surfaces as `PlatformError::StoreUnavailable`
#[async_trait]
pub trait AccountDeletion: Send + Sync {
    /// Delete the auth identity. An identity that no longer exists counts
    /// as deleted.
    async fn delete_auth_identity(&self, user_id: &str) -> Result<()>;
}

/// Admin API client configuration
#[derive(Debug, Clone)]
pub struct IdentityToolkitConfig {
    pub api_base_url: String,
    /// Empty uses the project bound to the token
    pub project_id: String,
    pub access_token: String,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
}

impl Default for IdentityToolkitConfig {
    fn default() -> Self {
        Self {
            api_base_url: "https://identitytoolkit.googleapis.com".to_string(),
            project_id: String::new(),
            access_token: String::new(),
            connect_timeout: Duration::from_secs(5),
            request_timeout: Duration::from_secs(5),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DeleteAccountRequest<'a> {
    local_id: &'a str,
}

const USER_NOT_FOUND: &str = "USER_NOT_FOUND";

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
}

/// Error code from `{"error":{"message":"CODE : detail"}}`; the detail is dropped
fn auth_error_code(body: &str) -> Option<String> {
    let envelope: ErrorEnvelope = serde_json::from_str(body).ok()?;
    let code = envelope.error.message.split(" : ").next()?.trim();
    (!code.is_empty()).then(|| code.to_string())
}

/// Identity Toolkit admin client
pub struct IdentityToolkitAccounts {
    config: IdentityToolkitConfig,
    client: reqwest::Client,
}

impl IdentityToolkitAccounts {
    pub fn new(config: IdentityToolkitConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| PlatformError::configuration(format!("HTTP client: {}", e)))?;

        Ok(Self { config, client })
    }

    fn delete_url(&self) -> String {
        let base = self.config.api_base_url.trim_end_matches('/');
        if self.config.project_id.is_empty() {
            format!("{}/v1/accounts:delete", base)
        } else {
            format!("{}/v1/projects/{}/accounts:delete", base, self.config.project_id)
        }
    }
}

#[async_trait]
impl AccountDeletion for IdentityToolkitAccounts {
    async fn delete_auth_identity(&self, user_id: &str) -> Result<()> {
        let response = self
            .client
            .post(self.delete_url())
            .bearer_auth(&self.config.access_token)
            .json(&DeleteAccountRequest { local_id: user_id })
            .send()
            .await
            .map_err(|e| PlatformError::store_unavailable(format!("Auth provider: {}", e)))?;

        let status = response.status();
        if status.is_success() {
            info!(user_id = %user_id, "Auth identity deleted");
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        let code = auth_error_code(&body);
        if status == StatusCode::BAD_REQUEST && code.as_deref() == Some(USER_NOT_FOUND) {
            debug!(user_id = %user_id, "Auth identity already absent");
            return Ok(());
        }

        warn!(
            user_id = %user_id,
            status = %status,
            code = code.as_deref().unwrap_or("unknown"),
            "Auth identity deletion failed"
        );
        Err(PlatformError::store_unavailable(format!("Auth provider returned HTTP {}", status)))
    }
}
