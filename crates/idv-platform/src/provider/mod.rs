//! Identity Provider
//!
//! Port to the provider that hosts verification sessions and attests
//! document fields, plus its REST client.

pub mod stripe;

use async_trait::async_trait;
use idv_common::VerifiedDocument;
use serde::Serialize;

use crate::error::Result;

pub use stripe::{StripeClientConfig, StripeIdentityClient};

/// Hosted verification session handed back to the user
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerificationSessionLink {
    pub session_id: String,
    pub url: String,
}

/// Every failure surfaces as `PlatformError::ProviderUnavailable`
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Create a document verification session tagged with `user_id`
    async fn create_verification_session(&self, user_id: &str) -> Result<VerificationSessionLink>;

    /// Fetch the attested document fields of a session
    async fn fetch_verified_document(&self, session_id: &str) -> Result<VerifiedDocument>;
}
