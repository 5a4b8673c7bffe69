//! User Record Entity
//!
//! One document per user identifier, created at registration.

use idv_common::UserClaim;
use serde::{Deserialize, Serialize};

/// Stored user document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    /// Opaque user identifier, shared with the auth provider
    #[serde(rename = "_id")]
    pub id: String,

    #[serde(flatten)]
    pub claim: UserClaim,

    /// Set only by a successful reconciliation
    #[serde(rename = "isVerified", default)]
    pub is_verified: bool,
}

impl UserRecord {
    pub fn new(id: impl Into<String>, claim: UserClaim) -> Self {
        Self {
            id: id.into(),
            claim,
            is_verified: false,
        }
    }
}
