use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

pub mod logging;

pub use logging::{init_logging, LogFormat};

/// Event type emitted by the provider once a session has been verified.
pub const VERIFIED_SESSION_EVENT: &str = "identity.verification_session.verified";

/// Metadata key carrying the user identifier on a verification session
pub const USER_ID_METADATA_KEY: &str = "user_id";

// ============================================================================
// User Claims
// ============================================================================

/// Self-reported identity record as stored at registration.
///
/// Field names on the wire are the legacy document-store names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserClaim {
    #[serde(rename = "nom", default)]
    pub last_name: String,
    #[serde(rename = "prenom", default)]
    pub first_name: String,
    /// Rendered age phrase such as "30 ans"
    #[serde(rename = "age", default)]
    pub age_label: String,
}

impl UserClaim {
    pub fn new(
        last_name: impl Into<String>,
        first_name: impl Into<String>,
        age_label: impl Into<String>,
    ) -> Self {
        Self {
            last_name: last_name.into(),
            first_name: first_name.into(),
            age_label: age_label.into(),
        }
    }

    /// Returns a copy with the given corrections applied
    pub fn with_corrections(&self, corrections: &CorrectedFields) -> Self {
        let mut claim = self.clone();
        if let Some(ref last_name) = corrections.last_name {
            claim.last_name = last_name.clone();
        }
        if let Some(ref first_name) = corrections.first_name {
            claim.first_name = first_name.clone();
        }
        if let Some(ref age_label) = corrections.age_label {
            claim.age_label = age_label.clone();
        }
        claim
    }
}

// ============================================================================
// Verified Documents
// ============================================================================

/// Date of birth as extracted by the provider. Any part may be missing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateOfBirth {
    pub year: Option<i32>,
    pub month: Option<u32>,
    pub day: Option<u32>,
}

impl DateOfBirth {
    pub fn new(year: i32, month: u32, day: u32) -> Self {
        Self {
            year: Some(year),
            month: Some(month),
            day: Some(day),
        }
    }
}

/// Provider-attested identity facts for one completed session
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifiedDocument {
    pub last_name: Option<String>,
    pub first_name: Option<String>,
    #[serde(default)]
    pub date_of_birth: DateOfBirth,
}

// ============================================================================
// Verification Events
// ============================================================================

/// An authenticated provider notification about a verification session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationEvent {
    pub id: String,
    pub event_type: String,
    pub session_id: String,
    pub metadata: HashMap<String, String>,
}

impl VerificationEvent {
    /// Only verified sessions trigger reconciliation
    pub fn is_verified_session(&self) -> bool {
        self.event_type == VERIFIED_SESSION_EVENT
    }

    pub fn user_id(&self) -> Option<&str> {
        self.metadata
            .get(USER_ID_METADATA_KEY)
            .map(String::as_str)
            .filter(|id| !id.is_empty())
    }
}

// ============================================================================
// Reconciliation Types
// ============================================================================

/// Stored fields rewritten from the verified document
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorrectedFields {
    #[serde(rename = "nom", skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(rename = "prenom", skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(rename = "age", skip_serializing_if = "Option::is_none")]
    pub age_label: Option<String>,
}

impl CorrectedFields {
    pub fn is_empty(&self) -> bool {
        self.last_name.is_none() && self.first_name.is_none() && self.age_label.is_none()
    }

    pub fn len(&self) -> usize {
        [&self.last_name, &self.first_name, &self.age_label]
            .iter()
            .filter(|f| f.is_some())
            .count()
    }
}

/// Terminal decision for one reconciliation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "corrections", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReconciliationOutcome {
    /// Every field matched; the record is marked verified as is
    VerifiedUnchanged,
    /// The record is marked verified after the listed fields are rewritten
    VerifiedCorrected(CorrectedFields),
    /// The record and its auth identity are purged
    RejectedDeleted,
}

impl ReconciliationOutcome {
    /// Stable label used for logs and metrics
    pub fn label(&self) -> &'static str {
        match self {
            ReconciliationOutcome::VerifiedUnchanged => "verified_unchanged",
            ReconciliationOutcome::VerifiedCorrected(_) => "verified_corrected",
            ReconciliationOutcome::RejectedDeleted => "rejected_deleted",
        }
    }

    pub fn is_verified(&self) -> bool {
        !matches!(self, ReconciliationOutcome::RejectedDeleted)
    }
}

/// How mismatches between a claim and a document are handled
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReconciliationPolicy {
    /// Any mismatch rejects the user and deletes the account
    Strict,
    /// Mismatched fields are overwritten from the document
    #[default]
    Lenient,
}

impl fmt::Display for ReconciliationPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReconciliationPolicy::Strict => write!(f, "strict"),
            ReconciliationPolicy::Lenient => write!(f, "lenient"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("Unknown reconciliation policy: {0}")]
pub struct ParsePolicyError(pub String);

impl FromStr for ReconciliationPolicy {
    type Err = ParsePolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "strict" => Ok(ReconciliationPolicy::Strict),
            "lenient" => Ok(ReconciliationPolicy::Lenient),
            other => Err(ParsePolicyError(other.to_string())),
        }
    }
}
