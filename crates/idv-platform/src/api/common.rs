//! Common API types

use idv_common::{CorrectedFields, ReconciliationOutcome};
use serde::{Deserialize, Serialize};

use crate::service::ProcessingReport;

/// Client-facing code attached to a rejection acknowledgement
pub const IDENTITY_MISMATCH: &str = "IDENTITY_MISMATCH";

/// Standard API error response
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    pub error: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// Acknowledgement returned for every accepted delivery
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookAck {
    pub received: bool,
    pub event_id: String,
    pub event_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    /// Outcome label, null for event types that are not acted upon
    pub outcome: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub corrections: Option<CorrectedFields>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl From<ProcessingReport> for WebhookAck {
    fn from(report: ProcessingReport) -> Self {
        let (corrections, code) = match &report.outcome {
            Some(ReconciliationOutcome::VerifiedCorrected(c)) => (Some(c.clone()), None),
            Some(ReconciliationOutcome::RejectedDeleted) => (None, Some(IDENTITY_MISMATCH.to_string())),
            _ => (None, None),
        };

        Self {
            received: true,
            event_id: report.event_id,
            event_type: report.event_type,
            user_id: report.user_id,
            outcome: report.outcome.as_ref().map(|o| o.label().to_uppercase()),
            corrections,
            code,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(outcome: Option<ReconciliationOutcome>) -> ProcessingReport {
        ProcessingReport {
            event_id: "evt_1".to_string(),
            event_type: idv_common::VERIFIED_SESSION_EVENT.to_string(),
            session_id: "vs_1".to_string(),
            user_id: Some("user-1".to_string()),
            outcome,
        }
    }

    #[test]
    fn test_rejection_ack_carries_code() {
        let ack = WebhookAck::from(report(Some(ReconciliationOutcome::RejectedDeleted)));
        let json = serde_json::to_value(&ack).unwrap();
        assert_eq!(json["outcome"], "REJECTED_DELETED");
        assert_eq!(json["code"], IDENTITY_MISMATCH);
        assert!(json.get("corrections").is_none());
    }

    #[test]
    fn test_corrected_ack_lists_fields() {
        let corrections = CorrectedFields {
            last_name: Some("martin".to_string()),
            ..Default::default()
        };
        let ack = WebhookAck::from(report(Some(ReconciliationOutcome::VerifiedCorrected(corrections))));
        let json = serde_json::to_value(&ack).unwrap();
        assert_eq!(json["outcome"], "VERIFIED_CORRECTED");
        assert_eq!(json["corrections"], serde_json::json!({ "nom": "martin" }));
        assert!(json.get("code").is_none());
    }

    #[test]
    fn test_ignored_event_has_null_outcome() {
        let ack = WebhookAck::from(ProcessingReport { user_id: None, ..report(None) });
        let json = serde_json::to_value(&ack).unwrap();
        assert!(json["outcome"].is_null());
        assert_eq!(json["received"], true);
        assert_eq!(json["eventId"], "evt_1");
    }
}
