//! Verification Event Processor
//!
//! End-to-end handling of one webhook delivery: authenticate, filter,
//! fetch the stored claim and the verified document, reconcile and apply
//! the outcome.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use idv_common::{CorrectedFields, ReconciliationOutcome, VerificationEvent};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::accounts::AccountDeletion;
use crate::domain::Clock;
use crate::error::{PlatformError, Result};
use crate::provider::IdentityProvider;
use crate::repository::UserStore;
use crate::service::locks::UserLocks;
use crate::service::reconciliation::ReconciliationEngine;
use crate::service::signature::SignatureVerifier;

/// Upper bounds on outbound calls
#[derive(Debug, Clone, Copy)]
pub struct ProcessorTimeouts {
    pub provider: Duration,
    pub store: Duration,
}

impl Default for ProcessorTimeouts {
    fn default() -> Self {
        Self {
            provider: Duration::from_secs(10),
            store: Duration::from_secs(5),
        }
    }
}

/// Result of one accepted delivery
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingReport {
    pub event_id: String,
    pub event_type: String,
    pub session_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    /// `None` when the event type is not acted upon
    pub outcome: Option<ReconciliationOutcome>,
}

impl ProcessingReport {
    fn ignored(event: VerificationEvent) -> Self {
        Self {
            event_id: event.id,
            event_type: event.event_type,
            session_id: event.session_id,
            user_id: None,
            outcome: None,
        }
    }
}

pub struct VerificationEventProcessor {
    verifier: SignatureVerifier,
    engine: ReconciliationEngine,
    provider: Arc<dyn IdentityProvider>,
    store: Arc<dyn UserStore>,
    accounts: Arc<dyn AccountDeletion>,
    clock: Arc<dyn Clock>,
    locks: UserLocks,
    timeouts: ProcessorTimeouts,
}

impl VerificationEventProcessor {
    pub fn new(
        verifier: SignatureVerifier,
        engine: ReconciliationEngine,
        provider: Arc<dyn IdentityProvider>,
        store: Arc<dyn UserStore>,
        accounts: Arc<dyn AccountDeletion>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            verifier,
            engine,
            provider,
            store,
            accounts,
            clock,
            locks: UserLocks::new(),
            timeouts: ProcessorTimeouts::default(),
        }
    }

    pub fn with_timeouts(mut self, timeouts: ProcessorTimeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    pub fn engine(&self) -> &ReconciliationEngine {
        &self.engine
    }

    /// Handle one delivery given its raw body and signature header.
    ///
    /// Nothing is written unless the signature verifies, the user exists
    /// and the document is complete.
    pub async fn process(&self, payload: &[u8], signature: Option<&str>) -> Result<ProcessingReport> {
        let result = self.handle(payload, signature).await;
        if let Err(e) = &result {
            metrics::counter!("idv_webhook_failures_total", "kind" => e.kind()).increment(1);
            if e.is_retryable() {
                warn!(kind = e.kind(), error = %e, "Event processing failed, awaiting redelivery");
            } else {
                debug!(kind = e.kind(), error = %e, "Event rejected");
            }
        }
        result
    }

    async fn handle(&self, payload: &[u8], signature: Option<&str>) -> Result<ProcessingReport> {
        let event = self.verifier.verify(payload, signature)?;
        metrics::counter!("idv_webhook_events_total", "event_type" => event.event_type.clone())
            .increment(1);

        if !event.is_verified_session() {
            debug!(event_id = %event.id, event_type = %event.event_type, "Ignoring event type");
            return Ok(ProcessingReport::ignored(event));
        }

        let user_id = event
            .user_id()
            .ok_or_else(|| {
                PlatformError::invalid_event(format!(
                    "session {} carries no user_id metadata",
                    event.session_id
                ))
            })?
            .to_string();

        let _guard = self.locks.lock(&user_id).await;

        let claim = self
            .store_call(self.store.get(&user_id))
            .await?
            .ok_or_else(|| PlatformError::user_not_found(&user_id))?;

        let document = self
            .provider_call(self.provider.fetch_verified_document(&event.session_id))
            .await?;

        let outcome = self.engine.reconcile(&claim, &document, self.clock.today())?;
        self.apply(&user_id, &outcome).await?;

        metrics::counter!("idv_reconciliation_outcomes_total", "outcome" => outcome.label())
            .increment(1);
        info!(
            event_id = %event.id,
            session_id = %event.session_id,
            user_id = %user_id,
            policy = %self.engine.policy(),
            outcome = outcome.label(),
            "Verification reconciled"
        );

        Ok(ProcessingReport {
            event_id: event.id,
            event_type: event.event_type,
            session_id: event.session_id,
            user_id: Some(user_id),
            outcome: Some(outcome),
        })
    }

    async fn apply(&self, user_id: &str, outcome: &ReconciliationOutcome) -> Result<()> {
        match outcome {
            ReconciliationOutcome::VerifiedUnchanged => {
                self.store_call(self.store.mark_verified(user_id, &CorrectedFields::default()))
                    .await
            }
            ReconciliationOutcome::VerifiedCorrected(corrections) => {
                if !corrections.is_empty() {
                    debug!(user_id = %user_id, fields = corrections.len(), "Applying corrections");
                }
                self.store_call(self.store.mark_verified(user_id, corrections)).await
            }
            ReconciliationOutcome::RejectedDeleted => {
                // Auth identity first: a redelivery after a partial failure
                // still finds the record and finishes the purge.
                self.store_call(self.accounts.delete_auth_identity(user_id)).await?;
                self.store_call(self.store.delete(user_id)).await?;
                warn!(user_id = %user_id, "Identity mismatch, user purged");
                Ok(())
            }
        }
    }

    async fn store_call<T>(&self, call: impl Future<Output = Result<T>>) -> Result<T> {
        let limit = self.timeouts.store;
        tokio::time::timeout(limit, call).await.map_err(|_| {
            PlatformError::store_unavailable(format!("timed out after {}ms", limit.as_millis()))
        })?
    }

    async fn provider_call<T>(&self, call: impl Future<Output = Result<T>>) -> Result<T> {
        let limit = self.timeouts.provider;
        tokio::time::timeout(limit, call).await.map_err(|_| {
            PlatformError::provider_unavailable(format!("timed out after {}ms", limit.as_millis()))
        })?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use chrono::NaiveDate;
    use idv_common::{
        DateOfBirth, ReconciliationPolicy, UserClaim, VerifiedDocument, VERIFIED_SESSION_EVENT,
    };
    use parking_lot::Mutex;
    use tokio_test::{assert_err, assert_ok};

    use crate::domain::{FieldNormalizer, FixedClock};
    use crate::provider::VerificationSessionLink;

    const SECRET: &str = "whsec_processor";

    #[derive(Default)]
    struct FakeStore {
        users: Mutex<HashMap<String, UserClaim>>,
        verified: Mutex<Vec<(String, CorrectedFields)>>,
        deletes: AtomicUsize,
        get_delay: Duration,
    }

    #[async_trait]
    impl UserStore for FakeStore {
        async fn get(&self, user_id: &str) -> Result<Option<UserClaim>> {
            if !self.get_delay.is_zero() {
                tokio::time::sleep(self.get_delay).await;
            }
            Ok(self.users.lock().get(user_id).cloned())
        }

        async fn mark_verified(&self, user_id: &str, corrections: &CorrectedFields) -> Result<()> {
            let mut users = self.users.lock();
            let claim = users
                .get_mut(user_id)
                .ok_or_else(|| PlatformError::user_not_found(user_id))?;
            *claim = claim.with_corrections(corrections);
            self.verified.lock().push((user_id.to_string(), corrections.clone()));
            Ok(())
        }

        async fn delete(&self, user_id: &str) -> Result<()> {
            self.deletes.fetch_add(1, Ordering::SeqCst);
            self.users.lock().remove(user_id);
            Ok(())
        }
    }

    struct FakeProvider {
        document: VerifiedDocument,
        calls: AtomicUsize,
        delay: Duration,
    }

    #[async_trait]
    impl IdentityProvider for FakeProvider {
        async fn create_verification_session(&self, user_id: &str) -> Result<VerificationSessionLink> {
            Ok(VerificationSessionLink {
                session_id: format!("vs_{}", user_id),
                url: "https://verify.example/session".to_string(),
            })
        }

        async fn fetch_verified_document(&self, _session_id: &str) -> Result<VerifiedDocument> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            Ok(self.document.clone())
        }
    }

    #[derive(Default)]
    struct FakeAccounts {
        deleted: Mutex<Vec<String>>,
        fail: bool,
        delay: Duration,
    }

    #[async_trait]
    impl AccountDeletion for FakeAccounts {
        async fn delete_auth_identity(&self, user_id: &str) -> Result<()> {
            if self.fail {
                return Err(PlatformError::store_unavailable("auth backend down"));
            }
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.deleted.lock().push(user_id.to_string());
            Ok(())
        }
    }

    struct Harness {
        processor: VerificationEventProcessor,
        store: Arc<FakeStore>,
        provider: Arc<FakeProvider>,
        accounts: Arc<FakeAccounts>,
    }

    fn martin_document() -> VerifiedDocument {
        VerifiedDocument {
            last_name: Some("Martin".to_string()),
            first_name: Some("Jean".to_string()),
            date_of_birth: DateOfBirth::new(1994, 1, 10),
        }
    }

    fn harness(policy: ReconciliationPolicy, document: VerifiedDocument, accounts: FakeAccounts) -> Harness {
        let store = Arc::new(FakeStore::default());
        store
            .users
            .lock()
            .insert("user-1".to_string(), UserClaim::new("Dupont", "Jean", "30 ans"));
        let provider = Arc::new(FakeProvider {
            document,
            calls: AtomicUsize::new(0),
            delay: Duration::ZERO,
        });
        let accounts = Arc::new(accounts);
        let processor = VerificationEventProcessor::new(
            SignatureVerifier::new(SECRET, Duration::from_secs(300)),
            ReconciliationEngine::new(policy, FieldNormalizer::default()),
            provider.clone(),
            store.clone(),
            accounts.clone(),
            Arc::new(FixedClock(NaiveDate::from_ymd_opt(2024, 6, 15).unwrap())),
        );
        Harness { processor, store, provider, accounts }
    }

    fn event_body(event_type: &str, user_id: Option<&str>) -> Vec<u8> {
        let metadata = match user_id {
            Some(id) => serde_json::json!({ "user_id": id }),
            None => serde_json::json!({}),
        };
        serde_json::to_vec(&serde_json::json!({
            "id": "evt_1",
            "type": event_type,
            "data": { "object": { "id": "vs_1", "metadata": metadata } }
        }))
        .unwrap()
    }

    fn sign(body: &[u8]) -> String {
        SignatureVerifier::new(SECRET, Duration::from_secs(300))
            .sign(body, chrono::Utc::now().timestamp())
    }

    #[tokio::test]
    async fn test_lenient_corrects_and_is_idempotent() {
        let h = harness(ReconciliationPolicy::Lenient, martin_document(), FakeAccounts::default());
        let body = event_body(VERIFIED_SESSION_EVENT, Some("user-1"));
        let header = sign(&body);

        let report = assert_ok!(h.processor.process(&body, Some(&header)).await);
        assert_eq!(report.user_id.as_deref(), Some("user-1"));
        assert_eq!(
            report.outcome,
            Some(ReconciliationOutcome::VerifiedCorrected(CorrectedFields {
                last_name: Some("martin".to_string()),
                ..Default::default()
            }))
        );
        assert_eq!(h.store.users.lock()["user-1"].last_name, "martin");

        let again = assert_ok!(h.processor.process(&body, Some(&header)).await);
        assert_eq!(
            again.outcome,
            Some(ReconciliationOutcome::VerifiedCorrected(CorrectedFields::default()))
        );
        assert_eq!(h.store.verified.lock().len(), 2);
    }

    #[tokio::test]
    async fn test_strict_mismatch_purges_once() {
        let h = harness(ReconciliationPolicy::Strict, martin_document(), FakeAccounts::default());
        let body = event_body(VERIFIED_SESSION_EVENT, Some("user-1"));
        let header = sign(&body);

        let report = assert_ok!(h.processor.process(&body, Some(&header)).await);
        assert_eq!(report.outcome, Some(ReconciliationOutcome::RejectedDeleted));
        assert_eq!(h.store.deletes.load(Ordering::SeqCst), 1);
        assert_eq!(h.accounts.deleted.lock().as_slice(), ["user-1".to_string()]);
        assert!(h.store.verified.lock().is_empty());

        // Redelivery finds no record
        let err = assert_err!(h.processor.process(&body, Some(&header)).await);
        assert!(matches!(err, PlatformError::UserNotFound { .. }));
        assert_eq!(h.store.deletes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_auth_deletion_keeps_record() {
        let accounts = FakeAccounts { fail: true, ..Default::default() };
        let h = harness(ReconciliationPolicy::Strict, martin_document(), accounts);
        let body = event_body(VERIFIED_SESSION_EVENT, Some("user-1"));

        let err = assert_err!(h.processor.process(&body, Some(&sign(&body))).await);
        assert!(matches!(err, PlatformError::StoreUnavailable { .. }));
        assert!(err.is_retryable());
        assert!(h.store.users.lock().contains_key("user-1"));
        assert_eq!(h.store.deletes.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_strict_match_marks_verified() {
        let document = VerifiedDocument {
            last_name: Some("DUPONT".to_string()),
            ..martin_document()
        };
        let h = harness(ReconciliationPolicy::Strict, document, FakeAccounts::default());
        let body = event_body(VERIFIED_SESSION_EVENT, Some("user-1"));

        let report = assert_ok!(h.processor.process(&body, Some(&sign(&body))).await);
        assert_eq!(report.outcome, Some(ReconciliationOutcome::VerifiedUnchanged));
        assert_eq!(
            h.store.verified.lock().as_slice(),
            [("user-1".to_string(), CorrectedFields::default())]
        );
    }

    #[tokio::test]
    async fn test_bad_signature_touches_nothing() {
        let h = harness(ReconciliationPolicy::Strict, martin_document(), FakeAccounts::default());
        let body = event_body(VERIFIED_SESSION_EVENT, Some("user-1"));

        let err = assert_err!(h.processor.process(&body, Some("t=1,v1=00")).await);
        assert!(matches!(err, PlatformError::InvalidSignature { .. }));
        let err = assert_err!(h.processor.process(&body, None).await);
        assert!(matches!(err, PlatformError::InvalidSignature { .. }));
        assert_eq!(h.provider.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_other_event_types_are_acknowledged() {
        let h = harness(ReconciliationPolicy::Strict, martin_document(), FakeAccounts::default());
        let body = event_body("identity.verification_session.requires_input", Some("user-1"));

        let report = assert_ok!(h.processor.process(&body, Some(&sign(&body))).await);
        assert_eq!(report.outcome, None);
        assert_eq!(report.user_id, None);
        assert_eq!(h.provider.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_missing_user_id_is_invalid_event() {
        let h = harness(ReconciliationPolicy::Lenient, martin_document(), FakeAccounts::default());
        let body = event_body(VERIFIED_SESSION_EVENT, None);

        let err = assert_err!(h.processor.process(&body, Some(&sign(&body))).await);
        assert!(matches!(err, PlatformError::InvalidEvent { .. }));
    }

    #[tokio::test]
    async fn test_unknown_user_skips_provider_and_writes() {
        let h = harness(ReconciliationPolicy::Strict, martin_document(), FakeAccounts::default());
        let body = event_body(VERIFIED_SESSION_EVENT, Some("ghost"));

        let err = assert_err!(h.processor.process(&body, Some(&sign(&body))).await);
        assert!(matches!(err, PlatformError::UserNotFound { .. }));
        assert_eq!(h.provider.calls.load(Ordering::SeqCst), 0);
        assert_eq!(h.store.deletes.load(Ordering::SeqCst), 0);
        assert!(h.store.verified.lock().is_empty());
    }

    #[tokio::test]
    async fn test_incomplete_document_leaves_record_untouched() {
        let document = VerifiedDocument {
            date_of_birth: DateOfBirth { year: Some(1994), month: Some(1), day: None },
            ..martin_document()
        };
        for policy in [ReconciliationPolicy::Strict, ReconciliationPolicy::Lenient] {
            let h = harness(policy, document.clone(), FakeAccounts::default());
            let body = event_body(VERIFIED_SESSION_EVENT, Some("user-1"));

            let err = assert_err!(h.processor.process(&body, Some(&sign(&body))).await);
            assert!(matches!(err, PlatformError::IncompleteDocument { .. }));
            assert_eq!(h.store.users.lock()["user-1"], UserClaim::new("Dupont", "Jean", "30 ans"));
            assert!(h.store.verified.lock().is_empty());
            assert_eq!(h.store.deletes.load(Ordering::SeqCst), 0);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_provider_times_out() {
        let store = Arc::new(FakeStore::default());
        store
            .users
            .lock()
            .insert("user-1".to_string(), UserClaim::new("Dupont", "Jean", "30 ans"));
        let provider = Arc::new(FakeProvider {
            document: martin_document(),
            calls: AtomicUsize::new(0),
            delay: Duration::from_secs(60),
        });
        let processor = VerificationEventProcessor::new(
            SignatureVerifier::new(SECRET, Duration::from_secs(300)),
            ReconciliationEngine::new(ReconciliationPolicy::Lenient, FieldNormalizer::default()),
            provider,
            store.clone(),
            Arc::new(FakeAccounts::default()),
            Arc::new(FixedClock(NaiveDate::from_ymd_opt(2024, 6, 15).unwrap())),
        )
        .with_timeouts(ProcessorTimeouts {
            provider: Duration::from_secs(1),
            store: Duration::from_secs(1),
        });

        let body = event_body(VERIFIED_SESSION_EVENT, Some("user-1"));
        let err = assert_err!(processor.process(&body, Some(&sign(&body))).await);
        assert!(matches!(err, PlatformError::ProviderUnavailable { .. }));
        assert!(store.verified.lock().is_empty());
    }

    fn short_timeouts() -> ProcessorTimeouts {
        ProcessorTimeouts {
            provider: Duration::from_secs(1),
            store: Duration::from_secs(1),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_store_read_times_out() {
        let store = Arc::new(FakeStore {
            get_delay: Duration::from_secs(60),
            ..Default::default()
        });
        store
            .users
            .lock()
            .insert("user-1".to_string(), UserClaim::new("Dupont", "Jean", "30 ans"));
        let provider = Arc::new(FakeProvider {
            document: martin_document(),
            calls: AtomicUsize::new(0),
            delay: Duration::ZERO,
        });
        let accounts = Arc::new(FakeAccounts::default());
        let processor = VerificationEventProcessor::new(
            SignatureVerifier::new(SECRET, Duration::from_secs(300)),
            ReconciliationEngine::new(ReconciliationPolicy::Strict, FieldNormalizer::default()),
            provider.clone(),
            store.clone(),
            accounts.clone(),
            Arc::new(FixedClock(NaiveDate::from_ymd_opt(2024, 6, 15).unwrap())),
        )
        .with_timeouts(short_timeouts());

        let body = event_body(VERIFIED_SESSION_EVENT, Some("user-1"));
        let err = assert_err!(processor.process(&body, Some(&sign(&body))).await);

        assert!(matches!(err, PlatformError::StoreUnavailable { .. }));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
        assert!(store.verified.lock().is_empty());
        assert_eq!(store.deletes.load(Ordering::SeqCst), 0);
        assert!(accounts.deleted.lock().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_auth_deletion_times_out_before_record_delete() {
        let accounts = FakeAccounts {
            delay: Duration::from_secs(60),
            ..Default::default()
        };
        let h = harness(ReconciliationPolicy::Strict, martin_document(), accounts);
        let processor = h.processor.with_timeouts(short_timeouts());

        let body = event_body(VERIFIED_SESSION_EVENT, Some("user-1"));
        let err = assert_err!(processor.process(&body, Some(&sign(&body))).await);

        assert!(matches!(err, PlatformError::StoreUnavailable { .. }));
        assert!(err.is_retryable());
        assert_eq!(h.store.deletes.load(Ordering::SeqCst), 0);
        assert!(h.store.users.lock().contains_key("user-1"));
        assert!(h.store.verified.lock().is_empty());
        assert!(h.accounts.deleted.lock().is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_deliveries_apply_once_each() {
        let h = Arc::new(harness(ReconciliationPolicy::Lenient, martin_document(), FakeAccounts::default()));
        let body = event_body(VERIFIED_SESSION_EVENT, Some("user-1"));
        let header = sign(&body);

        let tasks: Vec<_> = (0..4)
            .map(|_| {
                let h = h.clone();
                let body = body.clone();
                let header = header.clone();
                tokio::spawn(async move { h.processor.process(&body, Some(&header)).await })
            })
            .collect();

        let mut corrected = 0;
        for task in tasks {
            let report = task.await.unwrap().unwrap();
            if let Some(ReconciliationOutcome::VerifiedCorrected(c)) = report.outcome {
                if !c.is_empty() {
                    corrected += 1;
                }
            }
        }
        // Serialized per user: only the first run sees the stale name
        assert_eq!(corrected, 1);
        assert_eq!(h.store.users.lock()["user-1"].last_name, "martin");
    }
}
