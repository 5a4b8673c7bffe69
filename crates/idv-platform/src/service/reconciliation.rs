//! Reconciliation Engine
//!
//! Compares a stored claim with a verified document and decides the trust
//! outcome under the configured policy. Pure: the caller applies the
//! outcome.

use chrono::NaiveDate;
use idv_common::{
    CorrectedFields, ReconciliationOutcome, ReconciliationPolicy, UserClaim, VerifiedDocument,
};

use crate::domain::{compute_age, FieldNormalizer};
use crate::error::Result;

/// Normalized stored and verified values for one field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldPair {
    pub stored: String,
    pub verified: String,
}

impl FieldPair {
    pub fn matches(&self) -> bool {
        self.stored == self.verified
    }
}

/// Field-by-field comparison of a claim against a document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldComparison {
    pub last_name: FieldPair,
    pub first_name: FieldPair,
    pub age: FieldPair,
    /// Age computed from the document's date of birth
    pub document_age: u32,
}

impl FieldComparison {
    pub fn all_match(&self) -> bool {
        self.last_name.matches() && self.first_name.matches() && self.age.matches()
    }

    pub fn mismatch_count(&self) -> usize {
        [&self.last_name, &self.first_name, &self.age]
            .iter()
            .filter(|pair| !pair.matches())
            .count()
    }
}

#[derive(Debug, Clone)]
pub struct ReconciliationEngine {
    policy: ReconciliationPolicy,
    normalizer: FieldNormalizer,
}

impl ReconciliationEngine {
    pub fn new(policy: ReconciliationPolicy, normalizer: FieldNormalizer) -> Self {
        Self { policy, normalizer }
    }

    pub fn policy(&self) -> ReconciliationPolicy {
        self.policy
    }

    /// Normalize both sides and compute the document age as of `reference`.
    ///
    /// Absent document names normalize to "" and therefore match an empty
    /// stored field.
    pub fn compare(
        &self,
        claim: &UserClaim,
        document: &VerifiedDocument,
        reference: NaiveDate,
    ) -> Result<FieldComparison> {
        let document_age = compute_age(&document.date_of_birth, reference)?;

        Ok(FieldComparison {
            last_name: FieldPair {
                stored: FieldNormalizer::normalize(&claim.last_name),
                verified: FieldNormalizer::normalize_optional(document.last_name.as_deref()),
            },
            first_name: FieldPair {
                stored: FieldNormalizer::normalize(&claim.first_name),
                verified: FieldNormalizer::normalize_optional(document.first_name.as_deref()),
            },
            age: FieldPair {
                stored: self.normalizer.normalize_age_label(&claim.age_label),
                verified: self.normalizer.normalize_age_label(&document_age.to_string()),
            },
            document_age,
        })
    }

    pub fn reconcile(
        &self,
        claim: &UserClaim,
        document: &VerifiedDocument,
        reference: NaiveDate,
    ) -> Result<ReconciliationOutcome> {
        let comparison = self.compare(claim, document, reference)?;
        Ok(self.decide(&comparison))
    }

    /// Apply the policy to a comparison
    pub fn decide(&self, comparison: &FieldComparison) -> ReconciliationOutcome {
        match self.policy {
            ReconciliationPolicy::Strict => {
                if comparison.all_match() {
                    ReconciliationOutcome::VerifiedUnchanged
                } else {
                    ReconciliationOutcome::RejectedDeleted
                }
            }
            ReconciliationPolicy::Lenient => {
                ReconciliationOutcome::VerifiedCorrected(self.corrections(comparison))
            }
        }
    }

    fn corrections(&self, comparison: &FieldComparison) -> CorrectedFields {
        let mut corrections = CorrectedFields::default();
        if !comparison.last_name.matches() {
            corrections.last_name = Some(comparison.last_name.verified.clone());
        }
        if !comparison.first_name.matches() {
            corrections.first_name = Some(comparison.first_name.verified.clone());
        }
        if !comparison.age.matches() {
            corrections.age_label = Some(self.normalizer.render_age(comparison.document_age));
        }
        corrections
    }
}
