//! Service Layer
//!
//! Signature verification, reconciliation and the event processor that
//! drives them against the store and provider ports.

pub mod locks;
pub mod processor;
pub mod reconciliation;
pub mod signature;

pub use locks::{UserLockGuard, UserLocks};
pub use processor::{ProcessingReport, ProcessorTimeouts, VerificationEventProcessor};
pub use reconciliation::{FieldComparison, FieldPair, ReconciliationEngine};
pub use signature::{SignatureVerifier, SIGNATURE_HEADER};
