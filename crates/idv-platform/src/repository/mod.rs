//! Repository Layer
//!
//! User store port and its MongoDB implementation.

pub mod user;

use async_trait::async_trait;
use idv_common::{CorrectedFields, UserClaim};

use crate::error::Result;

pub use user::MongoUserRepository;

/// Document store holding one claim per user identifier.
///
/// Every failure surfaces as `PlatformError::StoreUnavailable`. Each call
/// is atomic at the single-record level.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn get(&self, user_id: &str) -> Result<Option<UserClaim>>;

    /// Set `isVerified` and apply corrections in one write
    async fn mark_verified(&self, user_id: &str, corrections: &CorrectedFields) -> Result<()>;

    /// Remove the record. Deleting an absent record succeeds.
    async fn delete(&self, user_id: &str) -> Result<()>;
}
