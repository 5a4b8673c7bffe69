//! User Repository

use async_trait::async_trait;
use mongodb::{bson::{doc, Document}, Collection, Database};
use tracing::debug;

use idv_common::{CorrectedFields, UserClaim};

use crate::domain::UserRecord;
use crate::error::{PlatformError, Result};
use crate::repository::UserStore;

pub struct MongoUserRepository {
    collection: Collection<UserRecord>,
}

impl MongoUserRepository {
    pub fn new(db: &Database, collection_name: &str) -> Self {
        Self {
            collection: db.collection(collection_name),
        }
    }

    pub async fn find_by_id(&self, id: &str) -> Result<Option<UserRecord>> {
        Ok(self.collection.find_one(doc! { "_id": id }).await?)
    }
}

/// `$set` document for a verification write
pub(crate) fn verification_update(corrections: &CorrectedFields) -> Document {
    let mut set = doc! { "isVerified": true };
    if let Some(ref last_name) = corrections.last_name {
        set.insert("nom", last_name.as_str());
    }
    if let Some(ref first_name) = corrections.first_name {
        set.insert("prenom", first_name.as_str());
    }
    if let Some(ref age_label) = corrections.age_label {
        set.insert("age", age_label.as_str());
    }
    doc! { "$set": set }
}

#[async_trait]
impl UserStore for MongoUserRepository {
    async fn get(&self, user_id: &str) -> Result<Option<UserClaim>> {
        Ok(self.find_by_id(user_id).await?.map(|record| record.claim))
    }

    async fn mark_verified(&self, user_id: &str, corrections: &CorrectedFields) -> Result<()> {
        let result = self
            .collection
            .update_one(doc! { "_id": user_id }, verification_update(corrections))
            .await?;
        if result.matched_count == 0 {
            return Err(PlatformError::user_not_found(user_id));
        }
        debug!(user_id = %user_id, modified = result.modified_count, "User marked verified");
        Ok(())
    }

    async fn delete(&self, user_id: &str) -> Result<()> {
        let result = self.collection.delete_one(doc! { "_id": user_id }).await?;
        if result.deleted_count == 0 {
            debug!(user_id = %user_id, "User record already absent");
        }
        Ok(())
    }
}
