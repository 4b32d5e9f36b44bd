//! The like relation between users and questions.
//!
//! A like is set membership on `(question_id, user_id)`: liking twice leaves
//! one relation, unliking something never liked is a no-op. The uniqueness
//! rule lives in the store (primary key / locked `HashSet`), so `add_like`
//! never checks before inserting.

use tracing::{debug, instrument};

use agora_core::{QuestionId, UserId};

use crate::store::{ResourceStore, StoreError};

#[derive(Debug, Clone)]
pub struct LikeLedger<S> {
    store: S,
}

impl<S> LikeLedger<S>
where
    S: ResourceStore,
{
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Ensure `user_id` likes `question_id`.
    ///
    /// Fails with `StoreError::NotFound` when the question or the user does not exist.
    #[instrument(skip(self), fields(question_id = %question_id, user_id = %user_id), err)]
    pub async fn add_like(&self, question_id: QuestionId, user_id: UserId) -> Result<(), StoreError> {
        match self.store.insert_like(question_id, user_id).await {
            Ok(created) => {
                debug!(created, "like recorded");
                Ok(())
            }
            // A concurrent insert of the same pair won the race.
            Err(StoreError::UniqueViolation(_)) => {
                debug!("like already present");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Ensure `user_id` does not like `question_id`.
    #[instrument(skip(self), fields(question_id = %question_id, user_id = %user_id), err)]
    pub async fn remove_like(&self, question_id: QuestionId, user_id: UserId) -> Result<(), StoreError> {
        let removed = self.store.delete_like(question_id, user_id).await?;
        debug!(removed, "like cleared");
        Ok(())
    }

    pub async fn count_likes(&self, question_id: QuestionId) -> Result<u64, StoreError> {
        self.store.count_likes_for(question_id).await
    }

    pub async fn is_liked_by(&self, question_id: QuestionId, user_id: UserId) -> Result<bool, StoreError> {
        self.store.like_exists(question_id, user_id).await
    }
}
