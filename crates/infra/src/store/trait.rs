use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;

use agora_auth::{OwnershipResolver, ResourceRef};
use agora_core::{AnswerId, Page, QuestionId, UserId};
use agora_forum::{
    Answer, AnswerCount, Body, Email, NewAnswer, NewQuestion, NewUser, Question, QuestionSummary, User,
    UserUpdate,
};

/// Store operation error.
///
/// These are **infrastructure errors**; "record absent" on a lookup is not an
/// error and is reported as `Ok(None)` / `Ok(false)` instead.
///
/// ## Error Categories
///
/// - **Unavailable**: the backing store could not be reached or failed mid-call
/// - **UniqueViolation**: a uniqueness constraint rejected a write
/// - **NotFound**: a write referenced a record that does not exist
/// - **Corrupt**: a stored row could not be decoded
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("unique constraint violated: {0}")]
    UniqueViolation(String),

    #[error("referenced record not found: {0}")]
    NotFound(String),

    #[error("corrupt record: {0}")]
    Corrupt(String),
}

/// Ownership and like state of one question, read from a single snapshot.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
pub struct QuestionSnapshot {
    pub owner: UserId,
    pub like_count: u64,
    pub liked_by_viewer: bool,
}

/// Ownership lookups and the like relation.
///
/// ## Implementation Requirements
///
/// - `insert_like` must be atomic with respect to the `(question_id, user_id)`
///   uniqueness rule: the store, not the caller, decides whether a row was
///   created. An existing pair yields `Ok(false)`.
/// - `question_snapshot` must read owner, count and viewer status from one
///   consistent view of the data.
#[async_trait]
pub trait ResourceStore: Send + Sync {
    async fn get_owner(&self, resource: ResourceRef) -> Result<Option<UserId>, StoreError>;

    async fn like_exists(&self, question_id: QuestionId, user_id: UserId) -> Result<bool, StoreError>;

    /// `Ok(true)` if a relation was created, `Ok(false)` if it already existed.
    async fn insert_like(&self, question_id: QuestionId, user_id: UserId) -> Result<bool, StoreError>;

    /// `Ok(true)` if a relation was removed, `Ok(false)` if there was none.
    async fn delete_like(&self, question_id: QuestionId, user_id: UserId) -> Result<bool, StoreError>;

    async fn count_likes_for(&self, question_id: QuestionId) -> Result<u64, StoreError>;

    /// `Ok(None)` if the question does not exist.
    async fn question_snapshot(
        &self,
        question_id: QuestionId,
        viewer: UserId,
    ) -> Result<Option<QuestionSnapshot>, StoreError>;
}

#[async_trait]
pub trait UserStore: Send + Sync {
    /// Fails with `UniqueViolation` when the e-mail is already registered.
    async fn create_user(&self, user: NewUser) -> Result<User, StoreError>;

    async fn find_user(&self, id: UserId) -> Result<Option<User>, StoreError>;

    async fn find_user_by_email(&self, email: &Email) -> Result<Option<User>, StoreError>;

    /// Apply the present fields of `update`. `Ok(None)` if the user does not exist;
    /// `UniqueViolation` when the new e-mail belongs to another user.
    async fn update_user(&self, id: UserId, update: UserUpdate) -> Result<Option<User>, StoreError>;

    /// Users with at least one answer, most answers first.
    async fn top_answerers(&self, limit: u32) -> Result<Vec<AnswerCount>, StoreError>;
}

#[async_trait]
pub trait QuestionStore: Send + Sync {
    async fn insert_question(&self, question: NewQuestion) -> Result<Question, StoreError>;

    async fn find_question(&self, id: QuestionId) -> Result<Option<Question>, StoreError>;

    async fn update_question_body(&self, id: QuestionId, body: Body) -> Result<Option<Question>, StoreError>;

    /// Deleting a question also deletes its answers and likes.
    async fn delete_question(&self, id: QuestionId) -> Result<bool, StoreError>;

    async fn list_questions(&self, page: Page) -> Result<Vec<Question>, StoreError>;

    async fn questions_by_user(&self, user_id: UserId, page: Page) -> Result<Vec<Question>, StoreError>;

    /// Most-liked questions first, counts computed from the like relation.
    async fn most_liked_questions(&self, limit: u32) -> Result<Vec<QuestionSummary>, StoreError>;
}

#[async_trait]
pub trait AnswerStore: Send + Sync {
    /// Fails with `NotFound` when the question does not exist.
    async fn insert_answer(&self, answer: NewAnswer) -> Result<Answer, StoreError>;

    async fn find_answer(&self, id: AnswerId) -> Result<Option<Answer>, StoreError>;

    async fn update_answer_body(&self, id: AnswerId, body: Body) -> Result<Option<Answer>, StoreError>;

    async fn delete_answer(&self, id: AnswerId) -> Result<bool, StoreError>;

    async fn list_answers(&self, page: Page) -> Result<Vec<Answer>, StoreError>;

    /// Oldest first.
    async fn answers_for_question(&self, question_id: QuestionId) -> Result<Vec<Answer>, StoreError>;
}

/// Everything the HTTP layer needs from one backing store.
pub trait ForumStore: ResourceStore + UserStore + QuestionStore + AnswerStore {}

impl<T> ForumStore for T where T: ResourceStore + UserStore + QuestionStore + AnswerStore + ?Sized {}

#[async_trait]
impl<S> ResourceStore for Arc<S>
where
    S: ResourceStore + ?Sized,
{
    async fn get_owner(&self, resource: ResourceRef) -> Result<Option<UserId>, StoreError> {
        (**self).get_owner(resource).await
    }

    async fn like_exists(&self, question_id: QuestionId, user_id: UserId) -> Result<bool, StoreError> {
        (**self).like_exists(question_id, user_id).await
    }

    async fn insert_like(&self, question_id: QuestionId, user_id: UserId) -> Result<bool, StoreError> {
        (**self).insert_like(question_id, user_id).await
    }

    async fn delete_like(&self, question_id: QuestionId, user_id: UserId) -> Result<bool, StoreError> {
        (**self).delete_like(question_id, user_id).await
    }

    async fn count_likes_for(&self, question_id: QuestionId) -> Result<u64, StoreError> {
        (**self).count_likes_for(question_id).await
    }

    async fn question_snapshot(
        &self,
        question_id: QuestionId,
        viewer: UserId,
    ) -> Result<Option<QuestionSnapshot>, StoreError> {
        (**self).question_snapshot(question_id, viewer).await
    }
}

/// Adapter exposing a [`ResourceStore`] as the authorization layer's ownership source.
#[derive(Debug, Clone)]
pub struct StoreOwnership<S>(pub S);

#[async_trait]
impl<S> OwnershipResolver for StoreOwnership<S>
where
    S: ResourceStore,
{
    type Error = StoreError;

    async fn resolve_owner(&self, resource: ResourceRef) -> Result<Option<UserId>, StoreError> {
        self.0.get_owner(resource).await
    }
}
