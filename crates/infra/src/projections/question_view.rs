//! Per-request question page projection.
//!
//! Nothing here is stored: the aggregate is recomputed on every call from a
//! single store snapshot, so `like_count` and `liked_by_current_user` can never
//! disagree with each other.

use serde::Serialize;
use thiserror::Error;
use tracing::instrument;

use agora_auth::{is_owner, Identity};
use agora_core::QuestionId;

use crate::store::{ResourceStore, StoreError};

// ─────────────────────────────────────────────────────────────────────────────
// Read Model
// ─────────────────────────────────────────────────────────────────────────────

/// What the question page shows about likes and edit rights for one viewer.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
pub struct QuestionAggregate {
    pub like_count: u64,
    pub liked_by_current_user: bool,
    pub editable_by_current_user: bool,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ViewError {
    #[error("question {0} not found")]
    NoSuchQuestion(QuestionId),

    #[error(transparent)]
    Store(#[from] StoreError),
}

// ─────────────────────────────────────────────────────────────────────────────
// Projection
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct QuestionView<S> {
    store: S,
}

impl<S> QuestionView<S>
where
    S: ResourceStore,
{
    pub fn new(store: S) -> Self {
        Self { store }
    }

    #[instrument(skip(self, caller), fields(question_id = %question_id, user_id = %caller.user_id()), err)]
    pub async fn compose(&self, question_id: QuestionId, caller: &Identity) -> Result<QuestionAggregate, ViewError> {
        let snapshot = self
            .store
            .question_snapshot(question_id, caller.user_id())
            .await?
            .ok_or(ViewError::NoSuchQuestion(question_id))?;

        Ok(QuestionAggregate {
            like_count: snapshot.like_count,
            liked_by_current_user: snapshot.liked_by_viewer,
            editable_by_current_user: is_owner(caller, snapshot.owner),
        })
    }
}
