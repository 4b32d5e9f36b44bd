use chrono::{DateTime, Utc};
use serde::Serialize;

use agora_core::{QuestionId, UserId};

use crate::Body;

/// A question as stored. `user_id` is the owner, fixed at creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Question {
    pub id: QuestionId,
    pub body: String,
    pub user_id: UserId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewQuestion {
    pub body: Body,
    pub user_id: UserId,
}

/// A question with its live like count (for "most liked" listings).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuestionSummary {
    #[serde(flatten)]
    pub question: Question,
    pub like_count: u64,
}
