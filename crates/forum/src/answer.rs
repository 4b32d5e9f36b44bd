use chrono::{DateTime, Utc};
use serde::Serialize;

use agora_core::{AnswerId, QuestionId, UserId};

use crate::Body;

/// An answer as stored. `user_id` is the owner, fixed at creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Answer {
    pub id: AnswerId,
    pub body: String,
    pub question_id: QuestionId,
    pub user_id: UserId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAnswer {
    pub body: Body,
    pub question_id: QuestionId,
    pub user_id: UserId,
}
