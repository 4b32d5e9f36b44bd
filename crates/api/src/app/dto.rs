use serde::{Deserialize, Serialize};

use agora_core::{Page, SortOrder};
use agora_forum::{Answer, Question, User};
use agora_infra::QuestionAggregate;

// -------------------------
// Request DTOs
// -------------------------

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Every field is optional; an absent field is left unchanged.
#[derive(Default, Deserialize)]
#[serde(default)]
pub struct UpdateProfileRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct BodyRequest {
    pub body: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub limit: Option<u32>,
    pub page: Option<u32>,
    pub sort: Option<SortOrder>,
}

impl PageQuery {
    pub fn into_page(self) -> Page {
        Page::new(self.limit, self.page, self.sort)
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct LimitQuery {
    pub limit: Option<u32>,
}

impl LimitQuery {
    /// Missing or zero means `default`; never more than `Page::MAX_LIMIT`.
    pub fn resolve(&self, default: u32) -> u32 {
        match self.limit {
            Some(0) | None => default,
            Some(l) => l.min(Page::MAX_LIMIT),
        }
    }
}

// -------------------------
// Response DTOs
// -------------------------

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub user: User,
    pub token: String,
}

/// The question page: the question, its answers, and the viewer's aggregate.
#[derive(Debug, Serialize)]
pub struct QuestionPageResponse {
    pub question: Question,
    pub answers: Vec<Answer>,
    #[serde(flatten)]
    pub aggregate: QuestionAggregate,
}
