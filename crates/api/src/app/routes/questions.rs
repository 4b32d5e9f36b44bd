use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

use agora_auth::ResourceRef;
use agora_core::QuestionId;
use agora_forum::{Body, NewQuestion};
use agora_infra::{AnswerStore, QuestionStore};

use crate::app::dto::{BodyRequest, LimitQuery, PageQuery, QuestionPageResponse};
use crate::app::errors::ApiError;
use crate::app::services::AppServices;
use crate::authz::require_owner;
use crate::context::IdentityContext;

const DEFAULT_TOP_LIMIT: u32 = 5;

pub fn router() -> Router {
    Router::new()
        .route("/questions", post(create_question))
        .route(
            "/questions/:id",
            get(get_question).put(update_question).delete(delete_question),
        )
        .route("/questions/:id/like", post(like_question).delete(unlike_question))
}

pub async fn create_question(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(caller): Extension<IdentityContext>,
    Json(body): Json<BodyRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let question = services
        .store
        .insert_question(NewQuestion {
            body: Body::parse(&body.body)?,
            user_id: caller.user_id(),
        })
        .await?;

    tracing::info!(question_id = %question.id, user_id = %caller.user_id(), "question created");
    Ok((StatusCode::CREATED, Json(question)))
}

pub async fn list_questions(
    Extension(services): Extension<Arc<AppServices>>,
    Query(query): Query<PageQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let questions = services.store.list_questions(query.into_page()).await?;
    Ok(Json(questions))
}

pub async fn top_questions(
    Extension(services): Extension<Arc<AppServices>>,
    Query(query): Query<LimitQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let top = services
        .store
        .most_liked_questions(query.resolve(DEFAULT_TOP_LIMIT))
        .await?;
    Ok(Json(top))
}

/// The question page for the calling user.
pub async fn get_question(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(caller): Extension<IdentityContext>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let id: QuestionId = id.parse()?;

    let aggregate = services.view.compose(id, caller.identity()).await?;
    let Some(question) = services.store.find_question(id).await? else {
        return Err(ApiError::not_found(format!("question {id}")));
    };
    let answers = services.store.answers_for_question(id).await?;

    Ok(Json(QuestionPageResponse {
        question,
        answers,
        aggregate,
    }))
}

pub async fn update_question(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(caller): Extension<IdentityContext>,
    Path(id): Path<String>,
    Json(body): Json<BodyRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let id: QuestionId = id.parse()?;
    require_owner(&services, &caller, ResourceRef::Question(id)).await?;

    let body = Body::parse(&body.body)?;
    match services.store.update_question_body(id, body).await? {
        Some(question) => Ok(Json(question)),
        None => Err(ApiError::not_found(format!("question {id}"))),
    }
}

pub async fn delete_question(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(caller): Extension<IdentityContext>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id: QuestionId = id.parse()?;
    require_owner(&services, &caller, ResourceRef::Question(id)).await?;

    if !services.store.delete_question(id).await? {
        return Err(ApiError::not_found(format!("question {id}")));
    }
    tracing::info!(question_id = %id, "question deleted");
    Ok(StatusCode::NO_CONTENT)
}

pub async fn like_question(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(caller): Extension<IdentityContext>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id: QuestionId = id.parse()?;
    services.likes.add_like(id, caller.user_id()).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn unlike_question(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(caller): Extension<IdentityContext>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id: QuestionId = id.parse()?;
    services.likes.remove_like(id, caller.user_id()).await?;
    Ok(StatusCode::NO_CONTENT)
}
