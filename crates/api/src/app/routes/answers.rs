use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

use agora_auth::ResourceRef;
use agora_core::{AnswerId, QuestionId};
use agora_forum::{Body, NewAnswer};
use agora_infra::AnswerStore;

use crate::app::dto::{BodyRequest, PageQuery};
use crate::app::errors::ApiError;
use crate::app::services::AppServices;
use crate::authz::require_owner;
use crate::context::IdentityContext;

pub fn router() -> Router {
    Router::new()
        .route("/answers", get(list_answers))
        .route("/questions/:id/answers", post(create_answer))
        .route(
            "/answers/:id",
            get(get_answer).put(update_answer).delete(delete_answer),
        )
}

pub async fn create_answer(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(caller): Extension<IdentityContext>,
    Path(question_id): Path<String>,
    Json(body): Json<BodyRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let question_id: QuestionId = question_id.parse()?;
    let new_answer = NewAnswer {
        body: Body::parse(&body.body)?,
        question_id,
        user_id: caller.user_id(),
    };

    let answer = services.store.insert_answer(new_answer).await?;
    Ok((StatusCode::CREATED, Json(answer)))
}

pub async fn list_answers(
    Extension(services): Extension<Arc<AppServices>>,
    Query(query): Query<PageQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let answers = services.store.list_answers(query.into_page()).await?;
    Ok(Json(answers))
}

pub async fn get_answer(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let id: AnswerId = id.parse()?;
    match services.store.find_answer(id).await? {
        Some(answer) => Ok(Json(answer)),
        None => Err(ApiError::not_found(format!("answer {id}"))),
    }
}

pub async fn update_answer(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(caller): Extension<IdentityContext>,
    Path(id): Path<String>,
    Json(body): Json<BodyRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let id: AnswerId = id.parse()?;
    require_owner(&services, &caller, ResourceRef::Answer(id)).await?;

    let body = Body::parse(&body.body)?;
    match services.store.update_answer_body(id, body).await? {
        Some(answer) => Ok(Json(answer)),
        None => Err(ApiError::not_found(format!("answer {id}"))),
    }
}

pub async fn delete_answer(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(caller): Extension<IdentityContext>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id: AnswerId = id.parse()?;
    require_owner(&services, &caller, ResourceRef::Answer(id)).await?;

    if !services.store.delete_answer(id).await? {
        return Err(ApiError::not_found(format!("answer {id}")));
    }
    Ok(StatusCode::NO_CONTENT)
}
