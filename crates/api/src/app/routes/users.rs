use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    response::IntoResponse,
    routing::get,
    Json, Router,
};

use agora_auth::hash_password;
use agora_core::UserId;
use agora_forum::ProfileUpdate;
use agora_infra::{QuestionStore, StoreError, UserStore};

use crate::app::dto::{LimitQuery, PageQuery, UpdateProfileRequest};
use crate::app::errors::ApiError;
use crate::app::services::AppServices;
use crate::context::IdentityContext;

const DEFAULT_TOP_ANSWERERS: u32 = 10;

pub fn router() -> Router {
    Router::new()
        .route("/users/me", get(get_me).put(update_me))
        .route("/users/:id", get(get_user))
        .route("/users/:id/questions", get(questions_by_user))
}

pub async fn get_user(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let id: UserId = id.parse()?;
    match services.store.find_user(id).await? {
        Some(user) => Ok(Json(user)),
        None => Err(ApiError::not_found(format!("user {id}"))),
    }
}

pub async fn get_me(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(caller): Extension<IdentityContext>,
) -> Result<impl IntoResponse, ApiError> {
    match services.store.find_user(caller.user_id()).await? {
        Some(user) => Ok(Json(user)),
        None => Err(ApiError::not_found(format!("user {}", caller.user_id()))),
    }
}

/// Edit the caller's own profile. The target is always the token's subject.
pub async fn update_me(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(caller): Extension<IdentityContext>,
    Json(body): Json<UpdateProfileRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let mut update = ProfileUpdate::parse(
        body.first_name.as_deref(),
        body.last_name.as_deref(),
        body.email.as_deref(),
        body.password.as_deref(),
    )?;

    let password_hash = match update.password.take() {
        Some(password) => Some(tokio::task::spawn_blocking(move || hash_password(&password)).await??),
        None => None,
    };

    let id = caller.user_id();
    let user = match services.store.update_user(id, update.into_user_update(password_hash)).await {
        Ok(Some(user)) => user,
        Ok(None) => return Err(ApiError::not_found(format!("user {id}"))),
        Err(StoreError::UniqueViolation(_)) => return Err(ApiError::DuplicateEmail),
        Err(e) => return Err(e.into()),
    };

    tracing::info!(user_id = %id, "profile updated");
    Ok(Json(user))
}

pub async fn questions_by_user(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Query(query): Query<PageQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let id: UserId = id.parse()?;
    let questions = services.store.questions_by_user(id, query.into_page()).await?;
    Ok(Json(questions))
}

pub async fn top_answerers(
    Extension(services): Extension<Arc<AppServices>>,
    Query(query): Query<LimitQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let ranked = services
        .store
        .top_answerers(query.resolve(DEFAULT_TOP_ANSWERERS))
        .await?;
    Ok(Json(ranked))
}
