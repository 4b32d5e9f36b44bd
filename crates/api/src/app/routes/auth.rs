use std::sync::Arc;

use axum::{extract::Extension, http::StatusCode, response::IntoResponse, Json};

use agora_auth::{hash_password, verify_password};
use agora_forum::{Email, Registration};
use agora_infra::{StoreError, UserStore};

use crate::app::dto::{LoginRequest, RegisterRequest, SessionResponse};
use crate::app::errors::ApiError;
use crate::app::services::AppServices;

pub async fn register(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let registration = Registration::parse(&body.first_name, &body.last_name, &body.email, &body.password)?;

    // Argon2 runs on the blocking pool.
    let password = registration.password.clone();
    let hash = tokio::task::spawn_blocking(move || hash_password(&password)).await??;

    let user = match services.store.create_user(registration.into_new_user(hash)).await {
        Ok(user) => user,
        Err(StoreError::UniqueViolation(_)) => return Err(ApiError::DuplicateEmail),
        Err(e) => return Err(e.into()),
    };
    let token = services.tokens.sign(user.id)?;

    tracing::info!(user_id = %user.id, "user registered");
    Ok((StatusCode::CREATED, Json(SessionResponse { user, token })))
}

pub async fn login(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let email = Email::parse(&body.email).map_err(|_| ApiError::InvalidCredentials)?;
    let Some(user) = services.store.find_user_by_email(&email).await? else {
        return Err(ApiError::InvalidCredentials);
    };

    let stored = user.password_hash.clone();
    let password = body.password;
    let matches = tokio::task::spawn_blocking(move || verify_password(&password, &stored)).await??;
    if !matches {
        return Err(ApiError::InvalidCredentials);
    }

    let token = services.tokens.sign(user.id)?;
    Ok(Json(SessionResponse { user, token }))
}
