use std::sync::Arc;

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};

use agora_auth::{TokenError, TokenService};

use crate::app::errors::json_error;
use crate::context::IdentityContext;

#[derive(Clone)]
pub struct AuthState {
    pub tokens: Arc<TokenService>,
}

pub async fn auth_middleware(
    State(state): State<AuthState>,
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Result<Response, Response> {
    let token = extract_bearer(req.headers()).ok_or_else(|| {
        json_error(StatusCode::UNAUTHORIZED, "missing_token", "bearer token required")
    })?;

    let identity = state.tokens.validate(token).map_err(|e: TokenError| {
        tracing::debug!(kind = e.code(), "token rejected");
        json_error(StatusCode::UNAUTHORIZED, e.code(), e.to_string())
    })?;

    req.extensions_mut().insert(IdentityContext::new(identity));

    Ok(next.run(req).await)
}

fn extract_bearer(headers: &HeaderMap) -> Option<&str> {
    let header = headers.get(axum::http::header::AUTHORIZATION)?;
    let header = header.to_str().ok()?;
    let token = header.strip_prefix("Bearer ")?.trim();
    if token.is_empty() {
        return None;
    }
    Some(token)
}
