use axum::{
    routing::{get, post},
    Router,
};

pub mod answers;
pub mod auth;
pub mod questions;
pub mod system;
pub mod users;

/// Endpoints reachable without a token.
pub fn public_router() -> Router {
    Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/questions", get(questions::list_questions))
        .route("/questions/top", get(questions::top_questions))
        .route("/users/top-answerers", get(users::top_answerers))
}

/// Endpoints that require a verified identity.
pub fn protected_router() -> Router {
    Router::new()
        .route("/whoami", get(system::whoami))
        .merge(questions::router())
        .merge(answers::router())
        .merge(users::router())
}
