use chrono::{Duration as ChronoDuration, Utc};
use agora_api::app::services::AppServices;
use agora_auth::{TokenClaims, TokenService};
use agora_core::UserId;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::StatusCode;
use serde_json::{json, Value};

struct TestServer {
    base_url: String,
    client: reqwest::Client,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn(jwt_secret: &str) -> Self {
        // Same router as prod over a fresh in-memory store, on an ephemeral port.
        let tokens = TokenService::new(jwt_secret, ChronoDuration::minutes(10));
        let app = agora_api::app::build_app(AppServices::in_memory(tokens));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url,
            client: reqwest::Client::new(),
            handle,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Register a user and return `(user_id, token)`.
    async fn register(&self, email: &str) -> (u64, String) {
        let res = self
            .client
            .post(self.url("/api/auth/register"))
            .json(&json!({
                "first_name": "Test",
                "last_name": "User",
                "email": email,
                "password": "correct horse",
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::CREATED);
        let body: Value = res.json().await.unwrap();
        (
            body["user"]["id"].as_u64().unwrap(),
            body["token"].as_str().unwrap().to_string(),
        )
    }

    async fn ask(&self, token: &str, body: &str) -> u64 {
        let res = self
            .client
            .post(self.url("/api/questions"))
            .bearer_auth(token)
            .json(&json!({ "body": body }))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::CREATED);
        let created: Value = res.json().await.unwrap();
        created["id"].as_u64().unwrap()
    }

    async fn question_page(&self, token: &str, id: u64) -> (StatusCode, Value) {
        let res = self
            .client
            .get(self.url(&format!("/api/questions/{id}")))
            .bearer_auth(token)
            .send()
            .await
            .unwrap();
        let status = res.status();
        (status, res.json().await.unwrap_or(Value::Null))
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn mint_jwt(jwt_secret: &str, user: u64, expires_in: ChronoDuration) -> String {
    let now = Utc::now();
    let claims = TokenClaims {
        sub: UserId::new(user),
        iat: now - ChronoDuration::hours(2),
        exp: now + expires_in,
    };

    jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(jwt_secret.as_bytes()),
    )
    .expect("failed to encode jwt")
}

async fn error_code(res: reqwest::Response) -> String {
    let body: Value = res.json().await.unwrap();
    body["error"].as_str().unwrap_or_default().to_string()
}

#[tokio::test]
async fn health_is_public() {
    let srv = TestServer::spawn("test-secret").await;
    let res = srv.client.get(srv.url("/health")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn auth_required_for_protected_endpoints() {
    let srv = TestServer::spawn("test-secret").await;

    let res = srv.client.get(srv.url("/api/whoami")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(error_code(res).await, "missing_token");

    let res = srv
        .client
        .post(srv.url("/api/questions"))
        .json(&json!({ "body": "anyone?" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn identity_is_derived_from_token() {
    let srv = TestServer::spawn("test-secret").await;
    let (user_id, token) = srv.register("ann@example.com").await;

    let res = srv
        .client
        .get(srv.url("/api/whoami"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["user_id"].as_u64().unwrap(), user_id);
}

#[tokio::test]
async fn token_failures_are_distinguished() {
    let jwt_secret = "test-secret";
    let srv = TestServer::spawn(jwt_secret).await;

    let cases = [
        (mint_jwt(jwt_secret, 1, ChronoDuration::minutes(-5)), "token_expired"),
        (mint_jwt("other-secret", 1, ChronoDuration::minutes(5)), "token_signature_invalid"),
        ("not-a-token".to_string(), "token_malformed"),
    ];

    for (token, expected) in cases {
        let res = srv
            .client
            .get(srv.url("/api/whoami"))
            .bearer_auth(&token)
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(error_code(res).await, expected);
    }

    // A well-formed, correctly signed token is accepted even for a minted id.
    let res = srv
        .client
        .get(srv.url("/api/whoami"))
        .bearer_auth(mint_jwt(jwt_secret, 77, ChronoDuration::minutes(5)))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn registration_and_login() {
    let srv = TestServer::spawn("test-secret").await;
    let (user_id, _) = srv.register("ann@example.com").await;

    // Same address after normalization.
    let res = srv
        .client
        .post(srv.url("/api/auth/register"))
        .json(&json!({
            "first_name": "Ann",
            "last_name": "Again",
            "email": "  ANN@example.com ",
            "password": "another password",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);
    assert_eq!(error_code(res).await, "duplicate_email");

    let res = srv
        .client
        .post(srv.url("/api/auth/login"))
        .json(&json!({ "email": "ann@example.com", "password": "wrong password" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(error_code(res).await, "invalid_credentials");

    let res = srv
        .client
        .post(srv.url("/api/auth/login"))
        .json(&json!({ "email": "nobody@example.com", "password": "correct horse" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = srv
        .client
        .post(srv.url("/api/auth/login"))
        .json(&json!({ "email": "ann@example.com", "password": "correct horse" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["user"]["id"].as_u64().unwrap(), user_id);
    assert!(body["user"].get("password_hash").is_none());
    assert!(body["token"].as_str().is_some());
}

#[tokio::test]
async fn short_passwords_are_rejected() {
    let srv = TestServer::spawn("test-secret").await;
    let res = srv
        .client
        .post(srv.url("/api/auth/register"))
        .json(&json!({
            "first_name": "Ann",
            "last_name": "Lee",
            "email": "ann@example.com",
            "password": "short",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(error_code(res).await, "validation_error");
}

#[tokio::test]
async fn question_page_reflects_caller() {
    let srv = TestServer::spawn("test-secret").await;
    let (_, owner) = srv.register("owner@example.com").await;
    let (_, other) = srv.register("other@example.com").await;
    let id = srv.ask(&owner, "What is ownership?").await;

    let (status, page) = srv.question_page(&other, id).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["question"]["body"], "What is ownership?");
    assert_eq!(page["like_count"], 0);
    assert_eq!(page["liked_by_current_user"], false);
    assert_eq!(page["editable_by_current_user"], false);

    let (_, page) = srv.question_page(&owner, id).await;
    assert_eq!(page["editable_by_current_user"], true);
}

#[tokio::test]
async fn only_the_owner_may_edit_or_delete_a_question() {
    let srv = TestServer::spawn("test-secret").await;
    let (_, owner) = srv.register("owner@example.com").await;
    let (_, other) = srv.register("other@example.com").await;
    let id = srv.ask(&owner, "original").await;

    let res = srv
        .client
        .put(srv.url(&format!("/api/questions/{id}")))
        .bearer_auth(&other)
        .json(&json!({ "body": "hijacked" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let res = srv
        .client
        .delete(srv.url(&format!("/api/questions/{id}")))
        .bearer_auth(&other)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let res = srv
        .client
        .put(srv.url(&format!("/api/questions/{id}")))
        .bearer_auth(&owner)
        .json(&json!({ "body": "  edited  " }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let updated: Value = res.json().await.unwrap();
    assert_eq!(updated["body"], "edited");

    let res = srv
        .client
        .delete(srv.url(&format!("/api/questions/{id}")))
        .bearer_auth(&owner)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NO_CONTENT);

    let (status, _) = srv.question_page(&owner, id).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // Gone for everyone: indistinguishable from not owning it.
    let res = srv
        .client
        .delete(srv.url(&format!("/api/questions/{id}")))
        .bearer_auth(&owner)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn likes_are_idempotent() {
    let srv = TestServer::spawn("test-secret").await;
    let (_, owner) = srv.register("owner@example.com").await;
    let (_, fan) = srv.register("fan@example.com").await;
    let id = srv.ask(&owner, "Like me?").await;
    let like_url = srv.url(&format!("/api/questions/{id}/like"));

    for _ in 0..3 {
        let res = srv.client.post(&like_url).bearer_auth(&fan).send().await.unwrap();
        assert_eq!(res.status(), StatusCode::NO_CONTENT);
    }

    let (_, page) = srv.question_page(&fan, id).await;
    assert_eq!(page["like_count"], 1);
    assert_eq!(page["liked_by_current_user"], true);

    let (_, page) = srv.question_page(&owner, id).await;
    assert_eq!(page["like_count"], 1);
    assert_eq!(page["liked_by_current_user"], false);

    for _ in 0..2 {
        let res = srv.client.delete(&like_url).bearer_auth(&fan).send().await.unwrap();
        assert_eq!(res.status(), StatusCode::NO_CONTENT);
    }

    let (_, page) = srv.question_page(&fan, id).await;
    assert_eq!(page["like_count"], 0);
    assert_eq!(page["liked_by_current_user"], false);
}

#[tokio::test]
async fn concurrent_likes_count_once() {
    let srv = TestServer::spawn("test-secret").await;
    let (_, owner) = srv.register("owner@example.com").await;
    let (_, fan) = srv.register("fan@example.com").await;
    let id = srv.ask(&owner, "Race?").await;
    let like_url = srv.url(&format!("/api/questions/{id}/like"));

    let requests = (0..16).map(|_| srv.client.post(&like_url).bearer_auth(&fan).send());
    for res in spawn_all(requests).await {
        assert_eq!(res.unwrap().status(), StatusCode::NO_CONTENT);
    }

    let (_, page) = srv.question_page(&fan, id).await;
    assert_eq!(page["like_count"], 1);
}

/// Drive a batch of request futures concurrently on the runtime.
async fn spawn_all<F>(futures: impl Iterator<Item = F>) -> Vec<F::Output>
where
    F: std::future::Future + Send + 'static,
    F::Output: Send + 'static,
{
    let handles: Vec<_> = futures.map(tokio::spawn).collect();
    let mut out = Vec::with_capacity(handles.len());
    for handle in handles {
        out.push(handle.await.unwrap());
    }
    out
}

#[tokio::test]
async fn liking_a_missing_question_is_not_found() {
    let srv = TestServer::spawn("test-secret").await;
    let (_, fan) = srv.register("fan@example.com").await;

    let res = srv
        .client
        .post(srv.url("/api/questions/999/like"))
        .bearer_auth(&fan)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn non_canonical_ids_are_rejected() {
    let srv = TestServer::spawn("test-secret").await;
    let (_, token) = srv.register("ann@example.com").await;

    for raw in ["abc", "-1", "0", "+5"] {
        let res = srv
            .client
            .get(srv.url(&format!("/api/questions/{raw}")))
            .bearer_auth(&token)
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST, "id {raw}");
        assert_eq!(error_code(res).await, "invalid_id");
    }
}

#[tokio::test]
async fn answers_follow_question_and_owner_rules() {
    let srv = TestServer::spawn("test-secret").await;
    let (_, asker) = srv.register("asker@example.com").await;
    let (answerer_id, answerer) = srv.register("answerer@example.com").await;
    let id = srv.ask(&asker, "Why Rust?").await;

    let res = srv
        .client
        .post(srv.url("/api/questions/999/answers"))
        .bearer_auth(&answerer)
        .json(&json!({ "body": "lost" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let res = srv
        .client
        .post(srv.url(&format!("/api/questions/{id}/answers")))
        .bearer_auth(&answerer)
        .json(&json!({ "body": "Because of the borrow checker." }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let answer: Value = res.json().await.unwrap();
    let answer_id = answer["id"].as_u64().unwrap();
    assert_eq!(answer["user_id"].as_u64().unwrap(), answerer_id);

    // The question owner does not own the answer.
    let res = srv
        .client
        .put(srv.url(&format!("/api/answers/{answer_id}")))
        .bearer_auth(&asker)
        .json(&json!({ "body": "rewritten" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let res = srv
        .client
        .put(srv.url(&format!("/api/answers/{answer_id}")))
        .bearer_auth(&answerer)
        .json(&json!({ "body": "Because of ownership." }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let (_, page) = srv.question_page(&asker, id).await;
    assert_eq!(page["answers"][0]["body"], "Because of ownership.");

    let res = srv
        .client
        .get(srv.url("/api/users/top-answerers"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let ranked: Value = res.json().await.unwrap();
    assert_eq!(ranked[0]["user_id"].as_u64().unwrap(), answerer_id);
    assert_eq!(ranked[0]["answer_count"], 1);

    let res = srv
        .client
        .delete(srv.url(&format!("/api/answers/{answer_id}")))
        .bearer_auth(&answerer)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn public_listings() {
    let srv = TestServer::spawn("test-secret").await;
    let (user_id, token) = srv.register("ann@example.com").await;
    let first = srv.ask(&token, "first").await;
    let second = srv.ask(&token, "second").await;

    srv.client
        .post(srv.url(&format!("/api/questions/{first}/like")))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();

    let res = srv.client.get(srv.url("/api/questions")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let listed: Value = res.json().await.unwrap();
    assert_eq!(listed[0]["id"].as_u64().unwrap(), second);

    let res = srv
        .client
        .get(srv.url("/api/questions?sort=oldest&limit=1"))
        .send()
        .await
        .unwrap();
    let listed: Value = res.json().await.unwrap();
    assert_eq!(listed.as_array().unwrap().len(), 1);
    assert_eq!(listed[0]["id"].as_u64().unwrap(), first);

    let res = srv.client.get(srv.url("/api/questions/top")).send().await.unwrap();
    let top: Value = res.json().await.unwrap();
    assert_eq!(top[0]["id"].as_u64().unwrap(), first);
    assert_eq!(top[0]["like_count"], 1);

    let res = srv
        .client
        .get(srv.url(&format!("/api/users/{user_id}/questions")))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    let mine: Value = res.json().await.unwrap();
    assert_eq!(mine.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn profile_update_targets_the_caller_only() {
    let srv = TestServer::spawn("test-secret").await;
    let (ann_id, ann) = srv.register("ann@example.com").await;
    let (bob_id, _) = srv.register("bob@example.com").await;

    let res = srv
        .client
        .put(srv.url("/api/users/me"))
        .json(&json!({ "last_name": "Nobody" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    // An id in the body does not redirect the edit.
    let res = srv
        .client
        .put(srv.url("/api/users/me"))
        .bearer_auth(&ann)
        .json(&json!({ "id": bob_id, "last_name": "Smith", "password": "a new password" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let updated: Value = res.json().await.unwrap();
    assert_eq!(updated["id"].as_u64().unwrap(), ann_id);
    assert_eq!(updated["last_name"], "Smith");
    assert_eq!(updated["first_name"], "Test");
    assert!(updated.get("password_hash").is_none());

    let res = srv
        .client
        .get(srv.url(&format!("/api/users/{bob_id}")))
        .bearer_auth(&ann)
        .send()
        .await
        .unwrap();
    let bob: Value = res.json().await.unwrap();
    assert_eq!(bob["last_name"], "User");

    let login = |password: &'static str| {
        srv.client
            .post(srv.url("/api/auth/login"))
            .json(&json!({ "email": "ann@example.com", "password": password }))
            .send()
    };
    assert_eq!(login("correct horse").await.unwrap().status(), StatusCode::UNAUTHORIZED);
    assert_eq!(login("a new password").await.unwrap().status(), StatusCode::OK);

    let res = srv
        .client
        .get(srv.url("/api/users/me"))
        .bearer_auth(&ann)
        .send()
        .await
        .unwrap();
    let me: Value = res.json().await.unwrap();
    assert_eq!(me["last_name"], "Smith");
}

#[tokio::test]
async fn profile_update_rejects_taken_email_and_bad_fields() {
    let srv = TestServer::spawn("test-secret").await;
    let (_, ann) = srv.register("ann@example.com").await;
    srv.register("bob@example.com").await;

    let res = srv
        .client
        .put(srv.url("/api/users/me"))
        .bearer_auth(&ann)
        .json(&json!({ "email": "BOB@example.com" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);
    assert_eq!(error_code(res).await, "duplicate_email");

    let res = srv
        .client
        .put(srv.url("/api/users/me"))
        .bearer_auth(&ann)
        .json(&json!({ "password": "short" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(error_code(res).await, "validation_error");

    let res = srv
        .client
        .put(srv.url("/api/users/me"))
        .bearer_auth(&ann)
        .json(&json!({ "email": "ann.lee@example.com" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let updated: Value = res.json().await.unwrap();
    assert_eq!(updated["email"], "ann.lee@example.com");
}

#[tokio::test]
async fn profile_of_a_vanished_user_is_not_found() {
    let jwt_secret = "test-secret";
    let srv = TestServer::spawn(jwt_secret).await;
    let ghost = mint_jwt(jwt_secret, 77, ChronoDuration::minutes(5));

    let res = srv
        .client
        .put(srv.url("/api/users/me"))
        .bearer_auth(&ghost)
        .json(&json!({ "last_name": "Ghost" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn like_from_a_vanished_user_is_not_found_and_not_counted() {
    let jwt_secret = "test-secret";
    let srv = TestServer::spawn(jwt_secret).await;
    let (_, owner) = srv.register("owner@example.com").await;
    let id = srv.ask(&owner, "Anyone there?").await;
    let ghost = mint_jwt(jwt_secret, 77, ChronoDuration::minutes(5));

    let res = srv
        .client
        .post(srv.url(&format!("/api/questions/{id}/like")))
        .bearer_auth(&ghost)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["message"], "user 77 not found");

    let res = srv
        .client
        .post(srv.url(&format!("/api/questions/{id}/answers")))
        .bearer_auth(&ghost)
        .json(&json!({ "body": "boo" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["message"], "user 77 not found");

    let res = srv.client.get(srv.url("/api/questions/top")).send().await.unwrap();
    let top: Value = res.json().await.unwrap();
    assert_eq!(top[0]["like_count"], 0);
}

#[tokio::test]
async fn all_answers_are_listed_with_paging() {
    let srv = TestServer::spawn("test-secret").await;
    let (_, token) = srv.register("ann@example.com").await;
    let first = srv.ask(&token, "first").await;
    let second = srv.ask(&token, "second").await;

    for (question, body) in [(first, "a1"), (second, "a2"), (second, "a3")] {
        let res = srv
            .client
            .post(srv.url(&format!("/api/questions/{question}/answers")))
            .bearer_auth(&token)
            .json(&json!({ "body": body }))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::CREATED);
    }

    let res = srv.client.get(srv.url("/api/answers")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = srv
        .client
        .get(srv.url("/api/answers"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let all: Value = res.json().await.unwrap();
    let bodies: Vec<&str> = all.as_array().unwrap().iter().map(|a| a["body"].as_str().unwrap()).collect();
    assert_eq!(bodies, ["a3", "a2", "a1"]);

    let res = srv
        .client
        .get(srv.url("/api/answers?sort=oldest&limit=2&page=2"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    let page: Value = res.json().await.unwrap();
    assert_eq!(page.as_array().unwrap().len(), 1);
    assert_eq!(page[0]["body"], "a3");
}
