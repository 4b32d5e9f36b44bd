//! Postgres-backed forum store.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | StoreError |
//! |------------|----------------------|------------|
//! | Database (unique violation) | `23505` | `UniqueViolation` |
//! | Database (foreign key violation) | `23503` | `NotFound` (names the referenced table) |
//! | Database (other) | Any other | `Unavailable` |
//! | ColumnDecode / Decode / ColumnNotFound | N/A | `Corrupt` |
//! | PoolTimedOut / PoolClosed / Io / other | N/A | `Unavailable` |
//!
//! Identifiers are `BIGINT`. An id that does not fit in `i64` cannot exist in
//! the database, so lookups with such an id report "absent" without a query.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Row};
use tracing::instrument;

use agora_auth::ResourceRef;
use agora_core::{AnswerId, Page, QuestionId, SortOrder, UserId};
use agora_forum::{
    Answer, AnswerCount, Body, Email, NewAnswer, NewQuestion, NewUser, Question, QuestionSummary, User,
    UserUpdate,
};

use super::r#trait::{AnswerStore, QuestionSnapshot, QuestionStore, ResourceStore, StoreError, UserStore};

const SCHEMA: &str = include_str!("../../migrations/0001_forum.sql");

#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: Arc<PgPool>,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool: Arc::new(pool) }
    }

    /// Open a pool against `url`.
    #[instrument(skip(url), err)]
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(5))
            .connect(url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        Ok(Self::new(pool))
    }

    /// Create the forum tables if they do not exist yet.
    #[instrument(skip(self), err)]
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::raw_sql(SCHEMA)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("migrate", e))?;
        Ok(())
    }
}

fn db_id(id: u64) -> Option<i64> {
    i64::try_from(id).ok()
}

fn id_from_db(raw: i64) -> Result<u64, StoreError> {
    u64::try_from(raw)
        .ok()
        .filter(|id| *id != 0)
        .ok_or_else(|| StoreError::Corrupt(format!("invalid id {raw}")))
}

fn count_from_db(raw: i64) -> Result<u64, StoreError> {
    u64::try_from(raw).map_err(|_| StoreError::Corrupt(format!("negative count {raw}")))
}

fn get<'r, T>(row: &'r PgRow, column: &str) -> Result<T, StoreError>
where
    T: sqlx::Decode<'r, sqlx::Postgres> + sqlx::Type<sqlx::Postgres>,
{
    row.try_get(column)
        .map_err(|e| StoreError::Corrupt(format!("column {column}: {e}")))
}

fn user_from_row(row: &PgRow) -> Result<User, StoreError> {
    let email: String = get(row, "email")?;
    Ok(User {
        id: UserId::new(id_from_db(get(row, "id")?)?),
        first_name: get(row, "first_name")?,
        last_name: get(row, "last_name")?,
        email: Email::parse(&email).map_err(|e| StoreError::Corrupt(e.to_string()))?,
        password_hash: get(row, "password_hash")?,
    })
}

fn question_from_row(row: &PgRow) -> Result<Question, StoreError> {
    Ok(Question {
        id: QuestionId::new(id_from_db(get(row, "id")?)?),
        body: get(row, "body")?,
        user_id: UserId::new(id_from_db(get(row, "user_id")?)?),
        created_at: get(row, "created_at")?,
        updated_at: get(row, "updated_at")?,
    })
}

fn answer_from_row(row: &PgRow) -> Result<Answer, StoreError> {
    Ok(Answer {
        id: AnswerId::new(id_from_db(get(row, "id")?)?),
        body: get(row, "body")?,
        question_id: QuestionId::new(id_from_db(get(row, "question_id")?)?),
        user_id: UserId::new(id_from_db(get(row, "user_id")?)?),
        created_at: get(row, "created_at")?,
        updated_at: get(row, "updated_at")?,
    })
}

fn summary_from_row(row: &PgRow) -> Result<QuestionSummary, StoreError> {
    Ok(QuestionSummary {
        question: question_from_row(row)?,
        like_count: count_from_db(get(row, "like_count")?)?,
    })
}

fn answer_count_from_row(row: &PgRow) -> Result<AnswerCount, StoreError> {
    Ok(AnswerCount {
        user_id: UserId::new(id_from_db(get(row, "id")?)?),
        first_name: get(row, "first_name")?,
        last_name: get(row, "last_name")?,
        answer_count: count_from_db(get(row, "answer_count")?)?,
    })
}

fn snapshot_from_row(row: &PgRow) -> Result<QuestionSnapshot, StoreError> {
    Ok(QuestionSnapshot {
        owner: UserId::new(id_from_db(get(row, "user_id")?)?),
        like_count: count_from_db(get(row, "like_count")?)?,
        liked_by_viewer: get(row, "liked_by_viewer")?,
    })
}

fn order_clause(sort: SortOrder) -> &'static str {
    match sort {
        SortOrder::Newest => "ORDER BY created_at DESC, id DESC",
        SortOrder::Oldest => "ORDER BY created_at ASC, id ASC",
    }
}

fn page_bounds(page: Page) -> (i64, i64) {
    let offset = i64::try_from(page.offset()).unwrap_or(i64::MAX);
    (i64::from(page.limit), offset)
}

#[async_trait]
impl ResourceStore for PostgresStore {
    #[instrument(skip(self, resource), fields(resource = %resource), err)]
    async fn get_owner(&self, resource: ResourceRef) -> Result<Option<UserId>, StoreError> {
        let (sql, id) = match resource {
            ResourceRef::Question(id) => ("SELECT user_id FROM questions WHERE id = $1", id.get()),
            ResourceRef::Answer(id) => ("SELECT user_id FROM answers WHERE id = $1", id.get()),
        };
        let Some(id) = db_id(id) else {
            return Ok(None);
        };

        let row = sqlx::query(sql)
            .bind(id)
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_owner", e))?;
        match row {
            Some(r) => Ok(Some(UserId::new(id_from_db(get(&r, "user_id")?)?))),
            None => Ok(None),
        }
    }

    #[instrument(skip(self), err)]
    async fn like_exists(&self, question_id: QuestionId, user_id: UserId) -> Result<bool, StoreError> {
        let (Some(q), Some(u)) = (db_id(question_id.get()), db_id(user_id.get())) else {
            return Ok(false);
        };
        let row = sqlx::query("SELECT 1 AS hit FROM question_likes WHERE question_id = $1 AND user_id = $2")
            .bind(q)
            .bind(u)
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("like_exists", e))?;
        Ok(row.is_some())
    }

    #[instrument(skip(self), err)]
    async fn insert_like(&self, question_id: QuestionId, user_id: UserId) -> Result<bool, StoreError> {
        let Some(q) = db_id(question_id.get()) else {
            return Err(StoreError::NotFound(format!("question {question_id}")));
        };
        let Some(u) = db_id(user_id.get()) else {
            return Err(StoreError::NotFound(format!("user {user_id}")));
        };
        let result = sqlx::query(
            r#"
            INSERT INTO question_likes (question_id, user_id)
            VALUES ($1, $2)
            ON CONFLICT (question_id, user_id) DO NOTHING
            "#,
        )
        .bind(q)
        .bind(u)
        .execute(&*self.pool)
        .await
        .map_err(|e| name_missing(map_sqlx_error("insert_like", e), Some(question_id), user_id))?;
        Ok(result.rows_affected() == 1)
    }

    #[instrument(skip(self), err)]
    async fn delete_like(&self, question_id: QuestionId, user_id: UserId) -> Result<bool, StoreError> {
        let (Some(q), Some(u)) = (db_id(question_id.get()), db_id(user_id.get())) else {
            return Ok(false);
        };
        let result = sqlx::query("DELETE FROM question_likes WHERE question_id = $1 AND user_id = $2")
            .bind(q)
            .bind(u)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete_like", e))?;
        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self), err)]
    async fn count_likes_for(&self, question_id: QuestionId) -> Result<u64, StoreError> {
        let Some(q) = db_id(question_id.get()) else {
            return Ok(0);
        };
        let row = sqlx::query("SELECT COUNT(*) AS like_count FROM question_likes WHERE question_id = $1")
            .bind(q)
            .fetch_one(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("count_likes_for", e))?;
        count_from_db(get(&row, "like_count")?)
    }

    #[instrument(skip(self), err)]
    async fn question_snapshot(
        &self,
        question_id: QuestionId,
        viewer: UserId,
    ) -> Result<Option<QuestionSnapshot>, StoreError> {
        let Some(q) = db_id(question_id.get()) else {
            return Ok(None);
        };
        // Out-of-range viewer ids cannot have liked anything; -1 matches no row.
        let v = db_id(viewer.get()).unwrap_or(-1);

        let row = sqlx::query(
            r#"
            SELECT
                q.user_id,
                (SELECT COUNT(*) FROM question_likes l WHERE l.question_id = q.id) AS like_count,
                EXISTS (
                    SELECT 1 FROM question_likes l WHERE l.question_id = q.id AND l.user_id = $2
                ) AS liked_by_viewer
            FROM questions q
            WHERE q.id = $1
            "#,
        )
        .bind(q)
        .bind(v)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("question_snapshot", e))?;

        row.as_ref().map(snapshot_from_row).transpose()
    }
}

#[async_trait]
impl UserStore for PostgresStore {
    #[instrument(skip(self, user), fields(email = %user.email), err)]
    async fn create_user(&self, user: NewUser) -> Result<User, StoreError> {
        let row = sqlx::query(
            r#"
            INSERT INTO users (first_name, last_name, email, password_hash)
            VALUES ($1, $2, $3, $4)
            RETURNING id, first_name, last_name, email, password_hash
            "#,
        )
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(user.email.as_str())
        .bind(&user.password_hash)
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("create_user", e))?;
        user_from_row(&row)
    }

    #[instrument(skip(self), err)]
    async fn find_user(&self, id: UserId) -> Result<Option<User>, StoreError> {
        let Some(id) = db_id(id.get()) else {
            return Ok(None);
        };
        let row = sqlx::query("SELECT id, first_name, last_name, email, password_hash FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("find_user", e))?;
        row.as_ref().map(user_from_row).transpose()
    }

    #[instrument(skip(self, email), err)]
    async fn find_user_by_email(&self, email: &Email) -> Result<Option<User>, StoreError> {
        let row =
            sqlx::query("SELECT id, first_name, last_name, email, password_hash FROM users WHERE email = $1")
                .bind(email.as_str())
                .fetch_optional(&*self.pool)
                .await
                .map_err(|e| map_sqlx_error("find_user_by_email", e))?;
        row.as_ref().map(user_from_row).transpose()
    }

    #[instrument(skip(self, update), err)]
    async fn update_user(&self, id: UserId, update: UserUpdate) -> Result<Option<User>, StoreError> {
        let Some(id) = db_id(id.get()) else {
            return Ok(None);
        };
        let row = sqlx::query(
            r#"
            UPDATE users SET
                first_name = COALESCE($2, first_name),
                last_name = COALESCE($3, last_name),
                email = COALESCE($4, email),
                password_hash = COALESCE($5, password_hash)
            WHERE id = $1
            RETURNING id, first_name, last_name, email, password_hash
            "#,
        )
        .bind(id)
        .bind(update.first_name.as_deref())
        .bind(update.last_name.as_deref())
        .bind(update.email.as_ref().map(Email::as_str))
        .bind(update.password_hash.as_deref())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("update_user", e))?;
        row.as_ref().map(user_from_row).transpose()
    }

    #[instrument(skip(self), err)]
    async fn top_answerers(&self, limit: u32) -> Result<Vec<AnswerCount>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT u.id, u.first_name, u.last_name, COUNT(a.id) AS answer_count
            FROM users u
            JOIN answers a ON a.user_id = u.id
            GROUP BY u.id, u.first_name, u.last_name
            ORDER BY answer_count DESC, u.id ASC
            LIMIT $1
            "#,
        )
        .bind(i64::from(limit))
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("top_answerers", e))?;

        rows.iter().map(answer_count_from_row).collect()
    }
}

#[async_trait]
impl QuestionStore for PostgresStore {
    #[instrument(skip(self, question), fields(user_id = %question.user_id), err)]
    async fn insert_question(&self, question: NewQuestion) -> Result<Question, StoreError> {
        let Some(owner) = db_id(question.user_id.get()) else {
            return Err(StoreError::NotFound(format!("user {}", question.user_id)));
        };
        let row = sqlx::query(
            r#"
            INSERT INTO questions (body, user_id)
            VALUES ($1, $2)
            RETURNING id, body, user_id, created_at, updated_at
            "#,
        )
        .bind(question.body.as_str())
        .bind(owner)
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| name_missing(map_sqlx_error("insert_question", e), None, question.user_id))?;
        question_from_row(&row)
    }

    #[instrument(skip(self), err)]
    async fn find_question(&self, id: QuestionId) -> Result<Option<Question>, StoreError> {
        let Some(id) = db_id(id.get()) else {
            return Ok(None);
        };
        let row = sqlx::query("SELECT id, body, user_id, created_at, updated_at FROM questions WHERE id = $1")
            .bind(id)
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("find_question", e))?;
        row.as_ref().map(question_from_row).transpose()
    }

    #[instrument(skip(self, body), err)]
    async fn update_question_body(&self, id: QuestionId, body: Body) -> Result<Option<Question>, StoreError> {
        let Some(id) = db_id(id.get()) else {
            return Ok(None);
        };
        let row = sqlx::query(
            r#"
            UPDATE questions SET body = $2, updated_at = now()
            WHERE id = $1
            RETURNING id, body, user_id, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(body.as_str())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("update_question_body", e))?;
        row.as_ref().map(question_from_row).transpose()
    }

    #[instrument(skip(self), err)]
    async fn delete_question(&self, id: QuestionId) -> Result<bool, StoreError> {
        let Some(id) = db_id(id.get()) else {
            return Ok(false);
        };
        // Answers and likes go with it via ON DELETE CASCADE.
        let result = sqlx::query("DELETE FROM questions WHERE id = $1")
            .bind(id)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete_question", e))?;
        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self), err)]
    async fn list_questions(&self, page: Page) -> Result<Vec<Question>, StoreError> {
        let (limit, offset) = page_bounds(page);
        let sql = format!(
            "SELECT id, body, user_id, created_at, updated_at FROM questions {} LIMIT $1 OFFSET $2",
            order_clause(page.sort)
        );
        let rows = sqlx::query(&sql)
            .bind(limit)
            .bind(offset)
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_questions", e))?;
        rows.iter().map(question_from_row).collect()
    }

    #[instrument(skip(self), err)]
    async fn questions_by_user(&self, user_id: UserId, page: Page) -> Result<Vec<Question>, StoreError> {
        let Some(owner) = db_id(user_id.get()) else {
            return Ok(Vec::new());
        };
        let (limit, offset) = page_bounds(page);
        let sql = format!(
            "SELECT id, body, user_id, created_at, updated_at FROM questions WHERE user_id = $1 {} LIMIT $2 OFFSET $3",
            order_clause(page.sort)
        );
        let rows = sqlx::query(&sql)
            .bind(owner)
            .bind(limit)
            .bind(offset)
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("questions_by_user", e))?;
        rows.iter().map(question_from_row).collect()
    }

    #[instrument(skip(self), err)]
    async fn most_liked_questions(&self, limit: u32) -> Result<Vec<QuestionSummary>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT q.id, q.body, q.user_id, q.created_at, q.updated_at, COUNT(l.user_id) AS like_count
            FROM questions q
            LEFT JOIN question_likes l ON l.question_id = q.id
            GROUP BY q.id
            ORDER BY like_count DESC, q.id DESC
            LIMIT $1
            "#,
        )
        .bind(i64::from(limit))
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("most_liked_questions", e))?;

        rows.iter().map(summary_from_row).collect()
    }
}

#[async_trait]
impl AnswerStore for PostgresStore {
    #[instrument(skip(self, answer), fields(question_id = %answer.question_id, user_id = %answer.user_id), err)]
    async fn insert_answer(&self, answer: NewAnswer) -> Result<Answer, StoreError> {
        let Some(q) = db_id(answer.question_id.get()) else {
            return Err(StoreError::NotFound(format!("question {}", answer.question_id)));
        };
        let Some(u) = db_id(answer.user_id.get()) else {
            return Err(StoreError::NotFound(format!("user {}", answer.user_id)));
        };
        let row = sqlx::query(
            r#"
            INSERT INTO answers (body, question_id, user_id)
            VALUES ($1, $2, $3)
            RETURNING id, body, question_id, user_id, created_at, updated_at
            "#,
        )
        .bind(answer.body.as_str())
        .bind(q)
        .bind(u)
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| {
            name_missing(map_sqlx_error("insert_answer", e), Some(answer.question_id), answer.user_id)
        })?;
        answer_from_row(&row)
    }

    #[instrument(skip(self), err)]
    async fn find_answer(&self, id: AnswerId) -> Result<Option<Answer>, StoreError> {
        let Some(id) = db_id(id.get()) else {
            return Ok(None);
        };
        let row = sqlx::query(
            "SELECT id, body, question_id, user_id, created_at, updated_at FROM answers WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("find_answer", e))?;
        row.as_ref().map(answer_from_row).transpose()
    }

    #[instrument(skip(self, body), err)]
    async fn update_answer_body(&self, id: AnswerId, body: Body) -> Result<Option<Answer>, StoreError> {
        let Some(id) = db_id(id.get()) else {
            return Ok(None);
        };
        let row = sqlx::query(
            r#"
            UPDATE answers SET body = $2, updated_at = now()
            WHERE id = $1
            RETURNING id, body, question_id, user_id, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(body.as_str())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("update_answer_body", e))?;
        row.as_ref().map(answer_from_row).transpose()
    }

    #[instrument(skip(self), err)]
    async fn delete_answer(&self, id: AnswerId) -> Result<bool, StoreError> {
        let Some(id) = db_id(id.get()) else {
            return Ok(false);
        };
        let result = sqlx::query("DELETE FROM answers WHERE id = $1")
            .bind(id)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete_answer", e))?;
        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self), err)]
    async fn list_answers(&self, page: Page) -> Result<Vec<Answer>, StoreError> {
        let (limit, offset) = page_bounds(page);
        let sql = format!(
            "SELECT id, body, question_id, user_id, created_at, updated_at FROM answers {} LIMIT $1 OFFSET $2",
            order_clause(page.sort)
        );
        let rows = sqlx::query(&sql)
            .bind(limit)
            .bind(offset)
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_answers", e))?;
        rows.iter().map(answer_from_row).collect()
    }

    #[instrument(skip(self), err)]
    async fn answers_for_question(&self, question_id: QuestionId) -> Result<Vec<Answer>, StoreError> {
        let Some(q) = db_id(question_id.get()) else {
            return Ok(Vec::new());
        };
        let rows = sqlx::query(
            r#"
            SELECT id, body, question_id, user_id, created_at, updated_at
            FROM answers
            WHERE question_id = $1
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(q)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("answers_for_question", e))?;
        rows.iter().map(answer_from_row).collect()
    }
}

/// Which table a violated foreign key points at, from the constraint name.
fn referenced_table(constraint: Option<&str>) -> &'static str {
    match constraint {
        Some(name) if name.ends_with("user_id_fkey") => "user",
        Some(name) if name.ends_with("question_id_fkey") => "question",
        _ => "record",
    }
}

/// Attach the offending id to a foreign-key `NotFound`.
fn name_missing(err: StoreError, question_id: Option<QuestionId>, user_id: UserId) -> StoreError {
    match err {
        StoreError::NotFound(table) if table == "user" => StoreError::NotFound(format!("user {user_id}")),
        StoreError::NotFound(table) if table == "question" => match question_id {
            Some(id) => StoreError::NotFound(format!("question {id}")),
            None => StoreError::NotFound(table),
        },
        other => other,
    }
}

/// Map SQLx errors to `StoreError`.
fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code().as_deref() {
                Some("23505") => StoreError::UniqueViolation(msg),
                Some("23503") => StoreError::NotFound(referenced_table(db_err.constraint()).to_string()),
                _ => StoreError::Unavailable(msg),
            }
        }
        sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) | sqlx::Error::ColumnNotFound(_) => {
            StoreError::Corrupt(format!("decode error in {}: {}", operation, err))
        }
        sqlx::Error::PoolClosed => StoreError::Unavailable(format!("connection pool closed in {}", operation)),
        _ => StoreError::Unavailable(format!("sqlx error in {}: {}", operation, err)),
    }
}
