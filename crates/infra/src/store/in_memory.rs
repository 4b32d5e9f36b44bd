use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::Utc;

use agora_auth::ResourceRef;
use agora_core::{AnswerId, Page, QuestionId, SortOrder, UserId};
use agora_forum::{
    Answer, AnswerCount, Body, Email, NewAnswer, NewQuestion, NewUser, Question, QuestionSummary, User,
    UserUpdate,
};

use super::r#trait::{AnswerStore, QuestionSnapshot, QuestionStore, ResourceStore, StoreError, UserStore};

#[derive(Debug, Default)]
struct State {
    users: BTreeMap<UserId, User>,
    emails: HashMap<Email, UserId>,
    questions: BTreeMap<QuestionId, Question>,
    answers: BTreeMap<AnswerId, Answer>,
    likes: HashSet<(QuestionId, UserId)>,
    last_user_id: u64,
    last_question_id: u64,
    last_answer_id: u64,
}

impl State {
    fn like_count(&self, question_id: QuestionId) -> u64 {
        self.likes.iter().filter(|(q, _)| *q == question_id).count() as u64
    }
}

/// In-memory store.
///
/// Intended for tests/dev. Every operation takes the single lock exactly once,
/// so each call observes (and for writes, produces) one consistent state.
/// Uniqueness of the like pair and of e-mail addresses is decided inside the
/// write lock.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    state: RwLock<State>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, State>, StoreError> {
        self.state
            .read()
            .map_err(|_| StoreError::Unavailable("lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, State>, StoreError> {
        self.state
            .write()
            .map_err(|_| StoreError::Unavailable("lock poisoned".to_string()))
    }
}

fn paginate<T: Clone>(items: impl DoubleEndedIterator<Item = T>, page: Page) -> Vec<T> {
    let skip = usize::try_from(page.offset()).unwrap_or(usize::MAX);
    let take = page.limit as usize;
    match page.sort {
        SortOrder::Newest => items.rev().skip(skip).take(take).collect(),
        SortOrder::Oldest => items.skip(skip).take(take).collect(),
    }
}

#[async_trait]
impl ResourceStore for InMemoryStore {
    async fn get_owner(&self, resource: ResourceRef) -> Result<Option<UserId>, StoreError> {
        let state = self.read()?;
        Ok(match resource {
            ResourceRef::Question(id) => state.questions.get(&id).map(|q| q.user_id),
            ResourceRef::Answer(id) => state.answers.get(&id).map(|a| a.user_id),
        })
    }

    async fn like_exists(&self, question_id: QuestionId, user_id: UserId) -> Result<bool, StoreError> {
        Ok(self.read()?.likes.contains(&(question_id, user_id)))
    }

    async fn insert_like(&self, question_id: QuestionId, user_id: UserId) -> Result<bool, StoreError> {
        let mut state = self.write()?;
        if !state.questions.contains_key(&question_id) {
            return Err(StoreError::NotFound(format!("question {question_id}")));
        }
        if !state.users.contains_key(&user_id) {
            return Err(StoreError::NotFound(format!("user {user_id}")));
        }
        Ok(state.likes.insert((question_id, user_id)))
    }

    async fn delete_like(&self, question_id: QuestionId, user_id: UserId) -> Result<bool, StoreError> {
        Ok(self.write()?.likes.remove(&(question_id, user_id)))
    }

    async fn count_likes_for(&self, question_id: QuestionId) -> Result<u64, StoreError> {
        Ok(self.read()?.like_count(question_id))
    }

    async fn question_snapshot(
        &self,
        question_id: QuestionId,
        viewer: UserId,
    ) -> Result<Option<QuestionSnapshot>, StoreError> {
        let state = self.read()?;
        Ok(state.questions.get(&question_id).map(|q| QuestionSnapshot {
            owner: q.user_id,
            like_count: state.like_count(question_id),
            liked_by_viewer: state.likes.contains(&(question_id, viewer)),
        }))
    }
}

#[async_trait]
impl UserStore for InMemoryStore {
    async fn create_user(&self, user: NewUser) -> Result<User, StoreError> {
        let mut state = self.write()?;
        if state.emails.contains_key(&user.email) {
            return Err(StoreError::UniqueViolation(format!("email {} already registered", user.email)));
        }

        state.last_user_id += 1;
        let record = User {
            id: UserId::new(state.last_user_id),
            first_name: user.first_name,
            last_name: user.last_name,
            email: user.email,
            password_hash: user.password_hash,
        };
        state.emails.insert(record.email.clone(), record.id);
        state.users.insert(record.id, record.clone());
        Ok(record)
    }

    async fn find_user(&self, id: UserId) -> Result<Option<User>, StoreError> {
        Ok(self.read()?.users.get(&id).cloned())
    }

    async fn find_user_by_email(&self, email: &Email) -> Result<Option<User>, StoreError> {
        let state = self.read()?;
        Ok(state.emails.get(email).and_then(|id| state.users.get(id)).cloned())
    }

    async fn update_user(&self, id: UserId, update: UserUpdate) -> Result<Option<User>, StoreError> {
        let mut state = self.write()?;
        let Some(current_email) = state.users.get(&id).map(|u| u.email.clone()) else {
            return Ok(None);
        };
        if let Some(email) = &update.email {
            if state.emails.get(email).is_some_and(|owner| *owner != id) {
                return Err(StoreError::UniqueViolation(format!("email {email} already registered")));
            }
            state.emails.remove(&current_email);
            state.emails.insert(email.clone(), id);
        }

        let Some(user) = state.users.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(first_name) = update.first_name {
            user.first_name = first_name;
        }
        if let Some(last_name) = update.last_name {
            user.last_name = last_name;
        }
        if let Some(email) = update.email {
            user.email = email;
        }
        if let Some(password_hash) = update.password_hash {
            user.password_hash = password_hash;
        }
        Ok(Some(user.clone()))
    }

    async fn top_answerers(&self, limit: u32) -> Result<Vec<AnswerCount>, StoreError> {
        let state = self.read()?;
        let mut counts: HashMap<UserId, u64> = HashMap::new();
        for answer in state.answers.values() {
            *counts.entry(answer.user_id).or_default() += 1;
        }

        let mut ranked: Vec<AnswerCount> = counts
            .into_iter()
            .filter_map(|(user_id, answer_count)| {
                state.users.get(&user_id).map(|u| AnswerCount {
                    user_id,
                    first_name: u.first_name.clone(),
                    last_name: u.last_name.clone(),
                    answer_count,
                })
            })
            .collect();
        ranked.sort_by(|a, b| b.answer_count.cmp(&a.answer_count).then(a.user_id.cmp(&b.user_id)));
        ranked.truncate(limit as usize);
        Ok(ranked)
    }
}

#[async_trait]
impl QuestionStore for InMemoryStore {
    async fn insert_question(&self, question: NewQuestion) -> Result<Question, StoreError> {
        let mut state = self.write()?;
        if !state.users.contains_key(&question.user_id) {
            return Err(StoreError::NotFound(format!("user {}", question.user_id)));
        }

        state.last_question_id += 1;
        let now = Utc::now();
        let record = Question {
            id: QuestionId::new(state.last_question_id),
            body: question.body.into_string(),
            user_id: question.user_id,
            created_at: now,
            updated_at: now,
        };
        state.questions.insert(record.id, record.clone());
        Ok(record)
    }

    async fn find_question(&self, id: QuestionId) -> Result<Option<Question>, StoreError> {
        Ok(self.read()?.questions.get(&id).cloned())
    }

    async fn update_question_body(&self, id: QuestionId, body: Body) -> Result<Option<Question>, StoreError> {
        let mut state = self.write()?;
        Ok(state.questions.get_mut(&id).map(|q| {
            q.body = body.into_string();
            q.updated_at = Utc::now();
            q.clone()
        }))
    }

    async fn delete_question(&self, id: QuestionId) -> Result<bool, StoreError> {
        let mut state = self.write()?;
        if state.questions.remove(&id).is_none() {
            return Ok(false);
        }
        state.answers.retain(|_, a| a.question_id != id);
        state.likes.retain(|(q, _)| *q != id);
        Ok(true)
    }

    async fn list_questions(&self, page: Page) -> Result<Vec<Question>, StoreError> {
        let state = self.read()?;
        Ok(paginate(state.questions.values().cloned(), page))
    }

    async fn questions_by_user(&self, user_id: UserId, page: Page) -> Result<Vec<Question>, StoreError> {
        let state = self.read()?;
        let owned: Vec<Question> = state
            .questions
            .values()
            .filter(|q| q.user_id == user_id)
            .cloned()
            .collect();
        Ok(paginate(owned.into_iter(), page))
    }

    async fn most_liked_questions(&self, limit: u32) -> Result<Vec<QuestionSummary>, StoreError> {
        let state = self.read()?;
        let mut counts: HashMap<QuestionId, u64> = HashMap::new();
        for (question_id, _) in &state.likes {
            *counts.entry(*question_id).or_default() += 1;
        }

        let mut ranked: Vec<QuestionSummary> = state
            .questions
            .values()
            .map(|q| QuestionSummary {
                question: q.clone(),
                like_count: counts.get(&q.id).copied().unwrap_or(0),
            })
            .collect();
        ranked.sort_by(|a, b| {
            b.like_count
                .cmp(&a.like_count)
                .then(b.question.id.cmp(&a.question.id))
        });
        ranked.truncate(limit as usize);
        Ok(ranked)
    }
}

#[async_trait]
impl AnswerStore for InMemoryStore {
    async fn insert_answer(&self, answer: NewAnswer) -> Result<Answer, StoreError> {
        let mut state = self.write()?;
        if !state.questions.contains_key(&answer.question_id) {
            return Err(StoreError::NotFound(format!("question {}", answer.question_id)));
        }
        if !state.users.contains_key(&answer.user_id) {
            return Err(StoreError::NotFound(format!("user {}", answer.user_id)));
        }

        state.last_answer_id += 1;
        let now = Utc::now();
        let record = Answer {
            id: AnswerId::new(state.last_answer_id),
            body: answer.body.into_string(),
            question_id: answer.question_id,
            user_id: answer.user_id,
            created_at: now,
            updated_at: now,
        };
        state.answers.insert(record.id, record.clone());
        Ok(record)
    }

    async fn find_answer(&self, id: AnswerId) -> Result<Option<Answer>, StoreError> {
        Ok(self.read()?.answers.get(&id).cloned())
    }

    async fn update_answer_body(&self, id: AnswerId, body: Body) -> Result<Option<Answer>, StoreError> {
        let mut state = self.write()?;
        Ok(state.answers.get_mut(&id).map(|a| {
            a.body = body.into_string();
            a.updated_at = Utc::now();
            a.clone()
        }))
    }

    async fn delete_answer(&self, id: AnswerId) -> Result<bool, StoreError> {
        Ok(self.write()?.answers.remove(&id).is_some())
    }

    async fn list_answers(&self, page: Page) -> Result<Vec<Answer>, StoreError> {
        let state = self.read()?;
        Ok(paginate(state.answers.values().cloned(), page))
    }

    async fn answers_for_question(&self, question_id: QuestionId) -> Result<Vec<Answer>, StoreError> {
        let state = self.read()?;
        Ok(state
            .answers
            .values()
            .filter(|a| a.question_id == question_id)
            .cloned()
            .collect())
    }
}
