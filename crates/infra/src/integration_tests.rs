//! Integration tests for the authorization and like pipeline.
//!
//! Tests: TokenService → AuthorizationGate → Store ← LikeLedger / QuestionView
//!
//! Verifies:
//! - Ownership is re-read from the store on every decision
//! - Likes and the question page agree
//! - Deleting a question takes its likes along

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Duration;

    use agora_auth::{AuthorizationGate, AuthzError, Identity, ResourceRef, TokenService};
    use agora_core::{QuestionId, UserId};
    use agora_forum::{Body, NewAnswer, NewQuestion, Registration};

    use crate::likes::LikeLedger;
    use crate::projections::{QuestionView, ViewError};
    use crate::store::{AnswerStore, InMemoryStore, QuestionStore, StoreOwnership, UserStore};

    struct Harness {
        tokens: TokenService,
        store: Arc<InMemoryStore>,
        gate: AuthorizationGate<StoreOwnership<Arc<InMemoryStore>>>,
        likes: LikeLedger<Arc<InMemoryStore>>,
        view: QuestionView<Arc<InMemoryStore>>,
    }

    impl Harness {
        async fn new() -> Self {
            let store = Arc::new(InMemoryStore::new());
            for email in ["ann@example.com", "bob@example.com"] {
                let reg = Registration::parse("Test", "User", email, "password1").unwrap();
                store.create_user(reg.into_new_user("hash".to_string())).await.unwrap();
            }
            Self {
                tokens: TokenService::new("pipeline-tests", Duration::minutes(10)),
                gate: AuthorizationGate::new(StoreOwnership(store.clone())),
                likes: LikeLedger::new(store.clone()),
                view: QuestionView::new(store.clone()),
                store,
            }
        }

        fn login(&self, user: u64) -> Identity {
            let token = self.tokens.sign(UserId::new(user)).unwrap();
            self.tokens.validate(&token).unwrap()
        }

        async fn ask(&self, owner: u64, body: &str) -> QuestionId {
            self.store
                .insert_question(NewQuestion {
                    body: Body::parse(body).unwrap(),
                    user_id: UserId::new(owner),
                })
                .await
                .unwrap()
                .id
        }
    }

    #[tokio::test]
    async fn owner_can_edit_and_others_cannot() {
        let h = Harness::new().await;
        let q = h.ask(1, "who owns this?").await;
        let (ann, bob) = (h.login(1), h.login(2));

        assert!(h.gate.can_edit(&ann, ResourceRef::Question(q)).await.unwrap());
        assert!(!h.gate.can_edit(&bob, ResourceRef::Question(q)).await.unwrap());

        let err = h.gate.authorize_edit(&bob, ResourceRef::Question(q)).await.unwrap_err();
        assert!(matches!(err, AuthzError::Denied(ResourceRef::Question(id)) if id == q));
    }

    #[tokio::test]
    async fn answer_ownership_is_independent_of_question_ownership() {
        let h = Harness::new().await;
        let q = h.ask(1, "question by ann").await;
        let answer = h
            .store
            .insert_answer(NewAnswer {
                body: Body::parse("answer by bob").unwrap(),
                question_id: q,
                user_id: UserId::new(2),
            })
            .await
            .unwrap();

        let target = ResourceRef::Answer(answer.id);
        assert!(h.gate.can_edit(&h.login(2), target).await.unwrap());
        assert!(!h.gate.can_edit(&h.login(1), target).await.unwrap());
    }

    #[tokio::test]
    async fn deleted_question_is_no_longer_editable_by_anyone() {
        let h = Harness::new().await;
        let q = h.ask(1, "short lived").await;
        let ann = h.login(1);

        assert!(h.gate.can_edit(&ann, ResourceRef::Question(q)).await.unwrap());
        h.store.delete_question(q).await.unwrap();
        assert!(!h.gate.can_edit(&ann, ResourceRef::Question(q)).await.unwrap());
    }

    #[tokio::test]
    async fn likes_flow_into_the_question_page() {
        let h = Harness::new().await;
        let q = h.ask(1, "worth a like?").await;
        let bob = h.login(2);

        h.likes.add_like(q, bob.user_id()).await.unwrap();
        h.likes.add_like(q, bob.user_id()).await.unwrap();

        let page = h.view.compose(q, &bob).await.unwrap();
        assert_eq!(page.like_count, 1);
        assert!(page.liked_by_current_user);
        assert!(!page.editable_by_current_user);

        h.likes.remove_like(q, bob.user_id()).await.unwrap();
        let page = h.view.compose(q, &bob).await.unwrap();
        assert_eq!(page.like_count, 0);
        assert!(!page.liked_by_current_user);
    }

    #[tokio::test]
    async fn deleting_a_question_drops_its_page_and_likes() {
        let h = Harness::new().await;
        let q = h.ask(1, "going away").await;
        let bob = h.login(2);
        h.likes.add_like(q, bob.user_id()).await.unwrap();

        h.store.delete_question(q).await.unwrap();

        assert_eq!(h.view.compose(q, &bob).await.unwrap_err(), ViewError::NoSuchQuestion(q));
        assert_eq!(h.likes.count_likes(q).await.unwrap(), 0);
        assert!(!h.likes.is_liked_by(q, bob.user_id()).await.unwrap());
    }
}
