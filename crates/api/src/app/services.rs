//! Service wiring shared by every handler.

use std::sync::Arc;

use agora_auth::{AuthorizationGate, TokenService};
use agora_infra::{ForumStore, InMemoryStore, LikeLedger, QuestionView, StoreOwnership};

pub type SharedStore = Arc<dyn ForumStore>;

/// Everything a request handler may use.
///
/// All members are cheap handles onto the same store; the signing key inside
/// `tokens` is fixed for the life of the process.
#[derive(Clone)]
pub struct AppServices {
    pub store: SharedStore,
    pub tokens: Arc<TokenService>,
    pub gate: AuthorizationGate<StoreOwnership<SharedStore>>,
    pub likes: LikeLedger<SharedStore>,
    pub view: QuestionView<SharedStore>,
}

impl AppServices {
    pub fn new(store: SharedStore, tokens: TokenService) -> Self {
        Self {
            gate: AuthorizationGate::new(StoreOwnership(store.clone())),
            likes: LikeLedger::new(store.clone()),
            view: QuestionView::new(store.clone()),
            tokens: Arc::new(tokens),
            store,
        }
    }

    /// Services backed by a fresh in-memory store (dev/test).
    pub fn in_memory(tokens: TokenService) -> Self {
        Self::new(Arc::new(InMemoryStore::new()), tokens)
    }
}
