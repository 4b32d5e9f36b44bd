//! Persistence boundary for users, posts and the like relation.
//!
//! The traits make no storage assumptions; `InMemoryStore` backs tests/dev and
//! `PostgresStore` backs production.

pub mod in_memory;
pub mod postgres;
pub mod r#trait;

pub use in_memory::InMemoryStore;
pub use postgres::PostgresStore;
pub use r#trait::{
    AnswerStore, ForumStore, QuestionSnapshot, QuestionStore, ResourceStore, StoreError, StoreOwnership,
    UserStore,
};
