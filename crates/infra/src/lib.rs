//! Infrastructure layer: stores, the like ledger, read projections, config.

pub mod config;
pub mod likes;
pub mod projections;
pub mod store;

#[cfg(test)]
mod integration_tests;

pub use config::{AppConfig, ConfigError, DatabaseConfig, MAX_TOKEN_TTL_MINUTES};
pub use likes::LikeLedger;
pub use projections::{QuestionAggregate, QuestionView, ViewError};
pub use store::{
    AnswerStore, ForumStore, InMemoryStore, PostgresStore, QuestionSnapshot, QuestionStore, ResourceStore,
    StoreError, StoreOwnership, UserStore,
};
