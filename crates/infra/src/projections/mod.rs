//! Read projections computed on demand from the store.

pub mod question_view;

pub use question_view::{QuestionAggregate, QuestionView, ViewError};
