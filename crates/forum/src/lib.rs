//! Forum domain module.
//!
//! Records and validated inputs for users, questions and answers, implemented
//! purely as deterministic domain logic (no IO, no HTTP, no storage).

pub mod answer;
pub mod question;
pub mod text;
pub mod user;

pub use answer::{Answer, NewAnswer};
pub use question::{NewQuestion, Question, QuestionSummary};
pub use text::Body;
pub use user::{AnswerCount, Email, NewUser, ProfileUpdate, Registration, User, UserUpdate};
