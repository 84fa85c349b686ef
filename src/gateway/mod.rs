//! Request execution: the orchestrating [`RequestExecutor`] and its builder.

mod builder;
pub mod executor;

pub use builder::{Huginn, HuginnBuilder};
pub use executor::{MAX_QUESTION_CHARS, RequestExecutor, validate_question};
