//! Public types for the Huginn API.

mod assistant;
mod message;
mod options;
mod response;

pub use assistant::{
    AssistantReply, DEFAULT_CONFIDENCE, Health, QueryMetrics, QueryResponse, RecommendedAction,
};
pub use message::{Message, Role};
pub use options::{CompletionOptions, DEFAULT_MODEL};
pub use response::{Completion, Usage};
