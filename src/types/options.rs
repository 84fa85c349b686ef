//! Completion options

use serde::{Deserialize, Serialize};

/// Default upstream model.
pub const DEFAULT_MODEL: &str = "openai/gpt-3.5-turbo";

/// Options for a one-shot completion request.
///
/// ```rust
/// # use huginn::CompletionOptions;
/// let options = CompletionOptions::default()
///     .model("anthropic/claude-sonnet-4")
///     .temperature(0.2);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionOptions {
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

impl Default for CompletionOptions {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            temperature: Some(0.7),
            max_tokens: Some(250),
        }
    }
}

impl CompletionOptions {
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn temperature(mut self, temp: f32) -> Self {
        self.temperature = Some(temp);
        self
    }

    pub fn max_tokens(mut self, max: u32) -> Self {
        self.max_tokens = Some(max);
        self
    }
}
