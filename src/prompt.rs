//! System prompt loading.

use std::path::PathBuf;

use async_trait::async_trait;

use crate::{HuginnError, Result};

/// Name of the bundled customer-support prompt.
pub const DEFAULT_PROMPT: &str = "customer-support";

/// Source of named system prompts.
#[async_trait]
pub trait PromptSource: Send + Sync {
    /// Load the prompt called `name`, ready to send as a system message.
    async fn load(&self, name: &str) -> Result<String>;
}

/// Reads `{dir}/{name}.prompt.txt` and wraps it in `<system-rules>` tags.
#[derive(Debug, Clone)]
pub struct DirPromptSource {
    dir: PathBuf,
}

impl DirPromptSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Path of the file backing prompt `name`.
    pub fn path_for(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.prompt.txt"))
    }
}

impl Default for DirPromptSource {
    fn default() -> Self {
        Self::new("prompts")
    }
}

#[async_trait]
impl PromptSource for DirPromptSource {
    async fn load(&self, name: &str) -> Result<String> {
        // Names are plain identifiers, never paths.
        if name.is_empty() || name.contains(['/', '\\']) || name.contains("..") {
            return Err(HuginnError::PromptNotFound(name.to_string()));
        }
        let path = self.path_for(name);
        let content = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| HuginnError::PromptNotFound(format!("{}: {e}", path.display())))?;
        Ok(wrap_rules(&content))
    }
}

/// A fixed prompt, returned for every name.
#[derive(Debug, Clone)]
pub struct StaticPrompt(String);

impl StaticPrompt {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }
}

#[async_trait]
impl PromptSource for StaticPrompt {
    async fn load(&self, _name: &str) -> Result<String> {
        Ok(wrap_rules(&self.0))
    }
}

fn wrap_rules(content: &str) -> String {
    format!("<system-rules>{content}</system-rules>")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn dir_source_wraps_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("support.prompt.txt"), "Be brief.").unwrap();

        let source = DirPromptSource::new(dir.path());
        let prompt = source.load("support").await.unwrap();
        assert_eq!(prompt, "<system-rules>Be brief.</system-rules>");
    }

    #[tokio::test]
    async fn missing_prompt_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let source = DirPromptSource::new(dir.path());
        let err = source.load("absent").await.unwrap_err();
        assert!(matches!(err, HuginnError::PromptNotFound(_)));
    }

    #[tokio::test]
    async fn path_like_names_are_rejected() {
        let source = DirPromptSource::default();
        let err = source.load("../secrets").await.unwrap_err();
        assert!(matches!(err, HuginnError::PromptNotFound(_)));
    }

    #[tokio::test]
    async fn static_prompt_ignores_name() {
        let prompt = StaticPrompt::new("rules").load("anything").await.unwrap();
        assert_eq!(prompt, "<system-rules>rules</system-rules>");
    }
}
