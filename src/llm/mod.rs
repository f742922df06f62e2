pub mod prompts;

mod chat_completions;

use std::sync::Arc;

use tracing::info;

use crate::config::Config;
use crate::conversation::Message;
use crate::error::Result;

pub use chat_completions::ChatCompletionsEngine;

/// Sampling options for one completion call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompletionOptions {
    /// 0.0 (deterministic) to 1.0.
    pub temperature: f32,
    pub max_tokens: u32,
    pub stream: bool,
}

impl CompletionOptions {
    pub fn new(temperature: f32, max_tokens: u32) -> Self {
        Self {
            temperature: temperature.clamp(0.0, 1.0),
            max_tokens,
            stream: false,
        }
    }
}

/// Trait that all language-model gateways implement.
///
/// Implementations must be safe to share between concurrent requests;
/// the orchestrator holds one `Arc<dyn LlmBackend>` for its whole lifetime.
#[async_trait::async_trait]
pub trait LlmBackend: Send + Sync {
    /// Human-readable name of this backend (e.g. "Groq API").
    fn name(&self) -> &str;

    /// Generate a reply for `messages` under `system_prompt`.
    async fn complete(
        &self,
        system_prompt: &str,
        messages: &[Message],
        options: &CompletionOptions,
    ) -> Result<String>;
}

/// Build the configured gateway.
pub fn build_backend(config: &Config) -> Result<Arc<dyn LlmBackend>> {
    let engine = ChatCompletionsEngine::new(&config.llm)?;
    info!(backend = engine.name(), "LLM backend selected");
    Ok(Arc::new(engine))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn options_clamp_temperature() {
        assert!((CompletionOptions::new(1.7, 10).temperature - 1.0).abs() < f32::EPSILON);
        assert!(CompletionOptions::new(-0.3, 10).temperature.abs() < f32::EPSILON);
        assert!(!CompletionOptions::new(0.5, 10).stream);
    }
}
