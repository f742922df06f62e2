use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::{CompletionOptions, LlmBackend};
use crate::config::{Config, LlmConfig};
use crate::conversation::Message;
use crate::error::{Result, ZetaError};

const GROQ_BASE_URL: &str = "https://api.groq.com/openai/v1";
const OPENROUTER_BASE_URL: &str = "https://openrouter.ai/api/v1";

/// Gateway for any OpenAI-compatible `/chat/completions` endpoint.
///
/// Groq is the default provider; OpenRouter and self-hosted servers speak
/// the same protocol and only differ in base URL.
///
/// Configuration priority (highest → lowest):
///   1. Environment variables (`GROQ_API_KEY`/`LLM_API_KEY`, `LLM_BASE_URL`, `LLM_MODEL`)
///   2. `[llm]` section of `config.toml`
///   3. Built-in provider defaults
pub struct ChatCompletionsEngine {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    top_p: f32,
    label: String,
}

// -- OpenAI-compatible request/response types ---

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
    top_p: f32,
    stream: bool,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct Usage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: Option<ErrorBody>,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

impl ChatCompletionsEngine {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let api_key = Config::llm_api_key()?;

        let (default_url, label) = match config.provider.as_str() {
            "groq" => (Some(GROQ_BASE_URL), "Groq API"),
            "openrouter" => (Some(OPENROUTER_BASE_URL), "OpenRouter API"),
            "custom" => (None, "chat completions API"),
            other => {
                return Err(ZetaError::Config(format!(
                    "unknown LLM provider \"{other}\" (expected groq, openrouter or custom)"
                )));
            }
        };

        let base_url = if config.base_url.is_empty() {
            default_url
                .map(str::to_string)
                .ok_or_else(|| ZetaError::Config("provider \"custom\" requires llm.base_url".into()))?
        } else {
            config.base_url.trim_end_matches('/').to_string()
        };

        // Per-call deadlines are enforced by the orchestrator; this is a
        // last-resort cap on a hung connection.
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1) * 2))
            .build()
            .map_err(|e| ZetaError::Config(format!("failed to create HTTP client: {e}")))?;

        info!(
            provider = %config.provider,
            model = %config.model,
            base_url = %base_url,
            "chat completions engine initialized"
        );

        Ok(Self {
            client,
            api_key,
            base_url,
            model: config.model.clone(),
            top_p: config.top_p,
            label: label.to_string(),
        })
    }
}

#[async_trait::async_trait]
impl LlmBackend for ChatCompletionsEngine {
    fn name(&self) -> &str {
        &self.label
    }

    async fn complete(
        &self,
        system_prompt: &str,
        messages: &[Message],
        options: &CompletionOptions,
    ) -> Result<String> {
        if options.stream {
            return Err(ZetaError::Llm("streaming responses are not supported".into()));
        }

        let mut wire = Vec::with_capacity(messages.len() + 1);
        wire.push(ChatMessage {
            role: "system",
            content: system_prompt,
        });
        wire.extend(messages.iter().map(|m| ChatMessage {
            role: m.role.as_str(),
            content: &m.content,
        }));

        let body = ChatRequest {
            model: &self.model,
            messages: wire,
            max_tokens: options.max_tokens,
            temperature: options.temperature,
            top_p: self.top_p,
            stream: false,
        };

        debug!(
            model = %self.model,
            messages = messages.len(),
            max_tokens = options.max_tokens,
            "invoking chat completions API"
        );

        let resp = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| ZetaError::Llm(format!("request failed: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let error_text = resp.text().await.unwrap_or_default();
            let error_msg = serde_json::from_str::<ErrorResponse>(&error_text)
                .ok()
                .and_then(|r| r.error)
                .map(|e| e.message)
                .unwrap_or(error_text);

            warn!(status = %status, error = %error_msg, "chat completions API error");
            return Err(ZetaError::Llm(format!("API returned {status}: {error_msg}")));
        }

        let chat_resp: ChatResponse = resp
            .json()
            .await
            .map_err(|e| ZetaError::Llm(format!("failed to parse response: {e}")))?;

        if let Some(ref usage) = chat_resp.usage {
            debug!(
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = usage.completion_tokens,
                "chat completions usage"
            );
        }

        let response = chat_resp
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default()
            .trim()
            .to_string();

        if response.is_empty() {
            return Err(ZetaError::Llm("provider returned empty response".into()));
        }

        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> ChatCompletionsEngine {
        ChatCompletionsEngine {
            client: Client::new(),
            api_key: "test".into(),
            base_url: "http://127.0.0.1:9".into(),
            model: "test-model".into(),
            top_p: 0.9,
            label: "test".into(),
        }
    }

    #[tokio::test]
    async fn streaming_is_rejected_before_any_request() {
        let mut options = CompletionOptions::new(0.5, 10);
        options.stream = true;
        let err = engine()
            .complete("sys", &[Message::user("hi")], &options)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("streaming"));
    }

    #[test]
    fn request_body_puts_system_prompt_first() {
        let history = [Message::user("hi"), Message::assistant("hello")];
        let mut messages = vec![ChatMessage {
            role: "system",
            content: "be brief",
        }];
        messages.extend(history.iter().map(|m| ChatMessage {
            role: m.role.as_str(),
            content: &m.content,
        }));
        let body = ChatRequest {
            model: "m",
            messages,
            max_tokens: 20,
            temperature: 0.1,
            top_p: 0.9,
            stream: false,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][2]["role"], "assistant");
        assert_eq!(json["stream"], false);
    }

    #[test]
    fn error_body_message_is_extracted() {
        let parsed: ErrorResponse =
            serde_json::from_str(r#"{"error":{"message":"rate limited","type":"x"}}"#).unwrap();
        assert_eq!(parsed.error.unwrap().message, "rate limited");
    }
}
