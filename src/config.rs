use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::error::{Result, ZetaError};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_assistant_name")]
    pub assistant_name: String,

    /// Address the HTTP surface listens on.  Overridable with `ZETA_BIND`.
    #[serde(default = "default_bind")]
    pub bind: String,

    /// Reply language used when nothing can be detected from the message
    /// (ISO 639-1 tag, e.g. "tr").
    #[serde(default = "default_language")]
    pub default_language: String,

    #[serde(default)]
    pub llm: LlmConfig,

    #[serde(default)]
    pub classifier: ClassifierConfig,

    #[serde(default)]
    pub context: ContextConfig,

    #[serde(default)]
    pub tools: ToolsConfig,

    #[serde(default)]
    pub safety: SafetyConfig,
}

// -- LLM -----------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct LlmConfig {
    /// "groq", "openrouter" or "custom" (requires `base_url`).
    #[serde(default = "default_provider")]
    pub provider: String,

    /// Overrides the provider's default endpoint.  Env: `LLM_BASE_URL`.
    #[serde(default)]
    pub base_url: String,

    /// Env: `LLM_MODEL`.
    #[serde(default = "default_model")]
    pub model: String,

    /// Timeout for the final response generation call.
    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_top_p")]
    pub top_p: f32,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    #[serde(default = "default_classifier_temperature")]
    pub classifier_temperature: f32,

    #[serde(default = "default_classifier_max_tokens")]
    pub classifier_max_tokens: u32,
}

// -- Classifier ----------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct ClassifierConfig {
    /// When false only the keyword rules are used.
    #[serde(default = "default_true")]
    pub ai_enabled: bool,

    #[serde(default = "default_classifier_timeout_secs")]
    pub timeout_secs: u64,

    /// City used for weather requests that do not name one.
    #[serde(default = "default_city")]
    pub default_city: String,
}

// -- Context -------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct ContextConfig {
    #[serde(default = "default_context_max_messages")]
    pub max_messages: usize,

    #[serde(default = "default_context_max_message_chars")]
    pub max_message_chars: usize,
}

// -- Tools ---------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct ToolsConfig {
    #[serde(default = "default_tool_timeout_secs")]
    pub timeout_secs: u64,

    /// How long successful tool results are reused.  0 disables caching.
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,

    #[serde(default = "default_web_max_results")]
    pub web_max_results: usize,

    #[serde(default = "default_language")]
    pub wikipedia_language: String,
}

// -- Safety --------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct SafetyConfig {
    #[serde(default = "default_safety_max_message_chars")]
    pub max_message_chars: usize,

    /// Case-insensitive terms that block a message outright.
    #[serde(default)]
    pub blocked_terms: Vec<String>,

    /// Block messages that carry credentials or card numbers.
    #[serde(default = "default_true")]
    pub block_secrets: bool,
}

fn default_assistant_name() -> String {
    "Zeta".to_string()
}
fn default_bind() -> String {
    "127.0.0.1:3001".to_string()
}
fn default_language() -> String {
    "tr".to_string()
}
fn default_provider() -> String {
    "groq".to_string()
}
fn default_model() -> String {
    "llama-3.3-70b-versatile".to_string()
}
fn default_llm_timeout_secs() -> u64 {
    30
}
fn default_temperature() -> f32 {
    0.7
}
fn default_top_p() -> f32 {
    0.9
}
fn default_max_tokens() -> u32 {
    1000
}
fn default_classifier_temperature() -> f32 {
    0.1
}
fn default_classifier_max_tokens() -> u32 {
    20
}
fn default_true() -> bool {
    true
}
fn default_classifier_timeout_secs() -> u64 {
    8
}
fn default_city() -> String {
    "Istanbul".to_string()
}
fn default_context_max_messages() -> usize {
    10
}
fn default_context_max_message_chars() -> usize {
    2000
}
fn default_tool_timeout_secs() -> u64 {
    10
}
fn default_cache_ttl_secs() -> u64 {
    300
}
fn default_web_max_results() -> usize {
    5
}
fn default_safety_max_message_chars() -> usize {
    4000
}

// -- Default impls -------------------------------------------------------

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            base_url: String::new(),
            model: default_model(),
            timeout_secs: default_llm_timeout_secs(),
            temperature: default_temperature(),
            top_p: default_top_p(),
            max_tokens: default_max_tokens(),
            classifier_temperature: default_classifier_temperature(),
            classifier_max_tokens: default_classifier_max_tokens(),
        }
    }
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            ai_enabled: true,
            timeout_secs: default_classifier_timeout_secs(),
            default_city: default_city(),
        }
    }
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            max_messages: default_context_max_messages(),
            max_message_chars: default_context_max_message_chars(),
        }
    }
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_tool_timeout_secs(),
            cache_ttl_secs: default_cache_ttl_secs(),
            web_max_results: default_web_max_results(),
            wikipedia_language: default_language(),
        }
    }
}

impl Default for SafetyConfig {
    fn default() -> Self {
        Self {
            max_message_chars: default_safety_max_message_chars(),
            blocked_terms: Vec::new(),
            block_secrets: true,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            assistant_name: default_assistant_name(),
            bind: default_bind(),
            default_language: default_language(),
            llm: LlmConfig::default(),
            classifier: ClassifierConfig::default(),
            context: ContextConfig::default(),
            tools: ToolsConfig::default(),
            safety: SafetyConfig::default(),
        }
    }
}

// -- Config impl ---------------------------------------------------------

impl Config {
    /// Load config from the given path, or the default XDG config location.
    /// Environment overrides are applied on top of the file.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::default_config_path(),
        };

        let mut config = if config_path.exists() {
            info!("loading config from {}", config_path.display());
            let contents = std::fs::read_to_string(&config_path)?;
            toml::from_str(&contents)
                .map_err(|e| ZetaError::Config(format!("parse error: {e}")))?
        } else {
            info!("no config file found, using defaults");
            Config::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Some(bind) = non_empty_env("ZETA_BIND") {
            self.bind = bind;
        }
        if let Some(url) = non_empty_env("LLM_BASE_URL") {
            self.llm.base_url = url;
        }
        if let Some(model) = non_empty_env("LLM_MODEL") {
            self.llm.model = model;
        }
    }

    /// Returns the default config file path: `$XDG_CONFIG_HOME/zeta-agent/config.toml`
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join("zeta-agent")
            .join("config.toml")
    }

    /// API key for the language-model provider.  `GROQ_API_KEY` wins over
    /// the generic `LLM_API_KEY`.
    pub fn llm_api_key() -> Result<String> {
        non_empty_env("GROQ_API_KEY")
            .or_else(|| non_empty_env("LLM_API_KEY"))
            .ok_or_else(|| {
                ZetaError::Config("GROQ_API_KEY or LLM_API_KEY environment variable not set".into())
            })
    }

    /// Optional key for an external data API; tools report a failure at
    /// call time when it is missing.
    pub fn api_key(var: &str) -> Option<String> {
        non_empty_env(var)
    }

    /// Generate the default config file contents.
    pub fn default_config_contents() -> &'static str {
        include_str!("../config.example.toml")
    }
}

fn non_empty_env(var: &str) -> Option<String> {
    std::env::var(var).ok().filter(|v| !v.trim().is_empty())
}
