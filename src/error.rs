use thiserror::Error;

#[derive(Error, Debug)]
pub enum ZetaError {
    #[error("config error: {0}")]
    Config(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("LLM error: {0}")]
    Llm(String),

    #[error("timed out after {0}s: {1}")]
    Timeout(u64, String),

    #[error("tool not found: {0}")]
    ToolNotFound(String),

    #[error("tool execution error: {0}")]
    ToolExecution(String),

    #[error("upstream {service} returned {status}")]
    Upstream { service: String, status: u16 },
}

pub type Result<T> = std::result::Result<T, ZetaError>;
