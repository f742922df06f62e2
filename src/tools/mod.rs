pub mod cache;
pub mod calculator;
pub mod sports;
pub mod weather;
pub mod web;

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{Result, ZetaError};
use cache::TtlCache;

/// Parameters handed to a tool, e.g. `{"city": "Istanbul"}`.
pub type ToolParams = serde_json::Map<String, serde_json::Value>;

/// The fixed tool vocabulary.  Nothing outside this set can be selected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolName {
    WebSearch,
    Wikipedia,
    Weather,
    SportsOdds,
    Calculator,
}

impl ToolName {
    pub const ALL: [ToolName; 5] = [
        ToolName::WebSearch,
        ToolName::Wikipedia,
        ToolName::Weather,
        ToolName::SportsOdds,
        ToolName::Calculator,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ToolName::WebSearch => "web_search",
            ToolName::Wikipedia => "wikipedia",
            ToolName::Weather => "weather",
            ToolName::SportsOdds => "sports_odds",
            ToolName::Calculator => "calculator",
        }
    }
}

impl fmt::Display for ToolName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ToolName {
    type Err = ZetaError;

    /// Exact match against the wire names; callers normalise first.
    fn from_str(s: &str) -> Result<Self> {
        ToolName::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| ZetaError::ToolNotFound(s.to_string()))
    }
}

/// Normalised outcome of a tool call.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ToolResult {
    Success { data: serde_json::Value },
    Failure { error: String },
}

impl ToolResult {
    pub fn failure(error: impl Into<String>) -> Self {
        ToolResult::Failure {
            error: error.into(),
        }
    }
}

/// Shared context passed to tools during execution.
#[derive(Clone)]
pub struct ToolContext {
    pub http_client: reqwest::Client,
}

/// The trait all tools implement.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> ToolName;

    /// Human-readable description for the classifier prompt.
    fn description(&self) -> &str;

    /// Whether successful results may be served from the registry cache.
    fn cacheable(&self) -> bool {
        true
    }

    /// Run against the upstream service.  Any error becomes a failed
    /// [`ToolResult`] in the registry.
    async fn run(&self, params: &ToolParams, ctx: &ToolContext) -> Result<serde_json::Value>;
}

/// Registry of all available tools.
///
/// Owns the result cache and enforces the per-call timeout so that no
/// upstream failure mode escapes as anything but [`ToolResult::Failure`].
pub struct ToolRegistry {
    tools: HashMap<ToolName, Box<dyn Tool>>,
    ctx: ToolContext,
    timeout: Duration,
    cache: TtlCache<serde_json::Value>,
}

impl ToolRegistry {
    pub fn new(ctx: ToolContext, timeout: Duration, cache_ttl: Duration) -> Self {
        Self {
            tools: HashMap::new(),
            ctx,
            timeout,
            cache: TtlCache::new(cache_ttl),
        }
    }

    /// Register a tool. Panics on duplicate names.
    pub fn register(&mut self, tool: Box<dyn Tool>) {
        let name = tool.name();
        assert!(!self.tools.contains_key(&name), "duplicate tool name: {name}");
        self.tools.insert(name, tool);
    }

    /// Registered tools in vocabulary order.
    pub fn names(&self) -> Vec<ToolName> {
        ToolName::ALL
            .into_iter()
            .filter(|n| self.tools.contains_key(n))
            .collect()
    }

    /// Compact "- name: description" listing for prompts.
    pub fn schema_for_prompt(&self) -> String {
        let mut out = String::new();
        for name in self.names() {
            if let Some(tool) = self.tools.get(&name) {
                out.push_str(&format!("- {}: {}\n", name, tool.description()));
            }
        }
        out
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Execute a tool by wire name.  Never fails: unknown names, upstream
    /// errors and timeouts all come back as [`ToolResult::Failure`].
    pub async fn execute(&self, name: &str, params: &ToolParams) -> ToolResult {
        let Some(tool) = name.parse::<ToolName>().ok().and_then(|n| self.tools.get(&n)) else {
            warn!(tool = name, "unknown tool requested");
            return ToolResult::failure("unknown tool");
        };

        let cache_key = tool
            .cacheable()
            .then(|| cache_key(tool.name(), params));
        if let Some(ref key) = cache_key {
            if let Some(data) = self.cache.get(key, Instant::now()) {
                debug!(tool = name, "tool result served from cache");
                return ToolResult::Success { data };
            }
        }

        let started = Instant::now();
        let outcome = tokio::time::timeout(self.timeout, tool.run(params, &self.ctx)).await;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        match outcome {
            Ok(Ok(data)) => {
                info!(tool = name, elapsed_ms, "tool succeeded");
                if let Some(key) = cache_key {
                    let now = Instant::now();
                    self.cache.put(key, data.clone(), now);
                    let purged = self.cache.purge_expired(now);
                    if purged > 0 {
                        debug!(purged, cached = self.cache.len(), "expired tool results dropped");
                    }
                }
                ToolResult::Success { data }
            }
            Ok(Err(e)) => {
                warn!(tool = name, elapsed_ms, error = %e, "tool failed");
                ToolResult::failure(e.to_string())
            }
            Err(_) => {
                let err = ZetaError::Timeout(self.timeout.as_secs(), format!("tool {name}"));
                warn!(tool = name, elapsed_ms, "tool timed out");
                ToolResult::failure(err.to_string())
            }
        }
    }
}

/// `serde_json::Map` iterates in key order, so equal params give equal keys.
fn cache_key(tool: ToolName, params: &ToolParams) -> String {
    let canonical = serde_json::Value::Object(params.clone()).to_string();
    format!("{tool}:{}", canonical.to_lowercase())
}

/// Read a required, non-empty string parameter.
pub fn required_str<'a>(params: &'a ToolParams, key: &str) -> Result<&'a str> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ZetaError::ToolExecution(format!("{key} is required")))
}
