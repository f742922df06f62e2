//! Tool selection.
//!
//! Two stages with an explicit recovery edge between them:
//!
//! 1. [`IntentClassifier::ai_stage`] asks the language model for a single
//!    label.  It either produces a verdict or a [`Degraded`] cause.
//! 2. [`fallback_decision`] runs the ordered keyword rules.  It is pure and
//!    total, and only runs when the AI stage is degraded.

use std::sync::{Arc, LazyLock};
use std::time::Duration;

use regex::Regex;
use serde_json::json;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::{ClassifierConfig, LlmConfig};
use crate::conversation::Message;
use crate::feeds::slugify;
use crate::llm::{CompletionOptions, LlmBackend, prompts};
use crate::tools::{ToolName, ToolParams};

/// What the orchestrator should do with a message.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolDecision {
    NoTool,
    UseTool { tool: ToolName, params: ToolParams },
}

impl ToolDecision {
    fn use_tool(tool: ToolName, key: &str, value: &str) -> Self {
        let mut params = ToolParams::new();
        params.insert(key.to_string(), json!(value));
        ToolDecision::UseTool { tool, params }
    }

    pub fn tool(&self) -> Option<ToolName> {
        match self {
            ToolDecision::NoTool => None,
            ToolDecision::UseTool { tool, .. } => Some(*tool),
        }
    }
}

/// Answer of a healthy AI stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AiVerdict {
    Tool(ToolName),
    /// The model answered `none` or a word outside the vocabulary.
    NoTool,
}

/// Every reason the AI stage hands over to the keyword rules.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Degraded {
    #[error("AI classification is disabled")]
    Disabled,
    #[error("gateway failed: {0}")]
    Unavailable(String),
    #[error("gateway timed out after {0:?}")]
    Timeout(Duration),
}

pub struct IntentClassifier {
    llm: Arc<dyn LlmBackend>,
    prompt: String,
    options: CompletionOptions,
    ai_enabled: bool,
    timeout: Duration,
    default_city: String,
}

impl IntentClassifier {
    pub fn new(
        llm: Arc<dyn LlmBackend>,
        tool_listing: &str,
        llm_config: &LlmConfig,
        config: &ClassifierConfig,
    ) -> Self {
        Self {
            llm,
            prompt: prompts::classifier_prompt(tool_listing),
            options: CompletionOptions::new(
                llm_config.classifier_temperature,
                llm_config.classifier_max_tokens,
            ),
            ai_enabled: config.ai_enabled,
            timeout: Duration::from_secs(config.timeout_secs),
            default_city: config.default_city.clone(),
        }
    }

    /// Decide on a tool.  Never fails.
    pub async fn classify(&self, message: &str) -> ToolDecision {
        match self.ai_stage(message).await {
            Ok(AiVerdict::Tool(tool)) => {
                debug!(tool = %tool, "AI classifier picked a tool");
                params_for(tool, message, &self.default_city)
            }
            Ok(AiVerdict::NoTool) => {
                debug!("AI classifier picked no tool");
                ToolDecision::NoTool
            }
            Err(cause) => {
                if cause != Degraded::Disabled {
                    warn!(cause = %cause, "AI classifier degraded, using keyword rules");
                }
                let decision = fallback_decision(message, &self.default_city);
                debug!(tool = ?decision.tool(), "keyword rules decided");
                decision
            }
        }
    }

    pub async fn ai_stage(&self, message: &str) -> Result<AiVerdict, Degraded> {
        if !self.ai_enabled {
            return Err(Degraded::Disabled);
        }
        let messages = [Message::user(message)];
        let call = self.llm.complete(&self.prompt, &messages, &self.options);
        let raw = match tokio::time::timeout(self.timeout, call).await {
            Ok(Ok(raw)) => raw,
            Ok(Err(e)) => return Err(Degraded::Unavailable(e.to_string())),
            Err(_) => return Err(Degraded::Timeout(self.timeout)),
        };
        Ok(parse_label(&raw))
    }
}

/// Trim, lower-case and strip wrapping quotes or a final period, then match
/// exactly against the vocabulary.  Anything else, `none` included, is no tool.
pub fn parse_label(raw: &str) -> AiVerdict {
    let label = raw
        .trim()
        .to_lowercase()
        .trim_matches(|c: char| matches!(c, '"' | '\'' | '`' | '.'))
        .to_string();
    if label == "none" {
        return AiVerdict::NoTool;
    }
    match label.parse::<ToolName>() {
        Ok(tool) => AiVerdict::Tool(tool),
        Err(_) => {
            warn!(label = %raw.trim(), "AI classifier returned an unknown label, using no tool");
            AiVerdict::NoTool
        }
    }
}

/// Parameters for a tool picked by the model.
fn params_for(tool: ToolName, message: &str, default_city: &str) -> ToolDecision {
    let message = message.trim();
    match tool {
        ToolName::Weather => {
            ToolDecision::use_tool(tool, "city", &extract_city(message, default_city))
        }
        ToolName::Calculator => ToolDecision::use_tool(tool, "expression", message),
        ToolName::Wikipedia => {
            let term = lookup_term(message).unwrap_or_else(|| message.to_string());
            ToolDecision::use_tool(tool, "query", &term)
        }
        ToolName::WebSearch | ToolName::SportsOdds => ToolDecision::use_tool(tool, "query", message),
    }
}

// -- Keyword rules --------------------------------------------------------

struct Rule {
    name: &'static str,
    decide: fn(&RuleInput<'_>) -> Option<ToolDecision>,
}

struct RuleInput<'a> {
    message: &'a str,
    lower: String,
    default_city: &'a str,
}

/// Evaluated top to bottom; the first rule that returns a decision wins.
const RULES: &[Rule] = &[
    Rule {
        name: "weather",
        decide: weather_rule,
    },
    Rule {
        name: "sports",
        decide: sports_rule,
    },
    Rule {
        name: "knowledge",
        decide: knowledge_rule,
    },
    Rule {
        name: "search",
        decide: search_rule,
    },
    Rule {
        name: "calculator",
        decide: calculator_rule,
    },
];

/// Deterministic tool choice from keywords alone.
pub fn fallback_decision(message: &str, default_city: &str) -> ToolDecision {
    let input = RuleInput {
        message: message.trim(),
        lower: message.trim().to_lowercase(),
        default_city,
    };
    RULES
        .iter()
        .find_map(|rule| {
            let decision = (rule.decide)(&input)?;
            debug!(rule = rule.name, "keyword rule matched");
            Some(decision)
        })
        .unwrap_or(ToolDecision::NoTool)
}

const WEATHER_WORDS: &[&str] = &["weather", "forecast", "hava", "havadurumu"];
const TEMPERATURE_WORDS: &[&str] = &["temperature", "degrees", "sıcaklık", "derece"];
const DAY_WORDS: &[&str] = &[
    "today", "tonight", "tomorrow", "now", "bugün", "bugünkü", "yarın", "şimdi", "hafta",
];
/// Phrases that share a root with the weather vocabulary but mean
/// something else ("hava yolları" is an airline, a sampling temperature
/// belongs to a language model).
const WEATHER_EXCLUSIONS: &[&str] = &[
    "sampling temperature",
    "temperature parameter",
    "temperature setting",
    "model temperature",
    "llm temperature",
    "softmax",
    "top_p",
    "hava yolları",
    "hava kirliliği",
    "hava kuvvetleri",
    "hava limanı",
];

fn tokens(lower: &str) -> Vec<&str> {
    lower
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .collect()
}

fn weather_rule(input: &RuleInput<'_>) -> Option<ToolDecision> {
    if WEATHER_EXCLUSIONS.iter().any(|e| input.lower.contains(e)) {
        return None;
    }
    let tokens = tokens(&input.lower);
    let has = |words: &[&str]| tokens.iter().any(|t| words.contains(t));
    let has_prefix = |words: &[&str]| tokens.iter().any(|t| words.iter().any(|w| t.starts_with(w)));

    let explicit = has(WEATHER_WORDS);
    let temperature_today = has_prefix(TEMPERATURE_WORDS) && has(DAY_WORDS);
    if !(explicit || temperature_today) {
        return None;
    }
    Some(ToolDecision::use_tool(
        ToolName::Weather,
        "city",
        &extract_city(input.message, input.default_city),
    ))
}

/// City patterns, most specific first.  Group 1 is the candidate.
static CITY_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)\b(?:weather|forecast|temperature)\s+(?:in|for|at)\s+(\p{L}+)",
        r"(?i)\b(?:in|for|at)\s+(\p{L}+)",
        r"(?i)(\p{L}+)(?:['’]\p{L}+)?\s+(?:weather|forecast|temperature|hava|sıcaklık)",
        r"(\p{Lu}\p{L}+)['’](?:da|de|ta|te)\b",
        r"(?i)\b(?:hava|sıcaklık)\s+(\p{L}+)",
    ]
    .into_iter()
    .map(|p| Regex::new(p).expect("city regex is valid"))
    .collect()
});

/// Words that sit where a city name would but are not one.
const NOT_A_CITY: &[&str] = &[
    "the", "a", "what", "what's", "whats", "how", "is", "today", "today's", "tomorrow", "tonight",
    "now", "this", "next", "current", "local", "my", "weather", "forecast", "bugün", "bugünkü",
    "yarın", "yarınki", "şimdi", "nasıl", "durumu", "hava", "sıcaklık", "kaç", "derece", "ne",
    "bu", "güzel", "iyi",
];

/// Pick a city out of a weather question, or `default_city`.
pub fn extract_city(message: &str, default_city: &str) -> String {
    CITY_PATTERNS
        .iter()
        .flat_map(|re| re.captures_iter(message))
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str())
        .find(|candidate| !NOT_A_CITY.contains(&candidate.to_lowercase().as_str()))
        .map(str::to_string)
        .unwrap_or_else(|| default_city.to_string())
}

/// ASCII-folded so "Beşiktaş" and "besiktas" both match.  No bare "maç":
/// "Maçka" is a neighbourhood.
const SPORTS_KEYWORDS: &[&str] = &[
    "galatasaray",
    "fenerbahce",
    "besiktas",
    "trabzonspor",
    "super lig",
    "puan durumu",
    "golcu",
    "canli mac",
    "mac sonucu",
    "iddaa",
    "premier league",
    "champions league",
    "sampiyonlar ligi",
    "standings",
    "top scorer",
    "match odds",
    "betting odds",
];

fn sports_rule(input: &RuleInput<'_>) -> Option<ToolDecision> {
    let folded = slugify(input.message);
    SPORTS_KEYWORDS
        .iter()
        .any(|k| folded.contains(k))
        .then(|| ToolDecision::use_tool(ToolName::SportsOdds, "query", input.message))
}

static LOOKUP_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?:what\s+is|what's|what\s+are|who\s+is|who\s+was|tell\s+me\s+about)\s+")
        .expect("lookup prefix regex is valid")
});
static LOOKUP_SUFFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\s*\b(?:nedir|kimdir|ne\s+demek)\s*[?.!]*$").expect("lookup suffix regex is valid")
});
static LOOKUP_ABOUT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\s*\bhakkında\b\s*").expect("lookup about regex is valid"));

/// The subject of a "what is X" / "X nedir" / "X hakkında" question.
///
/// `None` when no trigger is present, the remaining term is too short, or
/// the term is plain arithmetic ("what is 2 + 2").
pub fn lookup_term(message: &str) -> Option<String> {
    let message = message.trim();
    let stripped = if LOOKUP_PREFIX.is_match(message) {
        LOOKUP_PREFIX.replace(message, "")
    } else if LOOKUP_SUFFIX.is_match(message) {
        LOOKUP_SUFFIX.replace(message, "")
    } else if LOOKUP_ABOUT.is_match(message) {
        LOOKUP_ABOUT.replace_all(message, " ")
    } else {
        return None;
    };

    let term = stripped
        .trim()
        .trim_end_matches(['?', '.', '!'])
        .trim()
        .to_string();
    if term.chars().count() <= 2 || is_arithmetic(&term) {
        return None;
    }
    Some(term)
}

fn is_arithmetic(term: &str) -> bool {
    term.chars().any(|c| c.is_ascii_digit())
        && term.chars().all(|c| {
            c.is_ascii_digit() || c.is_whitespace() || "+-*/×÷xX().,".contains(c)
        })
}

fn knowledge_rule(input: &RuleInput<'_>) -> Option<ToolDecision> {
    let term = lookup_term(input.message)?;
    Some(ToolDecision::use_tool(ToolName::Wikipedia, "query", &term))
}

const SEARCH_KEYWORDS: &[&str] = &[
    "search",
    "look up",
    "google",
    "latest",
    "news",
    "current price",
    "araştır",
    "güncel",
    "haber",
    "son dakika",
    "internette",
];

fn search_rule(input: &RuleInput<'_>) -> Option<ToolDecision> {
    SEARCH_KEYWORDS
        .iter()
        .any(|k| input.lower.contains(k))
        .then(|| ToolDecision::use_tool(ToolName::WebSearch, "query", input.message))
}

static ARITHMETIC: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\d+\s*(?:[+\-*/×÷]|\s[xX]\s)\s*\d+").expect("arithmetic regex is valid")
});

fn calculator_rule(input: &RuleInput<'_>) -> Option<ToolDecision> {
    ARITHMETIC
        .is_match(input.message)
        .then(|| ToolDecision::use_tool(ToolName::Calculator, "expression", input.message))
}
