mod config;
mod conversation;
mod error;
mod feeds;
mod language;
mod llm;
mod orchestrator;
mod security;
mod server;
mod tools;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::feeds::Feeds;
use crate::orchestrator::Orchestrator;
use crate::security::PolicyFilter;
use crate::server::AppState;
use crate::tools::ToolRegistry;

#[tokio::main]
async fn main() {
    // Load .env file (if present) before anything reads env vars
    dotenvy::dotenv().ok();

    // Parse CLI arguments
    let args: Vec<String> = std::env::args().collect();

    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_usage();
        return;
    }

    if args.iter().any(|a| a == "--default-config") {
        print!("{}", Config::default_config_contents());
        return;
    }

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    // Load config
    let config_path = args
        .iter()
        .position(|a| a == "--config")
        .and_then(|i| args.get(i + 1))
        .map(PathBuf::from);

    let config = match Config::load(config_path.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            error!("failed to load config: {e}");
            return;
        }
    };

    info!(
        assistant = %config.assistant_name,
        bind = %config.bind,
        provider = %config.llm.provider,
        model = %config.llm.model,
        "zeta-agent starting"
    );

    if args.iter().any(|a| a == "--check") {
        run_checks(&config);
        return;
    }

    let llm = match llm::build_backend(&config) {
        Ok(b) => b,
        Err(e) => {
            error!("failed to initialize LLM backend: {e}");
            return;
        }
    };

    let http_client = match reqwest::Client::builder()
        .timeout(Duration::from_secs(config.tools.timeout_secs.max(1)))
        .build()
    {
        Ok(c) => c,
        Err(e) => {
            error!("failed to create HTTP client: {e}");
            return;
        }
    };

    let tool_registry = build_tool_registry(&config, http_client.clone());
    info!(tools = tool_registry.len(), "tool registry initialized");

    let orchestrator = Orchestrator::new(
        &config,
        llm,
        Arc::new(tool_registry),
        Arc::new(PolicyFilter::new(&config.safety)),
    );
    let state = AppState {
        orchestrator: Arc::new(orchestrator),
        feeds: Arc::new(Feeds::new(
            http_client,
            Duration::from_secs(config.tools.cache_ttl_secs),
        )),
    };

    // Shutdown signal
    let (shutdown_tx, shutdown_rx) = broadcast::channel::<()>(1);

    let bind = config.bind.clone();
    let server_handle = tokio::spawn(async move {
        if let Err(e) = server::serve(&bind, state, shutdown_rx).await {
            error!("server error: {e}");
        }
    });

    info!("zeta-agent is running, press Ctrl+C to stop");

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("failed to listen for ctrl+c: {e}");
    }

    info!("shutdown signal received, stopping...");
    let _ = shutdown_tx.send(());

    let _ = server_handle.await;
    info!("zeta-agent stopped");
}

/// Register the fixed tool vocabulary.
fn build_tool_registry(config: &Config, http_client: reqwest::Client) -> ToolRegistry {
    use crate::tools::*;

    let mut registry = ToolRegistry::new(
        ToolContext { http_client },
        Duration::from_secs(config.tools.timeout_secs),
        Duration::from_secs(config.tools.cache_ttl_secs),
    );

    registry.register(Box::new(web::WebSearchTool::new(config.tools.web_max_results)));
    registry.register(Box::new(web::WikipediaTool::new(
        config.tools.wikipedia_language.clone(),
    )));
    registry.register(Box::new(weather::WeatherTool));
    registry.register(Box::new(sports::SportsOddsTool));
    registry.register(Box::new(calculator::CalculatorTool));

    registry
}

fn run_checks(config: &Config) {
    info!("running pre-flight checks...");

    info!("config: OK");
    info!("  assistant_name: {}", config.assistant_name);
    info!("  bind: {}", config.bind);
    info!("  default_language: {}", config.default_language);
    info!("  ai classifier: {}", if config.classifier.ai_enabled { "enabled" } else { "disabled" });

    match Config::llm_api_key() {
        Ok(_) => info!("LLM API key: OK"),
        Err(e) => error!("LLM API key: {e}"),
    }

    for var in ["ODDS_API_KEY", "EXCHANGE_RATE_KEY", "NOSYAPI_KEY"] {
        if Config::api_key(var).is_some() {
            info!("{var}: set");
        } else {
            warn!("{var}: not set, the matching feed will report failures");
        }
    }

    info!("pre-flight checks complete");
}

fn print_usage() {
    println!(
        "zeta-agent: conversational assistant with data tools

USAGE:
    zeta-agent [OPTIONS]

OPTIONS:
    --config <path>     Path to config file (default: ~/.config/zeta-agent/config.toml)
    --default-config    Print the default configuration and exit
    --check             Validate configuration and API keys, then exit
    -h, --help          Print this help message

ENVIRONMENT:
    GROQ_API_KEY        API key for the language model (or LLM_API_KEY)
    LLM_BASE_URL        Override llm.base_url
    LLM_MODEL           Override llm.model
    ZETA_BIND           Override the HTTP bind address
    ODDS_API_KEY        The Odds API key (Süper Lig odds)
    EXCHANGE_RATE_KEY   ExchangeRate-API key (currency rates)
    NOSYAPI_KEY         NosyAPI key (on-duty pharmacies)
    RUST_LOG            Log filter (default: info)"
    );
}
