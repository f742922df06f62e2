use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};

use super::routes::AppState;
use crate::conversation::Message;
use crate::error::Result;
use crate::orchestrator::ResultEnvelope;
use crate::tools::ToolName;

#[derive(Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub history: Vec<Message>,
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub tools: Vec<ToolName>,
}

#[derive(Deserialize)]
pub struct PharmacyQuery {
    pub district: Option<String>,
}

// -- Chat -------------------------------------------------------------------

pub async fn chat(State(state): State<AppState>, Json(req): Json<ChatRequest>) -> Json<ResultEnvelope> {
    info!(chars = req.message.chars().count(), turns = req.history.len(), "chat request");
    Json(state.orchestrator.process(&req.message, &req.history).await)
}

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        tools: state.orchestrator.tools().names(),
    })
}

// -- Feeds ------------------------------------------------------------------

pub async fn exchange(State(state): State<AppState>) -> Json<serde_json::Value> {
    feed_response("exchange", state.feeds.exchange().await)
}

pub async fn odds(State(state): State<AppState>) -> Json<serde_json::Value> {
    feed_response("odds", state.feeds.odds().await)
}

pub async fn pharmacies(
    State(state): State<AppState>,
    Path(city): Path<String>,
    Query(query): Query<PharmacyQuery>,
) -> impl IntoResponse {
    let city = city.trim();
    if city.chars().count() < 2 {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "success": false, "message": "Şehir adı gerekli." })),
        );
    }
    let district = query.district.as_deref().map(str::trim).filter(|d| !d.is_empty());
    (
        StatusCode::OK,
        feed_response("pharmacy", state.feeds.pharmacies(city, district).await),
    )
}

/// Flatten a feed result into `{success: true, ...data}` or
/// `{success: false, error}`.  Feed failures are still HTTP 200.
fn feed_response(feed: &str, result: Result<serde_json::Value>) -> Json<serde_json::Value> {
    match result {
        Ok(serde_json::Value::Object(mut body)) => {
            body.insert("success".into(), json!(true));
            Json(serde_json::Value::Object(body))
        }
        Ok(other) => Json(json!({ "success": true, "data": other })),
        Err(e) => {
            warn!(feed, error = %e, "feed request failed");
            Json(json!({ "success": false, "error": e.to_string() }))
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    use super::*;
    use crate::config::Config;
    use crate::error::ZetaError;
    use crate::feeds::Feeds;
    use crate::llm::{CompletionOptions, LlmBackend};
    use crate::orchestrator::Orchestrator;
    use crate::security::PolicyFilter;
    use crate::server::routes;
    use crate::tools::calculator::CalculatorTool;
    use crate::tools::{ToolContext, ToolRegistry};

    struct EchoLlm;

    #[async_trait]
    impl LlmBackend for EchoLlm {
        fn name(&self) -> &str {
            "echo"
        }

        async fn complete(
            &self,
            system_prompt: &str,
            messages: &[Message],
            _options: &CompletionOptions,
        ) -> Result<String> {
            if system_prompt.starts_with("You are a tool selector") {
                return Err(ZetaError::Llm("classifier offline".into()));
            }
            Ok(format!("echo: {}", messages.last().map(|m| m.content.as_str()).unwrap_or("")))
        }
    }

    fn app() -> axum::Router {
        let config = Config::default();
        let ctx = ToolContext {
            http_client: reqwest::Client::new(),
        };
        let mut registry = ToolRegistry::new(ctx, Duration::from_secs(1), Duration::ZERO);
        registry.register(Box::new(CalculatorTool));

        let orchestrator = Orchestrator::new(
            &config,
            Arc::new(EchoLlm),
            Arc::new(registry),
            Arc::new(PolicyFilter::new(&config.safety)),
        );
        routes::build(AppState {
            orchestrator: Arc::new(orchestrator),
            feeds: Arc::new(Feeds::new(reqwest::Client::new(), Duration::ZERO)),
        })
    }

    async fn body_json(res: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn post_chat(body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/chat")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn chat_returns_envelope() {
        let res = app()
            .oneshot(post_chat(json!({"message": "2 + 2"})))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let body = body_json(res).await;
        assert_eq!(body["type"], "success");
        assert_eq!(body["message"], "echo: 2 + 2");
        assert_eq!(body["toolUsed"], "calculator");
        assert_eq!(body["toolData"]["result"], 4);
    }

    #[tokio::test]
    async fn chat_accepts_history() {
        let req = post_chat(json!({
            "message": "teşekkürler",
            "history": [
                {"role": "user", "content": "merhaba"},
                {"role": "assistant", "content": "Merhaba!"}
            ]
        }));
        let body = body_json(app().oneshot(req).await.unwrap()).await;
        assert_eq!(body["type"], "success");
        assert!(body.get("toolUsed").is_none());
    }

    #[tokio::test]
    async fn empty_chat_message_is_safety_block() {
        let body = body_json(app().oneshot(post_chat(json!({"message": "  "}))).await.unwrap()).await;
        assert_eq!(body["type"], "safety_block");
        assert_eq!(body["reason"], "empty_message");
    }

    #[tokio::test]
    async fn health_lists_registered_tools() {
        let req = Request::builder()
            .uri("/api/health")
            .body(Body::empty())
            .unwrap();
        let body = body_json(app().oneshot(req).await.unwrap()).await;
        assert_eq!(body, json!({"status": "ok", "tools": ["calculator"]}));
    }

    #[tokio::test]
    async fn pharmacy_rejects_one_letter_city() {
        let req = Request::builder()
            .uri("/api/eczane/a")
            .body(Body::empty())
            .unwrap();
        let res = app().oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(res).await["success"], false);
    }

    #[test]
    fn feed_response_shapes() {
        let ok = feed_response("x", Ok(json!({"total": 2})));
        assert_eq!(ok.0, json!({"total": 2, "success": true}));

        let err = feed_response("x", Err(ZetaError::Config("ODDS_API_KEY is not set".into())));
        assert_eq!(err.0["success"], false);
        assert!(err.0["error"].as_str().unwrap().contains("ODDS_API_KEY"));
    }
}
