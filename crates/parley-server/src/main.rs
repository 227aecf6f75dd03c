//! HTTP server entry point and Axum router setup.
//!
//! Restores the chat session from the configuration file, configures routes,
//! and serves them on the configured address.

mod dto;
mod error;
mod handlers;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use axum::body::Body;
use axum::http::{Request, Response};
use axum::routing::{get, post};
use axum::Router;
use clap::Parser;
use parley_config::DEFAULT_CONFIG_PATH;
use parley_session::ChatSession;
use tokio::sync::Mutex;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "parley-server", about = "Chat with an LLM provider over HTTP", version)]
struct Args {
    /// Address to bind.
    #[arg(long, env = "PARLEY_HOST", default_value = "127.0.0.1")]
    host: String,

    /// Port to listen on.
    #[arg(long, env = "PARLEY_PORT", default_value_t = 5000)]
    port: u16,

    /// Configuration file shared with the console client.
    #[arg(long, env = "PARLEY_CONFIG", default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,
}

/// Shared server state accessible from all handlers.
///
/// The single session is behind an async mutex, so requests that touch it run
/// one at a time.
pub struct ServerState {
    pub session: Mutex<ChatSession>,
    pub config_path: PathBuf,
}

impl ServerState {
    pub fn new(session: ChatSession, config_path: impl Into<PathBuf>) -> Self {
        Self {
            session: Mutex::new(session),
            config_path: config_path.into(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .compact()
        .init();

    let args = Args::parse();

    let session = bootstrap_session(&args.config).await;
    let state = Arc::new(ServerState::new(session, args.config));
    let app = build_router(state);

    let addr = format!("{}:{}", args.host, args.port);
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Builds the router with logging and CORS layers.
fn build_router(state: Arc<ServerState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(|req: &Request<Body>| {
            tracing::info_span!(
                "request",
                method = %req.method(),
                uri = %req.uri(),
                version = ?req.version(),
            )
        })
        .on_response(|res: &Response<Body>, latency: Duration, _span: &tracing::Span| {
            info!(
                latency = %format!("{} ms", latency.as_millis()),
                status = %res.status().as_u16(),
                "finished processing request"
            );
        });

    let logged_routes = Router::new()
        .route("/chat", post(handlers::chat::chat))
        .route("/generate_image", post(handlers::image::generate_image))
        .route("/config", get(handlers::config::get_config).post(handlers::config::update_config))
        .route("/models", post(handlers::model::list_models))
        .route("/reset_chat", post(handlers::chat::reset_chat))
        .layer(trace_layer);

    Router::new()
        .merge(logged_routes)
        .route("/", get(handlers::index))
        .route("/health", get(handlers::health))
        .layer(cors)
        .with_state(state)
}

/// Restores the session the server starts with.
///
/// Nothing here is fatal: each failed step is logged and the server starts
/// with whatever state was reached.
async fn bootstrap_session(config_path: &Path) -> ChatSession {
    let mut session = ChatSession::new();

    match session.load_config(config_path) {
        Ok(true) => {}
        Ok(false) => info!("No configuration at {}, using defaults", config_path.display()),
        Err(e) => warn!("Failed to load configuration: {}", e),
    }

    if session.config().model.is_empty() {
        if let Some(kind) = session.config().provider_kind() {
            session.config_mut().model = kind.fallback_model().to_string();
        }
    }
    session.config_mut().fill_api_key_placeholder();

    if let Err(e) = session.initialize_client() {
        warn!("Provider initialization failed: {}", e);
        return session;
    }

    match session.refresh_models().await {
        Ok(_) => {
            if let Some(model) = session.ensure_model_selected() {
                info!("Using model {}", model);
            }
        }
        Err(e) => warn!("Model refresh failed: {}", e),
    }

    session
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use axum::http::{header, Method, StatusCode};
    use parley_config::ChatConfig;
    use parley_core::ProviderKind;
    use serde_json::{json, Value};
    use tower::ServiceExt;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn router_with(session: ChatSession, config_path: impl Into<PathBuf>) -> Router {
        build_router(Arc::new(ServerState::new(session, config_path)))
    }

    fn json_request(method: Method, uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn send(router: Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = router.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    async fn openai_session(server: &MockServer) -> ChatSession {
        let mut session = ChatSession::new();
        session
            .configure(ChatConfig {
                base_url: server.uri(),
                model: "gpt-4o".into(),
                ..ChatConfig::default()
            })
            .unwrap();
        session.initialize_client().unwrap();
        session
    }

    #[tokio::test]
    async fn chat_without_message_is_bad_request() {
        let router = router_with(ChatSession::new(), "unused.json");
        let (status, body) = send(router, json_request(Method::POST, "/chat", json!({}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "No message provided");
    }

    #[tokio::test]
    async fn chat_returns_reply_and_records_transcript() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "chatcmpl-1",
                "object": "chat.completion",
                "created": 1677652288,
                "model": "gpt-4o",
                "choices": [{
                    "index": 0,
                    "message": { "role": "assistant", "content": "Hi!" },
                    "finish_reason": "stop"
                }]
            })))
            .mount(&server)
            .await;

        let state = Arc::new(ServerState::new(openai_session(&server).await, "unused.json"));
        let router = build_router(state.clone());
        let (status, body) = send(router, json_request(Method::POST, "/chat", json!({ "message": "Hello" }))).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["response"], "Hi!");
        assert_eq!(state.session.lock().await.history().len(), 2);
    }

    #[tokio::test]
    async fn chat_without_provider_is_internal_error() {
        let router = router_with(ChatSession::new(), "unused.json");
        let (status, body) = send(router, json_request(Method::POST, "/chat", json!({ "message": "Hi" }))).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body["error"].as_str().unwrap().starts_with("Failed to get response"));
    }

    #[tokio::test]
    async fn image_without_prompt_is_bad_request() {
        let router = router_with(ChatSession::new(), "unused.json");
        let (status, _) = send(router, json_request(Method::POST, "/generate_image", json!({ "n": 2 }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn mistyped_field_is_json_bad_request() {
        let router = router_with(ChatSession::new(), "unused.json");
        let body = json!({ "prompt": "a cat", "n": "2" });
        let (status, body) = send(router, json_request(Method::POST, "/generate_image", body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string(), "got {body}");
    }

    #[tokio::test]
    async fn malformed_body_is_json_bad_request() {
        for uri in ["/chat", "/generate_image", "/config", "/models"] {
            let request = Request::builder()
                .method(Method::POST)
                .uri(uri)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from("{ not json"))
                .unwrap();
            let (status, body) = send(router_with(ChatSession::new(), "unused.json"), request).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
            assert!(body["error"].is_string(), "{uri}: got {body}");
        }
    }

    #[tokio::test]
    async fn missing_content_type_is_json_bad_request() {
        let request = Request::builder()
            .method(Method::POST)
            .uri("/chat")
            .body(Body::from(r#"{"message":"Hi"}"#))
            .unwrap();
        let (status, body) = send(router_with(ChatSession::new(), "unused.json"), request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn image_on_anthropic_is_internal_error() {
        let mut session = ChatSession::new();
        session
            .configure(ChatConfig {
                api_key: "sk-ant".into(),
                model: "claude-3-haiku-20240307".into(),
                ..ChatConfig::for_provider(ProviderKind::Anthropic)
            })
            .unwrap();
        session.initialize_client().unwrap();

        let router = router_with(session, "unused.json");
        let (status, body) = send(router, json_request(Method::POST, "/generate_image", json!({ "prompt": "a cat" }))).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body["error"].as_str().unwrap().contains("does not support image generation"));
    }

    #[tokio::test]
    async fn get_config_exposes_raw_credential() {
        let session = ChatSession::with_config(ChatConfig { api_key: "sk-secret".into(), ..ChatConfig::default() });
        let router = router_with(session, "unused.json");

        let request = Request::builder().uri("/config").body(Body::empty()).unwrap();
        let (status, body) = send(router, request).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["api_key"], "sk-secret");
        assert_eq!(body["provider"], "openai");
        assert_eq!(body["max_tokens"], 1000);
    }

    #[tokio::test]
    async fn update_config_without_fields_is_bad_request() {
        let router = router_with(ChatSession::new(), "unused.json");
        let (status, _) = send(router, json_request(Method::POST, "/config", json!({ "unknown": 1 }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn update_config_persists_even_when_provider_is_unreachable() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("config.json");
        let state = Arc::new(ServerState::new(ChatSession::new(), &config_path));

        let update = json!({
            "provider_name": "openai",
            "endpoint_url": "http://127.0.0.1:9/v1",
            "model_name": "llama3",
            "temperature": 0.3
        });
        let (status, body) = send(build_router(state.clone()), json_request(Method::POST, "/config", update)).await;

        assert_eq!(status, StatusCode::OK);
        assert!(body["message"].is_string());

        let mut saved = ChatConfig::default();
        assert!(saved.merge_from_file(&config_path).unwrap());
        assert_eq!(saved.base_url, "http://127.0.0.1:9/v1");
        assert_eq!(saved.model, "llama3");
        assert_eq!(state.session.lock().await.config().temperature, 0.3);
    }

    #[tokio::test]
    async fn update_config_save_failure_is_internal_error() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("missing").join("config.json");
        let router = router_with(ChatSession::new(), config_path);

        let (status, _) = send(router, json_request(Method::POST, "/config", json!({ "model_name": "x" }))).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn models_requires_provider_and_endpoint() {
        let router = router_with(ChatSession::new(), "unused.json");
        let (status, _) = send(router, json_request(Method::POST, "/models", json!({ "provider_name": "openai" }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn models_for_unknown_provider_is_bad_request() {
        let router = router_with(ChatSession::new(), "unused.json");
        let body = json!({ "provider_name": "cohere", "endpoint_url": "http://localhost" });
        let (status, _) = send(router, json_request(Method::POST, "/models", body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn models_for_unreachable_endpoint_is_empty_list() {
        let router = router_with(ChatSession::new(), "unused.json");
        let body = json!({ "provider_name": "openai", "endpoint_url": "http://127.0.0.1:9/v1" });
        let (status, body) = send(router, json_request(Method::POST, "/models", body)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "models": [] }));
    }

    #[tokio::test]
    async fn models_for_unparseable_endpoint_is_internal_error() {
        let router = router_with(ChatSession::new(), "unused.json");
        let body = json!({ "provider_name": "openai", "endpoint_url": "not a url" });
        let (status, body) = send(router, json_request(Method::POST, "/models", body)).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body["error"].as_str().unwrap().starts_with("Could not initialize client"));
    }

    #[tokio::test]
    async fn models_for_anthropic_use_static_table() {
        let router = router_with(ChatSession::new(), "unused.json");
        let body = json!({ "provider_name": "Anthropic", "endpoint_url": "https://api.anthropic.com" });
        let (status, body) = send(router, json_request(Method::POST, "/models", body)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["models"].as_array().unwrap().len(), parley_session::ANTHROPIC_MODELS.len());
    }

    #[tokio::test]
    async fn models_leave_the_session_untouched() {
        let state = Arc::new(ServerState::new(ChatSession::new(), "unused.json"));
        let body = json!({ "provider_name": "anthropic", "endpoint_url": "https://api.anthropic.com" });
        send(build_router(state.clone()), json_request(Method::POST, "/models", body)).await;

        let session = state.session.lock().await;
        assert!(session.models().is_empty());
        assert_eq!(session.config(), &ChatConfig::default());
    }

    #[tokio::test]
    async fn reset_chat_confirms() {
        let router = router_with(ChatSession::new(), "unused.json");
        let (status, body) = send(router, json_request(Method::POST, "/reset_chat", json!({}))).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["message"].is_string());
    }

    #[tokio::test]
    async fn index_serves_html() {
        let router = router_with(ChatSession::new(), "unused.json");
        let request = Request::builder().uri("/").body(Body::empty()).unwrap();
        let response = router.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert!(String::from_utf8_lossy(&bytes).contains("<html"));
    }

    #[tokio::test]
    async fn bootstrap_switches_to_first_catalog_entry() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/models"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "object": "list",
                "data": [
                    { "id": "llama3", "object": "model", "created": 0, "owned_by": "local" },
                    { "id": "mistral", "object": "model", "created": 0, "owned_by": "local" }
                ]
            })))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("config.json");
        ChatConfig { base_url: server.uri(), ..ChatConfig::default() }
            .save_to_file(&config_path)
            .unwrap();

        let session = bootstrap_session(&config_path).await;
        assert_eq!(session.config().model, "llama3");
        assert_eq!(session.models().len(), 2);
        assert!(session.provider().is_some());
    }

    #[tokio::test]
    async fn bootstrap_fills_fallback_model_and_survives_unreachable_endpoint() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("config.json");
        ChatConfig { base_url: "http://127.0.0.1:9/v1".into(), ..ChatConfig::default() }
            .save_to_file(&config_path)
            .unwrap();

        let session = bootstrap_session(&config_path).await;
        assert_eq!(session.config().model, ProviderKind::OpenAi.fallback_model());
        assert_eq!(session.config().api_key, parley_config::API_KEY_PLACEHOLDER);
        assert!(session.models().is_empty());
    }

    #[tokio::test]
    async fn bootstrap_with_malformed_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("config.json");
        std::fs::write(&config_path, "{ not json").unwrap();

        let mut session = ChatSession::new();
        assert!(session.load_config(&config_path).is_err());
        assert_eq!(session.config(), &ChatConfig::default());
    }
}
