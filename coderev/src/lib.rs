//! # coderev
//!
//! A self-hostable AI code review service. The server validates submitted
//! code with a cheap "looks like code" heuristic, forwards it to a
//! generative-AI provider with a fixed review instruction, and returns the
//! provider's text. The crate also ships the editor-side pieces: a
//! [`client::ReviewClient`] state machine and a [`render`] module that turns
//! review Markdown into display blocks.
//!
//! ## Quick start
//!
//! ```no_run
//! use clap::Parser;
//! use coderev::{Application, Config, config::Args};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let args = Args::parse();
//! let config = Config::load(&args)?;
//! let app = Application::new(config)?;
//! app.serve(std::future::pending()).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## HTTP surface
//!
//! - `POST /ai/get-review` with `{"code": "..."}` returns
//!   `{"success": true, "review": "..."}` or
//!   `{"success": false, "error": "..."}` (400 invalid input, 429 rate
//!   limited, 500/504 provider failure).
//! - `GET /` and `GET /healthz` are health-check-like.
//!
//! ## Configuration
//!
//! See the [`config`] module for configuration options.

pub mod api;
pub mod client;
pub mod config;
pub mod errors;
pub mod limits;
pub mod provider;
pub mod render;
pub mod review;
pub mod telemetry;

use crate::limits::RateLimiter;
use crate::provider::GeminiProvider;
use crate::review::ReviewService;
use axum::http::HeaderValue;
use axum::{
    Router,
    middleware::from_fn_with_state,
    routing::{get, post},
};
pub use config::Config;
use provider::GenerateReview;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::{
    cors::{self, CorsLayer},
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::{Level, info, warn};

/// Application state shared across all request handlers.
///
/// Holds the configuration, the review service (provider client included),
/// and the optional rate limiter. All of it is constructed once at process
/// start; there is no other shared mutable state between requests.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub service: Arc<ReviewService>,
    pub limiter: Option<Arc<RateLimiter>>,
}

/// Create CORS layer from configuration
fn create_cors_layer(config: &Config) -> anyhow::Result<CorsLayer> {
    let wildcard = config
        .cors
        .allowed_origins
        .iter()
        .any(|origin| matches!(origin, config::CorsOrigin::Wildcard));

    let cors = if wildcard {
        CorsLayer::new().allow_origin(cors::Any)
    } else {
        let mut origins = Vec::new();
        for origin in &config.cors.allowed_origins {
            if let config::CorsOrigin::Url(url) = origin {
                origins.push(url.as_str().trim_end_matches('/').parse::<HeaderValue>()?);
            }
        }
        CorsLayer::new().allow_origin(origins)
    };

    Ok(cors.allow_methods(cors::Any).allow_headers(cors::Any))
}

/// Build the application router with all endpoints and middleware.
///
/// - Base route and healthcheck
/// - The review endpoint
/// - Rate limiting (outermost after CORS, applied to every route)
/// - CORS and tracing layers
pub fn build_router(state: &AppState) -> anyhow::Result<Router> {
    let router = Router::new()
        .route("/", get(api::handlers::review::greeting))
        .route("/healthz", get(|| async { "OK" }))
        .route("/ai/get-review", post(api::handlers::review::get_review))
        .with_state(state.clone())
        .layer(from_fn_with_state(state.clone(), limits::rate_limit_middleware))
        .layer(create_cors_layer(&state.config)?)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        );

    Ok(router)
}

/// Main application struct that owns the router and configuration.
///
/// # Lifecycle
///
/// 1. **Create**: [`Application::new`] builds the provider client, review
///    service, rate limiter, and router from configuration
/// 2. **Serve**: [`Application::serve`] binds a TCP listener and handles
///    requests until the shutdown future resolves
pub struct Application {
    router: Router,
    config: Config,
}

impl Application {
    /// Create a new application instance with the default (Gemini) provider.
    pub fn new(config: Config) -> anyhow::Result<Self> {
        let provider = Arc::new(GeminiProvider::new(&config.provider));
        Self::with_provider(config, provider)
    }

    /// Create an application with a custom provider implementation.
    pub fn with_provider(config: Config, provider: Arc<dyn GenerateReview>) -> anyhow::Result<Self> {
        if config.provider.api_key.is_none() {
            warn!("No provider API key configured (set GEMINI_API_KEY); provider calls will fail");
        }

        let state = AppState {
            service: Arc::new(ReviewService::new(provider)),
            limiter: RateLimiter::new(&config.rate_limit).map(Arc::new),
            config: config.clone(),
        };
        let router = build_router(&state)?;

        Ok(Self { router, config })
    }

    /// Start serving the application
    pub async fn serve<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let bind_addr = self.config.bind_address();
        let listener = TcpListener::bind(&bind_addr).await?;
        info!("coderev listening on http://{}", bind_addr);

        axum::serve(listener, self.router.into_make_service_with_connect_info::<SocketAddr>())
            .with_graceful_shutdown(shutdown)
            .await?;

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::config::{ProviderConfig, RateLimitConfig};
    use axum_test::TestServer;
    use serde_json::{Value, json};
    use std::time::Duration;
    use url::Url;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config(provider_uri: &str, max_requests: u32, window: Duration) -> Config {
        Config {
            provider: ProviderConfig {
                base_url: Url::parse(provider_uri).unwrap(),
                api_key: Some("test-key".to_string()),
                model: "gemini-2.0-flash".to_string(),
                request_timeout: Duration::from_secs(5),
            },
            rate_limit: RateLimitConfig { max_requests, window },
            ..Config::default()
        }
    }

    fn test_server(config: Config) -> TestServer {
        let app = Application::new(config).expect("failed to build application");
        TestServer::new(app.router).expect("Failed to create test server")
    }

    fn gemini_review(text: &str) -> Value {
        json!({
            "candidates": [
                { "content": { "parts": [{ "text": text }] } }
            ]
        })
    }

    #[tokio::test]
    async fn test_get_review_end_to_end() {
        let provider = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(gemini_review("## Overview\nSolid function.")))
            .expect(1)
            .mount(&provider)
            .await;

        let server = test_server(test_config(&provider.uri(), 20, Duration::from_secs(60)));
        let response = server
            .post("/ai/get-review")
            .json(&json!({ "code": "function sum(a,b){return a+b;}" }))
            .await;

        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body["success"], json!(true));
        assert!(!body["review"].as_str().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_code_field_is_400_without_provider_call() {
        let provider = MockServer::start().await;
        Mock::given(method("POST")).respond_with(ResponseTemplate::new(200)).expect(0).mount(&provider).await;

        let server = test_server(test_config(&provider.uri(), 20, Duration::from_secs(60)));
        let response = server.post("/ai/get-review").json(&json!({})).await;

        response.assert_status_bad_request();
        let body: Value = response.json();
        assert_eq!(body["success"], json!(false));
        assert_eq!(body["error"], json!("Code is required"));
    }

    #[tokio::test]
    async fn test_non_code_input_is_400_without_provider_call() {
        let provider = MockServer::start().await;
        Mock::given(method("POST")).respond_with(ResponseTemplate::new(200)).expect(0).mount(&provider).await;

        let server = test_server(test_config(&provider.uri(), 20, Duration::from_secs(60)));
        let response = server.post("/ai/get-review").json(&json!({ "code": "hello there" })).await;

        response.assert_status_bad_request();
        let body: Value = response.json();
        assert_eq!(body["success"], json!(false));
        assert!(body["error"].as_str().unwrap().contains("doesn't appear to be code"));
    }

    #[tokio::test]
    async fn test_too_short_input_is_400() {
        let provider = MockServer::start().await;
        Mock::given(method("POST")).respond_with(ResponseTemplate::new(200)).expect(0).mount(&provider).await;

        let server = test_server(test_config(&provider.uri(), 20, Duration::from_secs(60)));
        let response = server.post("/ai/get-review").json(&json!({ "code": "x" })).await;

        response.assert_status_bad_request();
        let body: Value = response.json();
        assert!(body["error"].as_str().unwrap().contains("too short"));
    }

    #[tokio::test]
    async fn test_unused_language_field_is_ignored() {
        let provider = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(gemini_review("fine")))
            .mount(&provider)
            .await;

        let server = test_server(test_config(&provider.uri(), 20, Duration::from_secs(60)));
        let response = server
            .post("/ai/get-review")
            .json(&json!({ "code": "let x = 1;", "language": "javascript" }))
            .await;

        response.assert_status_ok();
    }

    #[tokio::test]
    async fn test_provider_failure_is_generic_500() {
        let provider = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("internal provider detail"))
            .mount(&provider)
            .await;

        let server = test_server(test_config(&provider.uri(), 20, Duration::from_secs(60)));
        let response = server.post("/ai/get-review").json(&json!({ "code": "let x = 1;" })).await;

        response.assert_status(axum::http::StatusCode::INTERNAL_SERVER_ERROR);
        let body: Value = response.json();
        assert_eq!(body["success"], json!(false));
        assert_eq!(body["error"], json!("Failed to get AI review"));
        // Provider detail must not leak
        assert!(!response.text().contains("internal provider detail"));
    }

    #[tokio::test]
    async fn test_rate_limit_rejects_then_recovers() {
        let provider = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(gemini_review("ok")))
            .mount(&provider)
            .await;

        let server = test_server(test_config(&provider.uri(), 2, Duration::from_millis(200)));
        let code = json!({ "code": "let x = 1;" });

        server.post("/ai/get-review").json(&code).await.assert_status_ok();
        server.post("/ai/get-review").json(&code).await.assert_status_ok();

        // Request N+1 within the window
        let limited = server.post("/ai/get-review").json(&code).await;
        assert_eq!(limited.status_code().as_u16(), 429);
        let body: Value = limited.json();
        assert_eq!(body["error"], json!("Too many requests. Please try again later."));

        // After the window elapses, requests succeed again
        tokio::time::sleep(Duration::from_millis(250)).await;
        server.post("/ai/get-review").json(&code).await.assert_status_ok();
    }

    #[tokio::test]
    async fn test_rate_limit_keys_on_forwarded_client() {
        let provider = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(gemini_review("ok")))
            .mount(&provider)
            .await;

        let server = test_server(test_config(&provider.uri(), 1, Duration::from_secs(60)));
        let code = json!({ "code": "let x = 1;" });

        server
            .post("/ai/get-review")
            .add_header("x-forwarded-for", "10.0.0.1")
            .json(&code)
            .await
            .assert_status_ok();
        // Same client, over quota
        let limited = server.post("/ai/get-review").add_header("x-forwarded-for", "10.0.0.1").json(&code).await;
        assert_eq!(limited.status_code().as_u16(), 429);
        // Different client, fresh window
        server
            .post("/ai/get-review")
            .add_header("x-forwarded-for", "10.0.0.2")
            .json(&code)
            .await
            .assert_status_ok();
    }

    #[tokio::test]
    async fn test_base_and_health_routes() {
        let provider = MockServer::start().await;
        let server = test_server(test_config(&provider.uri(), 20, Duration::from_secs(60)));

        let greeting = server.get("/").await;
        greeting.assert_status_ok();
        assert!(!greeting.text().is_empty());

        let health = server.get("/healthz").await;
        health.assert_status_ok();
        assert_eq!(health.text(), "OK");
    }
}
