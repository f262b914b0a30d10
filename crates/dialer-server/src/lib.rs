//! Dialer server library logic.
//!
//! Hosts the server half of the browser phone: the token endpoint, the
//! provider's call-instructions and recording-status webhooks, the call log
//! endpoints, and the background transcription worker.

pub mod api_calls;
pub mod api_voice;
pub mod background;
pub mod config;
pub mod middleware;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Extension, Json, Router,
};
use config::Config;
use dialer_db::DbPool;
use dialer_voice::{RecordingFetcher, RequestValidator, SttService, TokenIssuer};
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Application state shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub pool: DbPool,
    /// Externally reachable base URL, without a trailing slash.
    pub public_url: String,
    /// Caller id presented on bridged calls.
    pub caller_id: String,
    /// Language of spoken call-control messages.
    pub say_language: String,
    /// Token issuer; `None` when provider credentials are incomplete.
    pub token_issuer: Option<Arc<TokenIssuer>>,
    /// Webhook signature validator; `None` when no auth token is configured.
    pub validator: Option<RequestValidator>,
    /// Recording downloader; `None` without provider credentials.
    pub recording_fetcher: Option<RecordingFetcher>,
    /// Speech-to-text client; `None` when transcription is disabled.
    pub stt: Option<Arc<SttService>>,
}

impl AppState {
    /// Builds the state from configuration.
    ///
    /// Missing provider credentials are a deployment error: they are logged
    /// once here and every affected request is answered with a 500 or 403.
    pub fn from_config(pool: DbPool, config: &Config) -> Self {
        let provider = &config.provider;

        let token_issuer = match TokenIssuer::new(provider.clone()) {
            Ok(issuer) => Some(Arc::new(issuer)),
            Err(e) => {
                tracing::error!(error = %e, "token issuer disabled; /api/voice/token will fail");
                None
            }
        };

        let validator = if provider.can_validate_webhooks() {
            Some(RequestValidator::new(provider.auth_token.clone()))
        } else {
            tracing::error!("provider auth token missing; provider webhooks will be rejected");
            None
        };

        let recording_fetcher = (provider.can_validate_webhooks()
            && !provider.account_sid.trim().is_empty())
        .then(|| RecordingFetcher::new(provider.account_sid.clone(), provider.auth_token.clone()));

        let stt = if config.speech.is_enabled() {
            Some(Arc::new(SttService::new(config.speech.clone())))
        } else {
            tracing::warn!("speech-to-text API key missing; recordings will not be transcribed");
            None
        };

        if config.server.public_url.trim().is_empty() {
            tracing::error!("server.public_url is empty; provider webhooks cannot be validated");
        }
        if provider.caller_id.trim().is_empty() {
            tracing::error!("provider caller id missing; outbound calls will be refused");
        }

        Self {
            pool,
            public_url: config.server.public_url.trim_end_matches('/').to_string(),
            caller_id: provider.caller_id.clone(),
            say_language: config.server.say_language.clone(),
            token_issuer,
            validator,
            recording_fetcher,
            stt,
        }
    }
}

/// Maximum request body size (2 MiB). Protects against OOM from oversized payloads.
const MAX_REQUEST_BODY_BYTES: usize = 2 * 1024 * 1024;

/// Health check handler.
async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Builds the application router with all routes.
pub fn app(state: AppState) -> Router {
    let protected_routes = Router::new()
        .route("/api/voice/token", post(api_voice::token_handler))
        .route(
            "/api/calls",
            post(api_calls::create_call_handler).get(api_calls::list_calls_handler),
        )
        .layer(axum::middleware::from_fn(middleware::auth_middleware));

    // Provider webhooks authenticate by request signature, not by session.
    let webhook_routes = Router::new()
        .route(
            api_voice::INSTRUCTIONS_PATH,
            post(api_voice::instructions_handler),
        )
        .route(
            api_voice::RECORDING_STATUS_PATH,
            post(api_voice::recording_status_handler),
        );

    Router::new()
        .route("/health", get(health))
        .merge(protected_routes)
        .merge(webhook_routes)
        .layer(DefaultBodyLimit::max(MAX_REQUEST_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(Extension(Arc::new(state)))
}
