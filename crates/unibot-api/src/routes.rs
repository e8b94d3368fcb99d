//! Router setup with all API routes and middleware.
//!
//! Configures the axum Router with CORS, tracing, compression,
//! rate limiting and the chat endpoint handlers.

use axum::extract::DefaultBodyLimit;
use axum::http::{header, HeaderValue, Method};
use axum::routing::{delete, get, post};
use axum::Router;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use unibot_core::config::{ChatConfig, ServerConfig};
use unibot_core::error::UnibotError;

use crate::handlers;
use crate::rate_limit::{rate_limit_middleware, RateLimiter};
use crate::state::AppState;

/// Create the axum Router with all routes and middleware.
pub fn create_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config.server);
    let limiter = RateLimiter::new(state.config.server.rate_limit_per_sec);

    let api_routes = Router::new()
        .route(
            "/sessions",
            get(handlers::list_sessions).post(handlers::create_session),
        )
        .route("/sessions/{id}", delete(handlers::delete_session))
        .route("/sessions/{id}/activate", post(handlers::activate_session))
        .route("/chat", post(handlers::chat))
        .layer(axum::middleware::from_fn(rate_limit_middleware))
        .layer(axum::Extension(limiter));

    Router::new()
        .route("/health", get(handlers::health))
        .nest("/api", api_routes)
        .layer(DefaultBodyLimit::max(body_limit(&state.config.chat)))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Request body limit large enough for any message the chat layer accepts,
/// so over-long messages reach validation and get a JSON error body.
///
/// A char is at most 6 bytes once JSON-escaped (`\uXXXX`); the slack covers
/// the surrounding fields.
fn body_limit(chat: &ChatConfig) -> usize {
    chat.max_message_length
        .saturating_mul(6)
        .saturating_add(4 * 1024)
        .max(64 * 1024)
}

/// CORS for the configured origins, or localhost on the server port when
/// none are configured.
fn cors_layer(server: &ServerConfig) -> CorsLayer {
    let origins: Vec<String> = if server.allowed_origins.is_empty() {
        vec![
            format!("http://127.0.0.1:{}", server.port),
            format!("http://localhost:{}", server.port),
        ]
    } else {
        server.allowed_origins.clone()
    };

    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
}

/// Start the HTTP server on the configured address.
pub async fn start_server(state: AppState) -> Result<(), UnibotError> {
    let addr = format!("{}:{}", state.config.server.host, state.config.server.port);
    let router = create_router(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| UnibotError::Api(format!("Failed to bind {}: {}", addr, e)))?;

    tracing::info!("Starting API server on {}", addr);

    axum::serve(listener, router)
        .await
        .map_err(|e| UnibotError::Api(format!("Server error: {}", e)))?;

    Ok(())
}
