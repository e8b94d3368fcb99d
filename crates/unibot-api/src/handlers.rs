//! Route handler functions for all API endpoints.
//!
//! Each handler extracts path parameters and JSON bodies via axum
//! extractors, calls into the [`ChatOrchestrator`](unibot_chat::ChatOrchestrator)
//! and returns JSON responses.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use unibot_chat::{Activation, ChatReply, SessionSummary};
use uuid::Uuid;

use crate::error::ApiError;
use crate::state::AppState;

// =============================================================================
// Request / response types
// =============================================================================

/// Request body for POST /api/chat.
#[derive(Debug, Serialize, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub session_id: Option<Uuid>,
}

/// Response for GET /api/sessions.
#[derive(Debug, Serialize, Deserialize)]
pub struct SessionsResponse {
    pub sessions: Vec<SessionSummary>,
}

/// Response for GET /health.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    pub active_sessions: usize,
}

fn parse_session_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw)
        .map_err(|_| ApiError::BadRequest(format!("Invalid session id: '{}'", raw)))
}

// =============================================================================
// Handlers
// =============================================================================

/// GET /health - health check.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        active_sessions: state.orchestrator.session_count(),
    })
}

/// POST /api/sessions - create and activate a new session.
pub async fn create_session(
    State(state): State<AppState>,
) -> (StatusCode, Json<Activation>) {
    let activation = state.orchestrator.activate(None).await;
    (StatusCode::CREATED, Json(activation))
}

/// POST /api/sessions/{id}/activate - show a session, welcoming it once.
///
/// An unknown or expired id gets a fresh session, like `/api/chat`.
pub async fn activate_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Activation>, ApiError> {
    let id = parse_session_id(&id)?;
    Ok(Json(state.orchestrator.activate(Some(id)).await))
}

/// POST /api/chat - send a message and receive the reply.
pub async fn chat(
    State(state): State<AppState>,
    Json(body): Json<ChatRequest>,
) -> Result<Json<ChatReply>, ApiError> {
    let reply = state
        .orchestrator
        .handle_message(&body.message, body.session_id)
        .await?;
    Ok(Json(reply))
}

/// GET /api/sessions - list live sessions.
pub async fn list_sessions(State(state): State<AppState>) -> Json<SessionsResponse> {
    Json(SessionsResponse {
        sessions: state.orchestrator.list_sessions().await,
    })
}

/// DELETE /api/sessions/{id} - delete a session.
pub async fn delete_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id = parse_session_id(&id)?;
    state.orchestrator.delete_session(id)?;
    Ok(StatusCode::NO_CONTENT)
}
