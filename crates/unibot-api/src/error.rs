//! API error types and JSON error response formatting.
//!
//! ApiError provides a consistent JSON error response format across all
//! endpoints, mapping internal errors to appropriate HTTP status codes.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use unibot_chat::ChatError;

/// JSON error response body.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Machine-readable error code (e.g., "bad_request", "not_found").
    pub error: String,
    /// Human-readable error message.
    pub message: String,
}

/// API error type that maps to HTTP status codes and JSON responses.
#[derive(Debug)]
pub enum ApiError {
    /// 400 Bad Request - missing or invalid parameters.
    BadRequest(String),
    /// 404 Not Found - resource does not exist.
    NotFound(String),
    /// 413 Payload Too Large - message exceeds the configured length.
    PayloadTooLarge(String),
    /// 503 Service Unavailable - chat disabled or backend unreachable.
    ServiceUnavailable(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg),
            ApiError::PayloadTooLarge(msg) => {
                (StatusCode::PAYLOAD_TOO_LARGE, "payload_too_large", msg)
            }
            ApiError::ServiceUnavailable(msg) => {
                (StatusCode::SERVICE_UNAVAILABLE, "service_unavailable", msg)
            }
        };

        let body = ErrorBody {
            error: error_code.to_string(),
            message,
        };

        (status, Json(body)).into_response()
    }
}

impl From<ChatError> for ApiError {
    fn from(err: ChatError) -> Self {
        match err {
            ChatError::EmptyMessage => ApiError::BadRequest(err.to_string()),
            ChatError::MessageTooLong(_) => ApiError::PayloadTooLarge(err.to_string()),
            ChatError::SessionNotFound(_) => ApiError::NotFound(err.to_string()),
            ChatError::Disabled | ChatError::KnowledgeUnavailable(_) | ChatError::Completion(_) => {
                ApiError::ServiceUnavailable(err.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn status_of(err: ApiError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn test_chat_error_mapping() {
        assert_eq!(
            status_of(ChatError::EmptyMessage.into()),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(ChatError::MessageTooLong(2000).into()),
            StatusCode::PAYLOAD_TOO_LARGE
        );
        assert_eq!(
            status_of(ChatError::SessionNotFound(Uuid::nil()).into()),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(ChatError::Disabled.into()),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            status_of(ChatError::KnowledgeUnavailable("offline".to_string()).into()),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }
}
