//! Shared result types returned by the session service.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Reply to one user message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatReply {
    pub answer: String,
    pub session_id: Uuid,
    /// Whether the message was treated as a follow-up.
    pub follow_up: bool,
}

/// Result of showing a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Activation {
    pub session_id: Uuid,
    /// Welcome message, present only on the first activation.
    pub welcome: Option<String>,
}

/// Session metadata for listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub id: Uuid,
    /// RFC 3339 timestamp.
    pub started_at: String,
    /// RFC 3339 timestamp.
    pub last_message_at: String,
    pub message_count: u32,
}
