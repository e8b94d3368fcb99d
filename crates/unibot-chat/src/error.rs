//! Error types for the conversational engine.
//!
//! None of these escape a user turn: knowledge and completion failures are
//! turned into fixed apology replies by the backends. They surface only from
//! the session service (input validation, unknown sessions) and from
//! explicit loader calls.

/// Errors from the chat engine.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("chat is disabled")]
    Disabled,
    #[error("message cannot be empty")]
    EmptyMessage,
    #[error("message exceeds maximum length of {0} characters")]
    MessageTooLong(usize),
    #[error("session not found: {0}")]
    SessionNotFound(uuid::Uuid),
    #[error("knowledge unavailable: {0}")]
    KnowledgeUnavailable(String),
    #[error("completion error: {0}")]
    Completion(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_chat_error_display() {
        assert_eq!(ChatError::Disabled.to_string(), "chat is disabled");
        assert_eq!(ChatError::EmptyMessage.to_string(), "message cannot be empty");
        assert_eq!(
            ChatError::MessageTooLong(2000).to_string(),
            "message exceeds maximum length of 2000 characters"
        );
        assert_eq!(
            ChatError::KnowledgeUnavailable("404".to_string()).to_string(),
            "knowledge unavailable: 404"
        );
        assert_eq!(
            ChatError::Completion("timeout".to_string()).to_string(),
            "completion error: timeout"
        );
    }

    #[test]
    fn test_session_not_found_preserves_uuid() {
        let id = Uuid::parse_str("550e8400-e29b-41d4-a716-446655440000").unwrap();
        assert_eq!(
            ChatError::SessionNotFound(id).to_string(),
            "session not found: 550e8400-e29b-41d4-a716-446655440000"
        );
    }
}
