//! Per-session turn sequencing.
//!
//! [`ChatEngine`] is the shared, read-only part (tracker, rules, backend).
//! [`ChatSession`] owns one [`ConversationContext`] and runs turns against
//! the engine: classify, answer, record.

use std::sync::Arc;

use chrono::Local;
use uuid::Uuid;

use crate::backend::AnswerBackend;
use crate::context::{ContextTracker, ConversationContext};
use crate::error::ChatError;
use crate::resolver::ResponseResolver;

// =============================================================================
// ChatEngine
// =============================================================================

/// Stateless dialogue engine shared by all sessions.
pub struct ChatEngine {
    tracker: ContextTracker,
    resolver: ResponseResolver,
    backend: Arc<dyn AnswerBackend>,
}

impl ChatEngine {
    pub fn new(resolver: ResponseResolver, backend: Arc<dyn AnswerBackend>) -> Self {
        Self {
            tracker: ContextTracker,
            resolver,
            backend,
        }
    }

    /// Engine with the default rule stages.
    pub fn with_backend(backend: Arc<dyn AnswerBackend>) -> Self {
        Self::new(ResponseResolver::default(), backend)
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Let the backend prepare (e.g. load the knowledge base) before the
    /// first turn.
    pub async fn warm_up(&self) -> Result<(), ChatError> {
        self.backend.warm_up().await
    }

    /// Run one user turn against `context`.
    ///
    /// The context must not be touched by anything else until this returns;
    /// callers serialize turns per session.
    pub async fn turn(&self, utterance: &str, context: &mut ConversationContext) -> String {
        self.tracker.classify(utterance, context);
        let answer = self.backend.answer(&self.resolver, utterance, context).await;
        self.tracker.record_answer(context, &answer);
        answer
    }

    /// Welcome message on first activation, `None` afterwards.
    pub fn activate(&self, context: &mut ConversationContext) -> Option<String> {
        self.tracker.welcome(context)
    }
}

// =============================================================================
// ChatSession
// =============================================================================

/// One chat session: its context plus bookkeeping.
pub struct ChatSession {
    pub id: Uuid,
    /// Epoch seconds.
    pub started_at: i64,
    /// Epoch seconds of the last turn or activation.
    pub last_message_at: i64,
    pub message_count: u32,
    context: ConversationContext,
    engine: Arc<ChatEngine>,
}

impl ChatSession {
    pub fn new(engine: Arc<ChatEngine>) -> Self {
        let now = Local::now().timestamp();
        Self {
            id: Uuid::new_v4(),
            started_at: now,
            last_message_at: now,
            message_count: 0,
            context: ConversationContext::default(),
            engine,
        }
    }

    pub fn context(&self) -> &ConversationContext {
        &self.context
    }

    /// Handle one user utterance and return the reply.
    pub async fn on_user_turn(&mut self, utterance: &str) -> String {
        let answer = self.engine.turn(utterance, &mut self.context).await;
        self.last_message_at = Local::now().timestamp();
        self.message_count += 1;
        answer
    }

    /// Show the session for the first time. Returns the welcome message once.
    pub fn activate(&mut self) -> Option<String> {
        let welcome = self.engine.activate(&mut self.context);
        if welcome.is_some() {
            self.last_message_at = Local::now().timestamp();
        }
        welcome
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{KnowledgeBackend, KNOWLEDGE_UNAVAILABLE_REPLY};
    use crate::context::WELCOME_MESSAGE;
    use crate::knowledge::{
        FileKnowledgeSource, KnowledgeBase, KnowledgeEntry, KnowledgeLoader,
        StaticKnowledgeSource,
    };
    use crate::resolver::FALLBACK_REPLY;
    use crate::rules::{ELABORATION_SUFFIX, FOLLOW_UP_THANKS_REPLY, GREETING_REPLY};
    use unibot_core::config::CachePolicy;

    fn engine() -> Arc<ChatEngine> {
        let kb = KnowledgeBase::new(vec![KnowledgeEntry {
            questions: vec!["What are the library hours?".to_string()],
            keywords: vec!["library".to_string()],
            answer: "The library is open 8am to 10pm.".to_string(),
        }]);
        let loader = KnowledgeLoader::new(
            Arc::new(StaticKnowledgeSource::new(kb)),
            CachePolicy::Cached,
        );
        Arc::new(ChatEngine::with_backend(Arc::new(KnowledgeBackend::new(
            Arc::new(loader),
        ))))
    }

    #[tokio::test]
    async fn test_new_session_state() {
        let session = ChatSession::new(engine());
        assert_ne!(session.id, Uuid::nil());
        assert_eq!(session.message_count, 0);
        assert!(session.context().is_first_interaction);
    }

    #[tokio::test]
    async fn test_activate_welcomes_once() {
        let mut session = ChatSession::new(engine());
        assert_eq!(session.activate().as_deref(), Some(WELCOME_MESSAGE));
        assert!(session.activate().is_none());
        assert_eq!(session.context().last_answer.as_deref(), Some(WELCOME_MESSAGE));
    }

    #[tokio::test]
    async fn test_turn_records_answer_and_question() {
        let mut session = ChatSession::new(engine());
        let reply = session
            .on_user_turn("Where can I find the library building")
            .await;
        assert_eq!(reply, "The library is open 8am to 10pm.");
        assert_eq!(session.message_count, 1);
        assert_eq!(
            session.context().last_question.as_deref(),
            Some("Where can I find the library building")
        );
        assert_eq!(session.context().last_answer.as_deref(), Some(reply.as_str()));
    }

    #[tokio::test]
    async fn test_conversation_flow() {
        let mut session = ChatSession::new(engine());

        assert_eq!(session.on_user_turn("Hi").await, GREETING_REPLY);
        // Short and previous answer present: follow-up, but no follow-up rule fires.
        assert_eq!(
            session.on_user_turn("library").await,
            "The library is open 8am to 10pm."
        );
        assert!(session.context().is_follow_up);

        assert_eq!(
            session.on_user_turn("tell me more").await,
            format!("The library is open 8am to 10pm.\n\n{}", ELABORATION_SUFFIX)
        );
        assert_eq!(session.on_user_turn("thanks").await, FOLLOW_UP_THANKS_REPLY);
        assert_eq!(session.context().last_question.as_deref(), Some("Hi"));
        assert_eq!(session.message_count, 4);
    }

    #[tokio::test]
    async fn test_short_greeting_after_welcome_keeps_empty_anchor() {
        let mut session = ChatSession::new(engine());
        session.activate();
        assert_eq!(session.on_user_turn("Hi").await, GREETING_REPLY);
        assert!(session.context().is_follow_up);
        assert!(session.context().last_question.is_none());
    }

    #[tokio::test]
    async fn test_first_turn_is_never_follow_up() {
        let mut session = ChatSession::new(engine());
        assert_eq!(session.on_user_turn("more").await, FALLBACK_REPLY);
        assert!(!session.context().is_follow_up);
    }

    #[tokio::test]
    async fn test_failed_turn_keeps_session_usable() {
        let loader = KnowledgeLoader::new(
            Arc::new(FileKnowledgeSource::new("/nonexistent/knowledge.json")),
            CachePolicy::Cached,
        );
        let engine = Arc::new(ChatEngine::with_backend(Arc::new(KnowledgeBackend::new(
            Arc::new(loader),
        ))));
        let mut session = ChatSession::new(engine);

        assert_eq!(
            session.on_user_turn("library hours").await,
            KNOWLEDGE_UNAVAILABLE_REPLY
        );
        assert_eq!(
            session.context().last_answer.as_deref(),
            Some(KNOWLEDGE_UNAVAILABLE_REPLY)
        );
        assert_eq!(
            session.on_user_turn("tell me more").await,
            KNOWLEDGE_UNAVAILABLE_REPLY
        );
        assert_eq!(session.message_count, 2);
    }
}
