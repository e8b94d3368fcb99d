//! Chat orchestrator: session registry and message validation.
//!
//! Keeps one [`ChatSession`] per session id, each behind its own async lock
//! so turns on a session run one at a time while different sessions proceed
//! independently.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Local, TimeZone};
use tokio::sync::Mutex as AsyncMutex;
use unibot_core::config::{BackendKind, ChatConfig, UnibotConfig};
use uuid::Uuid;

use crate::backend::{AnswerBackend, KnowledgeBackend};
use crate::completion::CompletionBackend;
use crate::error::ChatError;
use crate::knowledge::KnowledgeLoader;
use crate::session::{ChatEngine, ChatSession};
use crate::types::{Activation, ChatReply, SessionSummary};

type SharedSession = Arc<AsyncMutex<ChatSession>>;

struct SessionSlot {
    session: SharedSession,
    /// Epoch seconds, used for expiry without taking the session lock.
    last_active: i64,
}

/// Central coordinator for chat sessions.
pub struct ChatOrchestrator {
    engine: Arc<ChatEngine>,
    sessions: Mutex<HashMap<Uuid, SessionSlot>>,
    config: ChatConfig,
}

impl ChatOrchestrator {
    /// Create a new orchestrator around an engine.
    pub fn new(config: ChatConfig, engine: Arc<ChatEngine>) -> Self {
        Self {
            engine,
            sessions: Mutex::new(HashMap::new()),
            config,
        }
    }

    /// Build the configured backend and wrap it in an orchestrator.
    pub fn from_config(config: &UnibotConfig) -> Result<Self, ChatError> {
        let backend = build_backend(config)?;
        tracing::info!(backend = backend.name(), "Chat backend ready");
        Ok(Self::new(
            config.chat.clone(),
            Arc::new(ChatEngine::with_backend(backend)),
        ))
    }

    pub fn engine(&self) -> &Arc<ChatEngine> {
        &self.engine
    }

    /// Create a fresh session and return its id.
    pub fn create_session(&self) -> Uuid {
        self.resolve_session(None).0
    }

    /// Activate a session (creating it if unknown or expired).
    pub async fn activate(&self, session_id: Option<Uuid>) -> Activation {
        let (id, session) = self.resolve_session(session_id);
        let welcome = session.lock().await.activate();
        Activation {
            session_id: id,
            welcome,
        }
    }

    /// Handle an incoming chat message.
    ///
    /// The message is trimmed and validated before it reaches the engine.
    /// An unknown or expired `session_id` starts a new session.
    pub async fn handle_message(
        &self,
        message: &str,
        session_id: Option<Uuid>,
    ) -> Result<ChatReply, ChatError> {
        if !self.config.enabled {
            return Err(ChatError::Disabled);
        }

        let message = message.trim();
        if message.is_empty() {
            return Err(ChatError::EmptyMessage);
        }
        if message.chars().count() > self.config.max_message_length {
            return Err(ChatError::MessageTooLong(self.config.max_message_length));
        }

        let (id, session) = self.resolve_session(session_id);
        let mut session = session.lock().await;
        let answer = session.on_user_turn(message).await;
        let follow_up = session.context().is_follow_up;

        tracing::debug!(session_id = %id, follow_up, "Message handled");

        Ok(ChatReply {
            answer,
            session_id: id,
            follow_up,
        })
    }

    /// Summary of one live session.
    pub async fn get_session(&self, session_id: Uuid) -> Option<SessionSummary> {
        let session = self.lookup(session_id)?;
        let session = session.lock().await;
        Some(summarize(&session))
    }

    /// Summaries of all live sessions.
    pub async fn list_sessions(&self) -> Vec<SessionSummary> {
        let sessions: Vec<SharedSession> = self
            .lock_sessions()
            .values()
            .map(|slot| Arc::clone(&slot.session))
            .collect();

        let mut summaries = Vec::with_capacity(sessions.len());
        for session in sessions {
            summaries.push(summarize(&*session.lock().await));
        }
        summaries.sort_by(|a, b| a.started_at.cmp(&b.started_at));
        summaries
    }

    /// Delete a session by id.
    pub fn delete_session(&self, session_id: Uuid) -> Result<(), ChatError> {
        if self.lock_sessions().remove(&session_id).is_some() {
            tracing::info!(session_id = %session_id, "Session deleted");
            Ok(())
        } else {
            Err(ChatError::SessionNotFound(session_id))
        }
    }

    /// Number of sessions currently held.
    pub fn session_count(&self) -> usize {
        self.lock_sessions().len()
    }

    /// Drop every expired session. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let mut sessions = self.lock_sessions();
        let now = Local::now().timestamp();
        let before = sessions.len();
        sessions.retain(|_, slot| !self.is_expired(slot.last_active, now));
        before - sessions.len()
    }

    // -- Private helpers --

    /// The map holds no invariants a panicking holder could break, so a
    /// poisoned lock is recovered.
    fn lock_sessions(&self) -> MutexGuard<'_, HashMap<Uuid, SessionSlot>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lookup(&self, session_id: Uuid) -> Option<SharedSession> {
        let sessions = self.lock_sessions();
        let now = Local::now().timestamp();
        let session = sessions
            .get(&session_id)
            .filter(|slot| !self.is_expired(slot.last_active, now))
            .map(|slot| Arc::clone(&slot.session));
        session
    }

    fn is_expired(&self, last_active: i64, now: i64) -> bool {
        let timeout_secs = i64::from(self.config.session_timeout_minutes) * 60;
        now - last_active > timeout_secs
    }

    /// Resolve a live session or create a new one.
    fn resolve_session(&self, requested: Option<Uuid>) -> (Uuid, SharedSession) {
        let mut sessions = self.lock_sessions();
        let now = Local::now().timestamp();

        if let Some(sid) = requested {
            if let Some(slot) = sessions.get_mut(&sid) {
                if !self.is_expired(slot.last_active, now) {
                    slot.last_active = now;
                    return (sid, Arc::clone(&slot.session));
                }
                tracing::info!(session_id = %sid, "Session expired");
                sessions.remove(&sid);
            }
        }

        sessions.retain(|_, slot| !self.is_expired(slot.last_active, now));

        let session = ChatSession::new(Arc::clone(&self.engine));
        let sid = session.id;
        let shared = Arc::new(AsyncMutex::new(session));
        sessions.insert(
            sid,
            SessionSlot {
                session: Arc::clone(&shared),
                last_active: now,
            },
        );
        tracing::info!(session_id = %sid, "Session created");
        (sid, shared)
    }

    #[cfg(test)]
    fn backdate(&self, session_id: Uuid, seconds: i64) {
        if let Some(slot) = self.lock_sessions().get_mut(&session_id) {
            slot.last_active -= seconds;
        }
    }
}

/// Build the answering backend selected in configuration.
pub fn build_backend(config: &UnibotConfig) -> Result<Arc<dyn AnswerBackend>, ChatError> {
    let backend: Arc<dyn AnswerBackend> = match config.chat.backend {
        BackendKind::Knowledge => Arc::new(KnowledgeBackend::new(Arc::new(
            KnowledgeLoader::from_config(&config.knowledge)?,
        ))),
        BackendKind::Completion => Arc::new(CompletionBackend::from_config(&config.completion)?),
    };
    Ok(backend)
}

fn summarize(session: &ChatSession) -> SessionSummary {
    SessionSummary {
        id: session.id,
        started_at: format_epoch(session.started_at),
        last_message_at: format_epoch(session.last_message_at),
        message_count: session.message_count,
    }
}

/// Format epoch seconds as ISO 8601 string.
fn format_epoch(epoch: i64) -> String {
    Local
        .timestamp_opt(epoch, 0)
        .single()
        .map(|dt: DateTime<Local>| dt.to_rfc3339())
        .unwrap_or_else(|| epoch.to_string())
}

// =============================================================================
// Tests
// =============================================================================
