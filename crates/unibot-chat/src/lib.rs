//! Conversational engine for the university assistant.
//!
//! Tracks per-session dialogue context, resolves replies through an ordered
//! set of conversational rules, and falls back to a knowledge base or a
//! remote completion service for everything else.

pub mod backend;
pub mod completion;
pub mod context;
pub mod error;
pub mod knowledge;
pub mod orchestrator;
pub mod resolver;
pub mod rules;
pub mod session;
pub mod types;

pub use backend::{AnswerBackend, KnowledgeBackend};
pub use completion::CompletionBackend;
pub use context::{ContextTracker, ConversationContext, WELCOME_MESSAGE};
pub use error::ChatError;
pub use knowledge::{KnowledgeBase, KnowledgeEntry, KnowledgeLoader, KnowledgeSource};
pub use orchestrator::ChatOrchestrator;
pub use resolver::ResponseResolver;
pub use session::{ChatEngine, ChatSession};
pub use types::{Activation, ChatReply, SessionSummary};
