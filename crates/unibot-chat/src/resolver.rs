//! Reply resolution: follow-up rules, canned intents, knowledge base, fallback.

use crate::context::ConversationContext;
use crate::knowledge::KnowledgeBase;
use crate::rules::{first_match, follow_up_rules, intent_rules, Rule};

/// Reply when no stage produced an answer.
pub const FALLBACK_REPLY: &str =
    "I'm not sure I understand. Could you please rephrase your question or ask about something else?";

/// Produces a reply for an utterance from the ordered resolution stages.
///
/// Resolution is pure: the caller records the reply into the context.
#[derive(Debug, Clone)]
pub struct ResponseResolver {
    follow_up: Vec<Rule>,
    intents: Vec<Rule>,
}

impl Default for ResponseResolver {
    fn default() -> Self {
        Self::new(follow_up_rules(), intent_rules())
    }
}

impl ResponseResolver {
    /// Create a resolver with custom rule stages.
    pub fn new(follow_up: Vec<Rule>, intents: Vec<Rule>) -> Self {
        Self { follow_up, intents }
    }

    /// Full resolution against a knowledge base.
    pub fn resolve(
        &self,
        utterance: &str,
        context: &ConversationContext,
        kb: &KnowledgeBase,
    ) -> String {
        self.resolve_conversational(utterance, context)
            .or_else(|| {
                kb.lookup(utterance).map(|(entry, kind)| {
                    tracing::debug!(?kind, "Knowledge base match");
                    entry.answer.clone()
                })
            })
            .unwrap_or_else(|| {
                tracing::debug!("No stage matched, using fallback");
                FALLBACK_REPLY.to_string()
            })
    }

    /// Follow-up and canned-intent stages only.
    ///
    /// The follow-up stage is consulted only when `context.is_follow_up` is
    /// set; a follow-up that matches none of its rules is resolved as a fresh
    /// utterance.
    pub fn resolve_conversational(
        &self,
        utterance: &str,
        context: &ConversationContext,
    ) -> Option<String> {
        let lowered = utterance.to_lowercase();

        let follow_up = if context.is_follow_up {
            first_match(&self.follow_up, &lowered, context)
        } else {
            None
        };

        follow_up
            .or_else(|| first_match(&self.intents, &lowered, context))
            .map(|(rule, reply)| {
                tracing::debug!(rule, "Conversational rule matched");
                reply
            })
    }
}

// =============================================================================
// Tests
// =============================================================================
