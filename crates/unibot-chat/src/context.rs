//! Conversation context tracking.
//!
//! Holds the single most recent question/answer pair of a session and
//! decides, from shallow lexical cues, whether a new utterance continues
//! the previous exchange.

use serde::{Deserialize, Serialize};

/// Reply emitted the first time a session is activated.
pub const WELCOME_MESSAGE: &str =
    "Hello! I'm your university assistant. How can I help you today? 😊";

/// Substrings that mark an utterance as a likely continuation.
const CUE_WORDS: &[&str] = &["this", "that", "more", "about"];

/// Utterances with fewer whitespace-delimited tokens than this are "short".
const SHORT_UTTERANCE_WORDS: usize = 4;

// =============================================================================
// ConversationContext
// =============================================================================

/// Rolling state for one chat session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationContext {
    /// Most recent utterance that was not a follow-up.
    pub last_question: Option<String>,
    /// Most recent reply, follow-up or not.
    pub last_answer: Option<String>,
    /// Whether the current utterance continues the previous exchange.
    pub is_follow_up: bool,
    /// True until the welcome message has been produced.
    pub is_first_interaction: bool,
}

impl Default for ConversationContext {
    fn default() -> Self {
        Self {
            last_question: None,
            last_answer: None,
            is_follow_up: false,
            is_first_interaction: true,
        }
    }
}

// =============================================================================
// ContextTracker
// =============================================================================

/// Classifies utterances against a [`ConversationContext`] and records replies.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContextTracker;

impl ContextTracker {
    /// Decide whether `utterance` is a follow-up and update `context`.
    ///
    /// A follow-up needs a surface cue (a cue word or a short utterance) and
    /// a previous answer; without a previous answer the result is always
    /// false. Non-follow-ups replace `last_question`.
    pub fn classify(&self, utterance: &str, context: &mut ConversationContext) -> bool {
        let lowered = utterance.to_lowercase();
        let cue_matched = is_short(utterance) || CUE_WORDS.iter().any(|cue| lowered.contains(cue));

        let follow_up = cue_matched && context.last_answer.is_some();
        context.is_follow_up = follow_up;

        if !follow_up {
            context.last_question = Some(utterance.to_string());
        }

        tracing::debug!(follow_up, cue_matched, "Utterance classified");
        follow_up
    }

    /// Record the reply produced for the current turn.
    pub fn record_answer(&self, context: &mut ConversationContext, answer: &str) {
        context.last_answer = Some(answer.to_string());
    }

    /// Produce the welcome message on the first activation of a session.
    ///
    /// Returns `None` once the session has already been welcomed.
    pub fn welcome(&self, context: &mut ConversationContext) -> Option<String> {
        if !context.is_first_interaction {
            return None;
        }
        self.record_answer(context, WELCOME_MESSAGE);
        context.is_first_interaction = false;
        Some(WELCOME_MESSAGE.to_string())
    }
}

/// Number of whitespace-delimited tokens.
pub fn word_count(utterance: &str) -> usize {
    utterance.split_whitespace().count()
}

fn is_short(utterance: &str) -> bool {
    word_count(utterance) < SHORT_UTTERANCE_WORDS
}

// =============================================================================
// Tests
// =============================================================================
