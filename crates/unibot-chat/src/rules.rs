//! Ordered predicate-to-reply rules for the conversational stages.
//!
//! Each stage is a `Vec<Rule>` evaluated front to back; the first rule whose
//! matcher fires produces the reply. Reordering a stage means reordering its
//! vector, nothing else.

use std::sync::LazyLock;

use regex::Regex;

use crate::context::ConversationContext;

/// Follow-up acknowledgement of thanks.
pub const FOLLOW_UP_THANKS_REPLY: &str =
    "You're very welcome! 😊 Let me know if you need anything else.";
/// Appended (after a blank line) to the previous answer when more detail is requested.
pub const ELABORATION_SUFFIX: &str =
    "For more detailed information, please visit our website or contact the relevant department.";
/// Clarifying question after an affirmation.
pub const AFFIRMATION_REPLY: &str = "Great! What specific information would you like about this?";
/// Greeting.
pub const GREETING_REPLY: &str = "Hello! 😊 How can I help you today?";
/// Reply to "how are you".
pub const WELLBEING_REPLY: &str =
    "I'm doing great, thanks for asking! How can I assist you today?";
/// Thanks outside of a follow-up.
pub const THANKS_REPLY: &str = "You're very welcome! 😊";

static AFFIRMATION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(yes|yeah|yep|sure|ok)").expect("Invalid affirmation regex"));

// =============================================================================
// Matcher / Reply / Rule
// =============================================================================

/// Predicate over the lowercased utterance.
#[derive(Debug, Clone)]
pub enum Matcher {
    /// Fires if any of the substrings occurs.
    ContainsAny(&'static [&'static str]),
    /// Fires if the pattern finds a match anywhere.
    Pattern(Regex),
}

impl Matcher {
    pub fn matches(&self, lowered: &str) -> bool {
        match self {
            Matcher::ContainsAny(needles) => needles.iter().any(|n| lowered.contains(n)),
            Matcher::Pattern(re) => re.is_match(lowered),
        }
    }
}

/// What a rule answers with once it fires.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Fixed(&'static str),
    /// The previous answer, a blank line, then [`ELABORATION_SUFFIX`].
    ElaborateLastAnswer,
}

/// A named matcher/reply pair.
#[derive(Debug, Clone)]
pub struct Rule {
    pub name: &'static str,
    pub matcher: Matcher,
    pub reply: Reply,
}

impl Rule {
    pub fn new(name: &'static str, matcher: Matcher, reply: Reply) -> Self {
        Self {
            name,
            matcher,
            reply,
        }
    }

    /// Reply for `lowered`, or `None` if the rule does not fire.
    ///
    /// An elaboration rule does not fire when there is no previous answer.
    pub fn apply(&self, lowered: &str, context: &ConversationContext) -> Option<String> {
        if !self.matcher.matches(lowered) {
            return None;
        }
        match self.reply {
            Reply::Fixed(text) => Some(text.to_string()),
            Reply::ElaborateLastAnswer => context
                .last_answer
                .as_ref()
                .map(|last| format!("{}\n\n{}", last, ELABORATION_SUFFIX)),
        }
    }
}

/// First rule in `rules` that fires, with its name.
pub fn first_match<'a>(
    rules: &'a [Rule],
    lowered: &str,
    context: &ConversationContext,
) -> Option<(&'a str, String)> {
    rules
        .iter()
        .find_map(|rule| rule.apply(lowered, context).map(|reply| (rule.name, reply)))
}

// =============================================================================
// Default stages
// =============================================================================

/// Rules consulted only when the utterance is a follow-up.
pub fn follow_up_rules() -> Vec<Rule> {
    vec![
        Rule::new(
            "follow_up_thanks",
            Matcher::ContainsAny(&["thank"]),
            Reply::Fixed(FOLLOW_UP_THANKS_REPLY),
        ),
        Rule::new(
            "elaborate",
            Matcher::ContainsAny(&["more", "detail"]),
            Reply::ElaborateLastAnswer,
        ),
        Rule::new(
            "affirmation",
            Matcher::Pattern(AFFIRMATION_RE.clone()),
            Reply::Fixed(AFFIRMATION_REPLY),
        ),
    ]
}

/// Canned conversational intents, consulted for every utterance.
pub fn intent_rules() -> Vec<Rule> {
    vec![
        Rule::new(
            "greeting",
            Matcher::ContainsAny(&["hi", "hello", "hey"]),
            Reply::Fixed(GREETING_REPLY),
        ),
        Rule::new(
            "wellbeing",
            Matcher::ContainsAny(&["how are you"]),
            Reply::Fixed(WELLBEING_REPLY),
        ),
        Rule::new(
            "thanks",
            Matcher::ContainsAny(&["thank"]),
            Reply::Fixed(THANKS_REPLY),
        ),
    ]
}

// =============================================================================
// Tests
// =============================================================================
