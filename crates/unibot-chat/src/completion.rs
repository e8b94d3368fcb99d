//! Remote chat-completion backend (OpenAI-compatible).
//!
//! Sends a role-tagged message list to `{base_url}/v1/chat/completions` and
//! returns the first choice's content. Follow-ups are sent as a single
//! system message that replays the previous exchange.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use unibot_core::config::CompletionConfig;

use crate::backend::AnswerBackend;
use crate::context::ConversationContext;
use crate::error::ChatError;
use crate::resolver::ResponseResolver;

/// Reply when the completion service cannot be reached or errors.
pub const COMPLETION_UNAVAILABLE_REPLY: &str =
    "I'm having trouble connecting to the AI service. Please try again later.";
/// Reply when the service answers with no content.
pub const EMPTY_COMPLETION_REPLY: &str = "I couldn't generate a response for that question.";

const SYSTEM_PROMPT: &str = "You're a helpful university assistant. Provide concise, accurate information. Be friendly and professional. If you don't know something, say so.";

// =============================================================================
// Wire types
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionMessage {
    pub role: Role,
    pub content: String,
}

impl CompletionMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [CompletionMessage],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Build the message list for a turn.
///
/// A follow-up with a known anchor question replays the previous exchange in
/// a single system message; anything else is a system prompt plus the user
/// utterance.
pub fn build_messages(utterance: &str, context: &ConversationContext) -> Vec<CompletionMessage> {
    match (&context.last_question, context.is_follow_up) {
        (Some(question), true) => {
            let answer = context.last_answer.as_deref().unwrap_or_default();
            vec![CompletionMessage::system(format!(
                "You're a university assistant. The previous conversation:\nUser: {}\nYou: {}\nNow respond to this follow-up: {}",
                question, answer, utterance
            ))]
        }
        _ => vec![
            CompletionMessage::system(SYSTEM_PROMPT),
            CompletionMessage::user(utterance),
        ],
    }
}

// =============================================================================
// CompletionBackend
// =============================================================================

/// Answers with a remote chat-completion service.
pub struct CompletionBackend {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl CompletionBackend {
    pub fn new(config: &CompletionConfig, api_key: Option<String>) -> Result<Self, ChatError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ChatError::Completion(format!("HTTP client: {}", e)))?;
        Ok(Self {
            client,
            endpoint: format!("{}/v1/chat/completions", config.base_url.trim_end_matches('/')),
            api_key,
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        })
    }

    /// Build from configuration, reading the API key from the configured
    /// environment variable.
    pub fn from_config(config: &CompletionConfig) -> Result<Self, ChatError> {
        let api_key = config.api_key();
        if api_key.is_none() {
            tracing::warn!(
                env = %config.api_key_env,
                "No API key set for completion backend; requests will be unauthenticated"
            );
        }
        Self::new(config, api_key)
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Send one completion request. `Ok(None)` means the service answered
    /// without content.
    pub async fn complete(
        &self,
        messages: &[CompletionMessage],
    ) -> Result<Option<String>, ChatError> {
        let body = CompletionRequest {
            model: &self.model,
            messages,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        let mut request = self.client.post(&self.endpoint).json(&body);
        if let Some(ref key) = self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ChatError::Completion(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ChatError::Completion(format!("status {}: {}", status, text)));
        }

        let parsed: CompletionResponse = response
            .json()
            .await
            .map_err(|e| ChatError::Completion(format!("invalid response: {}", e)))?;

        Ok(parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty()))
    }
}

#[async_trait]
impl AnswerBackend for CompletionBackend {
    fn name(&self) -> &'static str {
        "completion"
    }

    async fn answer(
        &self,
        resolver: &ResponseResolver,
        utterance: &str,
        context: &ConversationContext,
    ) -> String {
        if let Some(reply) = resolver.resolve_conversational(utterance, context) {
            return reply;
        }

        let messages = build_messages(utterance, context);
        match self.complete(&messages).await {
            Ok(Some(answer)) => answer,
            Ok(None) => EMPTY_COMPLETION_REPLY.to_string(),
            Err(e) => {
                tracing::error!(endpoint = %self.endpoint, error = %e, "Completion request failed");
                COMPLETION_UNAVAILABLE_REPLY.to_string()
            }
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
