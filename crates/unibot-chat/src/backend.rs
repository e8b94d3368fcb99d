//! Answering backends.
//!
//! A backend owns the final lookup stage of a turn and its failure mode.
//! Both backends delegate the follow-up and canned-intent stages to the
//! shared [`ResponseResolver`], so swapping backends never changes those.

use std::sync::Arc;

use async_trait::async_trait;

use crate::context::ConversationContext;
use crate::error::ChatError;
use crate::knowledge::KnowledgeLoader;
use crate::resolver::ResponseResolver;

/// Reply when the knowledge document cannot be loaded.
pub const KNOWLEDGE_UNAVAILABLE_REPLY: &str =
    "Sorry, I'm having trouble accessing my knowledge right now. Please try again later.";

/// Produces the reply for one turn. Never fails: failures become fixed replies.
#[async_trait]
pub trait AnswerBackend: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Prepare ahead of the first turn. Failures are reported, not fatal.
    async fn warm_up(&self) -> Result<(), ChatError> {
        Ok(())
    }

    async fn answer(
        &self,
        resolver: &ResponseResolver,
        utterance: &str,
        context: &ConversationContext,
    ) -> String;
}

/// Answers from the static knowledge base.
pub struct KnowledgeBackend {
    loader: Arc<KnowledgeLoader>,
}

impl KnowledgeBackend {
    pub fn new(loader: Arc<KnowledgeLoader>) -> Self {
        Self { loader }
    }
}

#[async_trait]
impl AnswerBackend for KnowledgeBackend {
    fn name(&self) -> &'static str {
        "knowledge"
    }

    async fn warm_up(&self) -> Result<(), ChatError> {
        self.loader.load().await.map(|_| ())
    }

    /// Loads the knowledge base before any stage runs, so a load failure
    /// produces [`KNOWLEDGE_UNAVAILABLE_REPLY`] for every utterance.
    async fn answer(
        &self,
        resolver: &ResponseResolver,
        utterance: &str,
        context: &ConversationContext,
    ) -> String {
        match self.loader.load().await {
            Ok(kb) => resolver.resolve(utterance, context, &kb),
            Err(e) => {
                tracing::error!(
                    source = %self.loader.describe(),
                    error = %e,
                    "Knowledge base unavailable"
                );
                KNOWLEDGE_UNAVAILABLE_REPLY.to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knowledge::{
        FileKnowledgeSource, KnowledgeBase, KnowledgeEntry, StaticKnowledgeSource,
    };
    use crate::resolver::FALLBACK_REPLY;
    use unibot_core::config::CachePolicy;

    fn static_backend(entries: Vec<KnowledgeEntry>) -> KnowledgeBackend {
        let source = Arc::new(StaticKnowledgeSource::new(KnowledgeBase::new(entries)));
        KnowledgeBackend::new(Arc::new(KnowledgeLoader::new(source, CachePolicy::Cached)))
    }

    #[tokio::test]
    async fn test_knowledge_backend_answers_from_kb() {
        let backend = static_backend(vec![KnowledgeEntry {
            questions: vec![],
            keywords: vec!["cafeteria".to_string()],
            answer: "Main hall, ground floor.".to_string(),
        }]);
        let resolver = ResponseResolver::default();
        let ctx = ConversationContext::default();
        assert_eq!(
            backend.answer(&resolver, "where is the cafeteria", &ctx).await,
            "Main hall, ground floor."
        );
        assert_eq!(
            backend.answer(&resolver, "asdkjhasd", &ctx).await,
            FALLBACK_REPLY
        );
    }

    #[tokio::test]
    async fn test_load_failure_yields_apology() {
        let source = Arc::new(FileKnowledgeSource::new("/nonexistent/knowledge.json"));
        let backend =
            KnowledgeBackend::new(Arc::new(KnowledgeLoader::new(source, CachePolicy::Cached)));
        let resolver = ResponseResolver::default();
        let ctx = ConversationContext::default();

        assert_eq!(
            backend.answer(&resolver, "where is the cafeteria", &ctx).await,
            KNOWLEDGE_UNAVAILABLE_REPLY
        );
        // The load happens before the conversational stages.
        assert_eq!(
            backend.answer(&resolver, "hello", &ctx).await,
            KNOWLEDGE_UNAVAILABLE_REPLY
        );
    }

    #[tokio::test]
    async fn test_malformed_document_yields_apology() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("knowledge.json");
        std::fs::write(&path, "{ not json").unwrap();
        let source = Arc::new(FileKnowledgeSource::new(&path));
        let backend = KnowledgeBackend::new(Arc::new(KnowledgeLoader::new(
            source,
            CachePolicy::ReloadPerTurn,
        )));

        let resolver = ResponseResolver::default();
        let ctx = ConversationContext::default();
        assert_eq!(
            backend.answer(&resolver, "campus map", &ctx).await,
            KNOWLEDGE_UNAVAILABLE_REPLY
        );

        assert!(backend.warm_up().await.is_err());

        // Fixing the file recovers on the next turn.
        std::fs::write(
            &path,
            r#"[{"questions": ["campus map"], "keywords": [], "answer": "Fixed."}]"#,
        )
        .unwrap();
        assert!(backend.warm_up().await.is_ok());
        assert_eq!(backend.answer(&resolver, "campus map", &ctx).await, "Fixed.");
    }
}
