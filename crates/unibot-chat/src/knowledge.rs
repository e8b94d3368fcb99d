//! Static knowledge base: document format, sources, and lookup.
//!
//! The document is a JSON array of `{questions, keywords, answer}` objects.
//! Array order is match precedence. Elements that do not have all three
//! fields are skipped rather than failing the whole document.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;
use unibot_core::config::{CachePolicy, KnowledgeConfig};

use crate::error::ChatError;

// =============================================================================
// KnowledgeEntry / KnowledgeBase
// =============================================================================

/// One question/keyword/answer record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnowledgeEntry {
    /// Canonical phrasings, matched exactly (case-insensitive).
    pub questions: Vec<String>,
    /// Substring triggers (case-insensitive).
    pub keywords: Vec<String>,
    pub answer: String,
}

/// How an entry matched an utterance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchKind {
    Exact,
    Keyword,
}

impl KnowledgeEntry {
    /// Check this entry against an already-lowercased utterance.
    ///
    /// Exact question matches are reported before keyword matches. Empty
    /// keywords never match.
    pub fn match_kind(&self, lowered: &str) -> Option<MatchKind> {
        if self.questions.iter().any(|q| q.to_lowercase() == lowered) {
            return Some(MatchKind::Exact);
        }
        let keyword_hit = self
            .keywords
            .iter()
            // An empty keyword is a substring of everything; it would turn its
            // entry into a catch-all that shadows later entries and the fallback.
            .filter(|k| !k.is_empty())
            .any(|k| lowered.contains(&k.to_lowercase()));
        keyword_hit.then_some(MatchKind::Keyword)
    }
}

/// Ordered, read-only collection of knowledge entries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KnowledgeBase {
    entries: Vec<KnowledgeEntry>,
}

impl KnowledgeBase {
    pub fn new(entries: Vec<KnowledgeEntry>) -> Self {
        Self { entries }
    }

    /// Parse a knowledge document.
    ///
    /// Fails only if the text is not JSON or not an array. Elements that do
    /// not deserialize into a [`KnowledgeEntry`] are logged and skipped.
    pub fn parse(json: &str) -> Result<Self, ChatError> {
        let value: serde_json::Value = serde_json::from_str(json)
            .map_err(|e| ChatError::KnowledgeUnavailable(format!("invalid JSON: {}", e)))?;
        let serde_json::Value::Array(items) = value else {
            return Err(ChatError::KnowledgeUnavailable(
                "knowledge document must be a JSON array".to_string(),
            ));
        };

        let mut entries = Vec::with_capacity(items.len());
        for (index, item) in items.into_iter().enumerate() {
            match serde_json::from_value::<KnowledgeEntry>(item) {
                Ok(entry) => entries.push(entry),
                Err(e) => tracing::warn!(index, error = %e, "Skipping malformed knowledge entry"),
            }
        }
        Ok(Self { entries })
    }

    /// First entry, in document order, that matches the utterance either
    /// exactly or by keyword.
    pub fn lookup(&self, utterance: &str) -> Option<(&KnowledgeEntry, MatchKind)> {
        let lowered = utterance.to_lowercase();
        self.entries
            .iter()
            .find_map(|entry| entry.match_kind(&lowered).map(|kind| (entry, kind)))
    }

    pub fn entries(&self) -> &[KnowledgeEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// =============================================================================
// Sources
// =============================================================================

/// Somewhere a knowledge document can be fetched from.
#[async_trait]
pub trait KnowledgeSource: Send + Sync {
    /// Human-readable location for logs.
    fn describe(&self) -> String;

    /// Fetch and parse the document.
    async fn fetch(&self) -> Result<KnowledgeBase, ChatError>;
}

/// Knowledge document on the local filesystem.
pub struct FileKnowledgeSource {
    path: PathBuf,
}

impl FileKnowledgeSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl KnowledgeSource for FileKnowledgeSource {
    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    async fn fetch(&self) -> Result<KnowledgeBase, ChatError> {
        let content = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            ChatError::KnowledgeUnavailable(format!("{}: {}", self.path.display(), e))
        })?;
        KnowledgeBase::parse(&content)
    }
}

/// Knowledge document served over HTTP.
pub struct HttpKnowledgeSource {
    client: reqwest::Client,
    url: String,
}

impl HttpKnowledgeSource {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, ChatError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ChatError::KnowledgeUnavailable(format!("HTTP client: {}", e)))?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl KnowledgeSource for HttpKnowledgeSource {
    fn describe(&self) -> String {
        self.url.clone()
    }

    async fn fetch(&self) -> Result<KnowledgeBase, ChatError> {
        let body = self
            .client
            .get(&self.url)
            .send()
            .await
            .and_then(|resp| resp.error_for_status())
            .map_err(|e| ChatError::KnowledgeUnavailable(format!("{}: {}", self.url, e)))?
            .text()
            .await
            .map_err(|e| ChatError::KnowledgeUnavailable(format!("{}: {}", self.url, e)))?;
        KnowledgeBase::parse(&body)
    }
}

/// An in-memory knowledge base.
pub struct StaticKnowledgeSource {
    base: KnowledgeBase,
}

impl StaticKnowledgeSource {
    pub fn new(base: KnowledgeBase) -> Self {
        Self { base }
    }
}

#[async_trait]
impl KnowledgeSource for StaticKnowledgeSource {
    fn describe(&self) -> String {
        format!("static ({} entries)", self.base.len())
    }

    async fn fetch(&self) -> Result<KnowledgeBase, ChatError> {
        Ok(self.base.clone())
    }
}

// =============================================================================
// KnowledgeLoader
// =============================================================================

/// Wraps a [`KnowledgeSource`] with a [`CachePolicy`].
///
/// Under [`CachePolicy::Cached`] the first successful load is kept; a failed
/// load is not cached, so the next turn tries again.
pub struct KnowledgeLoader {
    source: Arc<dyn KnowledgeSource>,
    policy: CachePolicy,
    cache: OnceCell<Arc<KnowledgeBase>>,
}

impl KnowledgeLoader {
    pub fn new(source: Arc<dyn KnowledgeSource>, policy: CachePolicy) -> Self {
        Self {
            source,
            policy,
            cache: OnceCell::new(),
        }
    }

    /// Build a loader from configuration: an `http(s)://` source is fetched
    /// remotely, anything else is treated as a file path.
    pub fn from_config(config: &KnowledgeConfig) -> Result<Self, ChatError> {
        let source: Arc<dyn KnowledgeSource> = if config.is_remote() {
            Arc::new(HttpKnowledgeSource::new(
                config.source.clone(),
                Duration::from_secs(config.fetch_timeout_secs),
            )?)
        } else {
            Arc::new(FileKnowledgeSource::new(&config.source))
        };
        Ok(Self::new(source, config.cache))
    }

    pub fn policy(&self) -> CachePolicy {
        self.policy
    }

    pub fn describe(&self) -> String {
        self.source.describe()
    }

    /// Load the knowledge base according to the cache policy.
    pub async fn load(&self) -> Result<Arc<KnowledgeBase>, ChatError> {
        match self.policy {
            CachePolicy::ReloadPerTurn => self.fetch_logged().await.map(Arc::new),
            CachePolicy::Cached => self
                .cache
                .get_or_try_init(|| async { self.fetch_logged().await.map(Arc::new) })
                .await
                .cloned(),
        }
    }

    async fn fetch_logged(&self) -> Result<KnowledgeBase, ChatError> {
        let base = self.source.fetch().await?;
        tracing::info!(
            source = %self.source.describe(),
            entries = base.len(),
            "Knowledge base loaded"
        );
        Ok(base)
    }
}

// =============================================================================
// Tests
// =============================================================================
