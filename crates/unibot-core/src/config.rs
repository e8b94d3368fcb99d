use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{Result, UnibotError};

/// Top-level configuration for the Unibot application.
///
/// Loaded from `~/.unibot/config.toml` by default. Every section falls back
/// to its defaults when omitted, so a partial file is always valid TOML input.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UnibotConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub chat: ChatConfig,
    #[serde(default)]
    pub knowledge: KnowledgeConfig,
    #[serde(default)]
    pub completion: CompletionConfig,
}

impl UnibotConfig {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file cannot be read, parsed, or fails validation.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: UnibotConfig = toml::from_str(&content)?;
        config.validate()?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults if the
    /// file does not exist or cannot be parsed.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }

    /// Reject values that would make the engine unusable.
    pub fn validate(&self) -> Result<()> {
        if self.chat.max_message_length == 0 {
            return Err(UnibotError::Config(
                "chat.max_message_length must be greater than zero".to_string(),
            ));
        }
        if self.knowledge.source.trim().is_empty() {
            return Err(UnibotError::Config(
                "knowledge.source must not be empty".to_string(),
            ));
        }
        if !(0.0..=2.0).contains(&self.completion.temperature) {
            return Err(UnibotError::Config(format!(
                "completion.temperature must be within 0.0..=2.0, got {}",
                self.completion.temperature
            )));
        }
        if self.server.rate_limit_per_sec == 0 {
            return Err(UnibotError::Config(
                "server.rate_limit_per_sec must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

/// HTTP server settings for the chat widget endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address.
    pub host: String,
    /// Bind port.
    pub port: u16,
    /// Extra CORS origins allowed to call the API (the widget's page origin).
    pub allowed_origins: Vec<String>,
    /// Global request budget per second for `/api/*`.
    pub rate_limit_per_sec: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3030,
            allowed_origins: Vec::new(),
            rate_limit_per_sec: 50,
        }
    }
}

/// Which component answers once the conversational rules have not matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// Static knowledge-base lookup.
    #[default]
    Knowledge,
    /// Remote chat-completion service.
    Completion,
}

/// Chat engine settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// Whether the chat endpoint accepts messages.
    pub enabled: bool,
    /// Answering backend.
    pub backend: BackendKind,
    /// Maximum accepted message length in characters.
    pub max_message_length: usize,
    /// Idle minutes after which a session is discarded.
    pub session_timeout_minutes: u32,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            backend: BackendKind::Knowledge,
            max_message_length: 2000,
            session_timeout_minutes: 30,
        }
    }
}

/// When the knowledge document is (re)loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CachePolicy {
    /// Keep the first successfully loaded document for the process lifetime.
    #[default]
    Cached,
    /// Fetch and parse the document again on every turn.
    ReloadPerTurn,
}

/// Knowledge source settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KnowledgeConfig {
    /// Path to a JSON file, or an `http://` / `https://` URL.
    pub source: String,
    /// Cache policy for the loaded document.
    pub cache: CachePolicy,
    /// Timeout for remote fetches, in seconds.
    pub fetch_timeout_secs: u64,
}

impl Default for KnowledgeConfig {
    fn default() -> Self {
        Self {
            source: "knowledge.json".to_string(),
            cache: CachePolicy::Cached,
            fetch_timeout_secs: 10,
        }
    }
}

impl KnowledgeConfig {
    /// Whether `source` names a remote document.
    pub fn is_remote(&self) -> bool {
        self.source.starts_with("http://") || self.source.starts_with("https://")
    }
}

/// Remote chat-completion backend settings (OpenAI-compatible).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CompletionConfig {
    /// Base URL; `/v1/chat/completions` is appended.
    pub base_url: String,
    /// Model identifier.
    pub model: String,
    /// Name of the environment variable holding the API key.
    pub api_key_env: String,
    /// Sampling temperature.
    pub temperature: f32,
    /// Maximum tokens to generate.
    pub max_tokens: u32,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com".to_string(),
            model: "gpt-3.5-turbo".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            temperature: 0.7,
            max_tokens: 200,
            timeout_secs: 30,
        }
    }
}

impl CompletionConfig {
    /// Read the API key from the configured environment variable.
    pub fn api_key(&self) -> Option<String> {
        std::env::var(&self.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_default_config() {
        let config = UnibotConfig::default();
        assert_eq!(config.general.log_level, "info");
        assert_eq!(config.server.port, 3030);
        assert!(config.chat.enabled);
        assert_eq!(config.chat.backend, BackendKind::Knowledge);
        assert_eq!(config.chat.max_message_length, 2000);
        assert_eq!(config.knowledge.source, "knowledge.json");
        assert_eq!(config.knowledge.cache, CachePolicy::Cached);
        assert_eq!(config.completion.model, "gpt-3.5-turbo");
        assert_eq!(config.completion.max_tokens, 200);
        assert!((config.completion.temperature - 0.7).abs() < f32::EPSILON);
    }

    #[test]
    fn test_load_valid_config() {
        let content = r#"
[general]
log_level = "debug"

[server]
host = "0.0.0.0"
port = 8080
allowed_origins = ["https://www.example.edu"]

[chat]
backend = "completion"
session_timeout_minutes = 5

[knowledge]
source = "https://www.example.edu/knowledge.json"
cache = "reload_per_turn"

[completion]
model = "gpt-4o-mini"
temperature = 0.2
"#;
        let file = create_temp_config(content);
        let config = UnibotConfig::load(file.path()).unwrap();
        assert_eq!(config.general.log_level, "debug");
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.allowed_origins, vec!["https://www.example.edu"]);
        assert_eq!(config.chat.backend, BackendKind::Completion);
        assert_eq!(config.chat.session_timeout_minutes, 5);
        assert!(config.knowledge.is_remote());
        assert_eq!(config.knowledge.cache, CachePolicy::ReloadPerTurn);
        assert_eq!(config.completion.model, "gpt-4o-mini");
    }

    #[test]
    fn test_load_partial_config_uses_defaults() {
        let content = r#"
[general]
log_level = "warn"
"#;
        let file = create_temp_config(content);
        let config = UnibotConfig::load(file.path()).unwrap();
        assert_eq!(config.general.log_level, "warn");
        assert_eq!(config.server.port, 3030);
        assert_eq!(config.knowledge.fetch_timeout_secs, 10);
    }

    #[test]
    fn test_load_unknown_backend_fails() {
        let content = r#"
[chat]
backend = "telepathy"
"#;
        let file = create_temp_config(content);
        let err = UnibotConfig::load(file.path()).unwrap_err();
        assert!(matches!(err, UnibotError::Config(_)));
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let config = UnibotConfig::load_or_default(Path::new("/nonexistent/config.toml"));
        assert_eq!(config.server.port, 3030);
    }

    #[test]
    fn test_load_or_default_invalid_values() {
        let content = r#"
[chat]
max_message_length = 0
"#;
        let file = create_temp_config(content);
        let config = UnibotConfig::load_or_default(file.path());
        assert_eq!(config.chat.max_message_length, 2000);
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = UnibotConfig::default();
        config.knowledge.cache = CachePolicy::ReloadPerTurn;
        config.save(&path).unwrap();

        let reloaded = UnibotConfig::load(&path).unwrap();
        assert_eq!(reloaded.knowledge.cache, CachePolicy::ReloadPerTurn);
        assert_eq!(reloaded.server.port, config.server.port);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = UnibotConfig::default();
        config.knowledge.source = "  ".to_string();
        assert!(config.validate().is_err());

        let mut config = UnibotConfig::default();
        config.completion.temperature = 3.5;
        assert!(config.validate().is_err());

        let mut config = UnibotConfig::default();
        config.server.rate_limit_per_sec = 0;
        assert!(config.validate().is_err());

        assert!(UnibotConfig::default().validate().is_ok());
    }

    #[test]
    fn test_knowledge_is_remote() {
        let mut k = KnowledgeConfig::default();
        assert!(!k.is_remote());
        k.source = "http://localhost/knowledge.json".to_string();
        assert!(k.is_remote());
    }

    #[test]
    fn test_completion_api_key_missing_env() {
        let c = CompletionConfig {
            api_key_env: "UNIBOT_TEST_KEY_THAT_IS_NEVER_SET".to_string(),
            ..CompletionConfig::default()
        };
        assert!(c.api_key().is_none());
    }

    #[test]
    fn test_example_config_matches_defaults() {
        let config: UnibotConfig =
            toml::from_str(include_str!("../../../config.example.toml")).unwrap();
        config.validate().unwrap();
        assert_eq!(config.server.port, 3030);
        assert_eq!(config.chat.backend, BackendKind::Knowledge);
        assert_eq!(config.knowledge.cache, CachePolicy::Cached);
        assert_eq!(config.completion.max_tokens, 200);
    }
}
