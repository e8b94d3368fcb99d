use thiserror::Error;

/// Top-level error type for the Unibot system.
///
/// Covers configuration loading and server startup. The chat engine has
/// its own error type, since its failures never leave a turn.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum UnibotError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("API error: {0}")]
    Api(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<toml::de::Error> for UnibotError {
    fn from(err: toml::de::Error) -> Self {
        UnibotError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for UnibotError {
    fn from(err: toml::ser::Error) -> Self {
        UnibotError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for UnibotError {
    fn from(err: serde_json::Error) -> Self {
        UnibotError::Serialization(err.to_string())
    }
}

/// A specialized `Result` type for Unibot operations.
pub type Result<T> = std::result::Result<T, UnibotError>;
