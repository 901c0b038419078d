use thiserror::Error;

/// Top-level error type for the bits workspace.
///
/// Subsystem crates define their own error types and implement
/// `From<SubsystemError> for BitsError` so that `?` works across crate
/// boundaries.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum BitsError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Language model error: {0}")]
    Llm(String),

    #[error("Search error: {0}")]
    Search(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Tool error: {0}")]
    Tool(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("{operation} timed out after {secs} seconds")]
    Timeout { operation: String, secs: u64 },

    #[error("Request queue is full ({depth} pending)")]
    QueueFull { depth: usize },

    #[error("Shutdown in progress")]
    ShuttingDown,
}

impl From<toml::de::Error> for BitsError {
    fn from(err: toml::de::Error) -> Self {
        BitsError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for BitsError {
    fn from(err: toml::ser::Error) -> Self {
        BitsError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for BitsError {
    fn from(err: serde_json::Error) -> Self {
        BitsError::Serialization(err.to_string())
    }
}

/// A specialized `Result` type for bits operations.
pub type Result<T> = std::result::Result<T, BitsError>;
