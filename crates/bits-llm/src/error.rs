//! Error types for the language model service.

use bits_core::error::BitsError;

/// Errors from a language model call.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("connection failed: {0}")]
    ConnectionFailed(String),
    #[error("API error ({status}): {body}")]
    Api { status: u16, body: String },
    #[error("model not found: {0}")]
    ModelNotFound(String),
    #[error("invalid response: {0}")]
    InvalidResponse(String),
    #[error("request timed out")]
    Timeout,
}

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            LlmError::Timeout
        } else if err.is_decode() {
            LlmError::InvalidResponse(err.to_string())
        } else {
            LlmError::ConnectionFailed(err.to_string())
        }
    }
}

impl From<LlmError> for BitsError {
    fn from(err: LlmError) -> Self {
        BitsError::Llm(err.to_string())
    }
}
