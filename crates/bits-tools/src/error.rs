//! Error types for tool execution.

use bits_core::error::BitsError;

/// Errors from a tool invocation.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("Invalid tool arguments: {0}")]
    InvalidArguments(String),
    #[error("Tool execution failed: {0}")]
    ExecutionFailed(String),
    #[error("Tool I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<ToolError> for BitsError {
    fn from(err: ToolError) -> Self {
        BitsError::Tool(err.to_string())
    }
}
