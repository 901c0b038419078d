//! Error types for the conversational engine.

use std::future::Future;
use std::time::Duration;

use bits_core::error::BitsError;
use bits_llm::LlmError;
use bits_tools::ToolError;

/// Errors from the chat engine.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("message cannot be empty")]
    EmptyMessage,
    #[error("message exceeds maximum length of {0} characters")]
    MessageTooLong(usize),
    #[error("LLM error: {0}")]
    Llm(String),
    #[error("search error: {0}")]
    Search(String),
    #[error("tool error: {0}")]
    Tool(String),
    #[error("{operation} timed out after {secs} seconds")]
    Timeout { operation: String, secs: u64 },
    #[error("request queue is full ({0} pending)")]
    QueueFull(usize),
    #[error("chat session has shut down")]
    SessionClosed,
}

impl From<LlmError> for ChatError {
    fn from(err: LlmError) -> Self {
        ChatError::Llm(err.to_string())
    }
}

impl From<ToolError> for ChatError {
    fn from(err: ToolError) -> Self {
        ChatError::Tool(err.to_string())
    }
}

impl From<BitsError> for ChatError {
    fn from(err: BitsError) -> Self {
        match err {
            BitsError::Llm(msg) => ChatError::Llm(msg),
            BitsError::Tool(msg) => ChatError::Tool(msg),
            BitsError::Timeout { operation, secs } => ChatError::Timeout { operation, secs },
            BitsError::QueueFull { depth } => ChatError::QueueFull(depth),
            BitsError::ShuttingDown => ChatError::SessionClosed,
            other => ChatError::Search(other.to_string()),
        }
    }
}

impl From<ChatError> for BitsError {
    fn from(err: ChatError) -> Self {
        match err {
            ChatError::QueueFull(depth) => BitsError::QueueFull { depth },
            ChatError::SessionClosed => BitsError::ShuttingDown,
            ChatError::Timeout { operation, secs } => BitsError::Timeout { operation, secs },
            ChatError::Tool(msg) => BitsError::Tool(msg),
            ChatError::Search(msg) => BitsError::Search(msg),
            other => BitsError::Llm(other.to_string()),
        }
    }
}

/// Run `fut` under `limit`, mapping expiry to [`ChatError::Timeout`].
pub(crate) async fn bounded<T, E, F>(operation: &str, limit: Duration, fut: F) -> Result<T, ChatError>
where
    F: Future<Output = Result<T, E>>,
    E: Into<ChatError>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result.map_err(Into::into),
        Err(_) => Err(ChatError::Timeout {
            operation: operation.to_string(),
            secs: limit.as_secs(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_error_display() {
        assert_eq!(ChatError::EmptyMessage.to_string(), "message cannot be empty");
        assert_eq!(
            ChatError::MessageTooLong(4000).to_string(),
            "message exceeds maximum length of 4000 characters"
        );
        assert_eq!(
            ChatError::Search("qdrant down".to_string()).to_string(),
            "search error: qdrant down"
        );
        assert_eq!(
            ChatError::QueueFull(10).to_string(),
            "request queue is full (10 pending)"
        );
        let err = ChatError::Timeout {
            operation: "vector query".to_string(),
            secs: 30,
        };
        assert_eq!(err.to_string(), "vector query timed out after 30 seconds");
    }

    #[test]
    fn test_chat_error_from_bits_error() {
        let err: ChatError = BitsError::Storage("lock poisoned".to_string()).into();
        assert!(matches!(err, ChatError::Search(_)));
        assert!(err.to_string().contains("lock poisoned"));

        let err: ChatError = BitsError::Timeout {
            operation: "qdrant request".to_string(),
            secs: 30,
        }
        .into();
        assert!(matches!(err, ChatError::Timeout { secs: 30, .. }));
    }

    #[test]
    fn test_chat_error_from_llm_and_tool() {
        let err: ChatError = LlmError::ModelNotFound("qwen3".to_string()).into();
        assert!(matches!(err, ChatError::Llm(_)));

        let err: ChatError = ToolError::ExecutionFailed("boom".to_string()).into();
        assert_eq!(err.to_string(), "tool error: Tool execution failed: boom");
    }

    #[test]
    fn test_chat_error_into_bits_error() {
        let err: BitsError = ChatError::QueueFull(3).into();
        assert!(matches!(err, BitsError::QueueFull { depth: 3 }));
        let err: BitsError = ChatError::SessionClosed.into();
        assert!(matches!(err, BitsError::ShuttingDown));
    }

    #[tokio::test]
    async fn test_bounded_passes_through() {
        let out: Result<u8, ChatError> = bounded("noop", Duration::from_secs(1), async {
            Ok::<u8, LlmError>(7)
        })
        .await;
        assert_eq!(out.unwrap(), 7);
    }

    #[tokio::test(start_paused = true)]
    async fn test_bounded_times_out() {
        let out: Result<(), ChatError> = bounded("slow call", Duration::from_secs(2), async {
            tokio::time::sleep(Duration::from_secs(10)).await;
            Ok::<(), LlmError>(())
        })
        .await;
        assert!(matches!(out, Err(ChatError::Timeout { secs: 2, .. })));
    }
}
