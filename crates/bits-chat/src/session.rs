//! Serialized chat session.
//!
//! The orchestrator, its memory, and the current mode live inside a single
//! worker task. [`SessionHandle`] is the only way in: commands go over a
//! bounded channel and are handled one at a time, so two exchanges never
//! touch the memory at once. A full queue rejects new work immediately.

use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info};

use bits_core::types::Mode;

use crate::error::ChatError;
use crate::memory::MemorySnapshot;
use crate::orchestrator::ResponseOrchestrator;

/// Answer to one exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatOutcome {
    pub reply: String,
    /// Mode the message was answered in.
    pub mode: Mode,
    /// True when `reply` is an `"Error: ..."` string and memory was left alone.
    pub failed: bool,
}

type Reply<T> = oneshot::Sender<T>;

enum Command {
    Respond {
        message: String,
        mode: Option<Mode>,
        reply: Reply<Result<ChatOutcome, ChatError>>,
    },
    Toggle {
        requested: Mode,
        reply: Reply<Mode>,
    },
    GetMode {
        reply: Reply<Mode>,
    },
    Clear {
        reply: Reply<()>,
    },
    Snapshot {
        reply: Reply<MemorySnapshot>,
    },
}

/// Cloneable handle to a running session worker.
#[derive(Clone)]
pub struct SessionHandle {
    tx: mpsc::Sender<Command>,
    depth: usize,
}

impl SessionHandle {
    /// Start the worker on the current runtime. At most `depth` commands wait
    /// behind the one being handled.
    pub fn spawn(orchestrator: ResponseOrchestrator, depth: usize) -> Self {
        let depth = depth.max(1);
        let (tx, rx) = mpsc::channel(depth);
        tokio::spawn(run_worker(orchestrator, rx));
        info!(depth, "Chat session started");
        Self { tx, depth }
    }

    /// Queue a message without waiting for the answer.
    pub fn submit(
        &self,
        message: impl Into<String>,
        mode: Option<Mode>,
    ) -> Result<oneshot::Receiver<Result<ChatOutcome, ChatError>>, ChatError> {
        let (reply, rx) = oneshot::channel();
        self.enqueue(Command::Respond {
            message: message.into(),
            mode,
            reply,
        })?;
        Ok(rx)
    }

    /// Answer in the session's current mode.
    pub async fn respond(&self, message: impl Into<String>) -> Result<ChatOutcome, ChatError> {
        let rx = self.submit(message, None)?;
        rx.await.map_err(|_| ChatError::SessionClosed)?
    }

    /// Answer in `mode` without changing the session's mode.
    pub async fn respond_in(
        &self,
        message: impl Into<String>,
        mode: Mode,
    ) -> Result<ChatOutcome, ChatError> {
        let rx = self.submit(message, Some(mode))?;
        rx.await.map_err(|_| ChatError::SessionClosed)?
    }

    /// Toggle `requested` and return the resulting mode.
    pub async fn toggle_mode(&self, requested: Mode) -> Result<Mode, ChatError> {
        self.call(|reply| Command::Toggle { requested, reply }).await
    }

    pub async fn mode(&self) -> Result<Mode, ChatError> {
        self.call(|reply| Command::GetMode { reply }).await
    }

    pub async fn clear_memory(&self) -> Result<(), ChatError> {
        self.call(|reply| Command::Clear { reply }).await
    }

    pub async fn snapshot(&self) -> Result<MemorySnapshot, ChatError> {
        self.call(|reply| Command::Snapshot { reply }).await
    }

    async fn call<T>(&self, make: impl FnOnce(Reply<T>) -> Command) -> Result<T, ChatError> {
        let (reply, rx) = oneshot::channel();
        self.enqueue(make(reply))?;
        rx.await.map_err(|_| ChatError::SessionClosed)
    }

    fn enqueue(&self, command: Command) -> Result<(), ChatError> {
        self.tx.try_send(command).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => ChatError::QueueFull(self.depth),
            mpsc::error::TrySendError::Closed(_) => ChatError::SessionClosed,
        })
    }
}

async fn run_worker(mut orchestrator: ResponseOrchestrator, mut rx: mpsc::Receiver<Command>) {
    let mut mode = Mode::Normal;

    while let Some(command) = rx.recv().await {
        match command {
            Command::Respond {
                message,
                mode: requested,
                reply,
            } => {
                let active = requested.unwrap_or(mode);
                let outcome = match orchestrator.try_respond(&message, active).await {
                    Ok(answer) => Ok(ChatOutcome {
                        reply: answer,
                        mode: active,
                        failed: false,
                    }),
                    Err(e @ (ChatError::EmptyMessage | ChatError::MessageTooLong(_))) => Err(e),
                    Err(e) => {
                        debug!(mode = %active, error = %e, "Exchange failed");
                        Ok(ChatOutcome {
                            reply: format!("Error: {}", e),
                            mode: active,
                            failed: true,
                        })
                    }
                };
                let _ = reply.send(outcome);
            }
            Command::Toggle { requested, reply } => {
                mode = Mode::toggle(mode, requested);
                info!(mode = %mode, "Mode changed");
                let _ = reply.send(mode);
            }
            Command::GetMode { reply } => {
                let _ = reply.send(mode);
            }
            Command::Clear { reply } => {
                orchestrator.clear_memory();
                let _ = reply.send(());
            }
            Command::Snapshot { reply } => {
                let _ = reply.send(orchestrator.memory().snapshot());
            }
        }
    }

    info!("Chat session stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use async_trait::async_trait;
    use bits_llm::{ChatReply, ChatRequest, LanguageModel, LlmError, ScriptedModel};
    use bits_tools::ToolRegistry;
    use bits_vector::{HashEmbedding, MemoryIndex};
    use tokio::sync::{Notify, Semaphore};

    use crate::orchestrator::{ChatSettings, ModelSet};

    fn session_with(model: Arc<dyn LanguageModel>, depth: usize) -> SessionHandle {
        let backend = Arc::new(MemoryIndex::new(Arc::new(HashEmbedding::new(16))));
        let orchestrator = ResponseOrchestrator::new(
            ModelSet::single(model),
            backend,
            ToolRegistry::new(),
            ChatSettings::default(),
        );
        SessionHandle::spawn(orchestrator, depth)
    }

    /// Blocks every call until a permit is released.
    struct GatedModel {
        started: Notify,
        gate: Semaphore,
    }

    #[async_trait]
    impl LanguageModel for GatedModel {
        fn name(&self) -> &str {
            "gated"
        }

        async fn chat(&self, _request: ChatRequest) -> Result<ChatReply, LlmError> {
            self.started.notify_one();
            let permit = self
                .gate
                .acquire()
                .await
                .map_err(|e| LlmError::ConnectionFailed(e.to_string()))?;
            permit.forget();
            Ok(ChatReply::text("released"))
        }
    }

    #[tokio::test]
    async fn test_toggle_is_idempotent() {
        let session = session_with(Arc::new(ScriptedModel::always("ok")), 4);
        assert_eq!(session.mode().await.unwrap(), Mode::Normal);
        assert_eq!(session.toggle_mode(Mode::Rag).await.unwrap(), Mode::Rag);
        assert_eq!(session.toggle_mode(Mode::Rag).await.unwrap(), Mode::Normal);
        assert_eq!(session.toggle_mode(Mode::Tools).await.unwrap(), Mode::Tools);
        assert_eq!(session.toggle_mode(Mode::Rag).await.unwrap(), Mode::Rag);
        assert_eq!(session.mode().await.unwrap(), Mode::Rag);
    }

    #[tokio::test]
    async fn test_respond_uses_current_mode_and_updates_memory() {
        let session = session_with(Arc::new(ScriptedModel::always("hello")), 4);
        let outcome = session.respond("hi").await.unwrap();
        assert_eq!(outcome.reply, "hello");
        assert_eq!(outcome.mode, Mode::Normal);
        assert!(!outcome.failed);

        let snapshot = session.snapshot().await.unwrap();
        assert_eq!(snapshot.turns.len(), 2);

        session.clear_memory().await.unwrap();
        assert!(session.snapshot().await.unwrap().turns.is_empty());
    }

    #[tokio::test]
    async fn test_respond_in_does_not_change_mode() {
        let session = session_with(Arc::new(ScriptedModel::always("{}")), 4);
        let outcome = session.respond_in("find docs", Mode::Rag).await.unwrap();
        assert_eq!(outcome.mode, Mode::Rag);
        assert_eq!(session.mode().await.unwrap(), Mode::Normal);
    }

    #[tokio::test]
    async fn test_failed_exchange_is_reported_not_raised() {
        let model = ScriptedModel::new().then_fail("offline");
        let session = session_with(Arc::new(model), 4);
        let outcome = session.respond("hi").await.unwrap();
        assert!(outcome.failed);
        assert!(outcome.reply.starts_with("Error: "));
        assert!(session.snapshot().await.unwrap().turns.is_empty());
    }

    #[tokio::test]
    async fn test_empty_message_rejected() {
        let session = session_with(Arc::new(ScriptedModel::always("ok")), 4);
        assert!(matches!(
            session.respond("  ").await,
            Err(ChatError::EmptyMessage)
        ));
    }

    #[tokio::test]
    async fn test_queue_full_rejects_immediately() {
        let model = Arc::new(GatedModel {
            started: Notify::new(),
            gate: Semaphore::new(0),
        });
        let session = session_with(model.clone(), 2);

        let first = session.submit("one", None).unwrap();
        model.started.notified().await;

        let second = session.submit("two", None).unwrap();
        let third = session.submit("three", None).unwrap();
        assert!(matches!(
            session.submit("four", None),
            Err(ChatError::QueueFull(2))
        ));

        model.gate.add_permits(16);
        for rx in [first, second, third] {
            let outcome = rx.await.unwrap().unwrap();
            assert_eq!(outcome.reply, "released");
        }
    }

    #[tokio::test]
    async fn test_exchanges_are_serialized() {
        let session = session_with(Arc::new(ScriptedModel::always("ok")), 8);
        let mut receivers = Vec::new();
        for i in 0..3 {
            receivers.push(session.submit(format!("m{}", i), None).unwrap());
        }
        for rx in receivers {
            rx.await.unwrap().unwrap();
        }
        let turns = session.snapshot().await.unwrap().turns;
        let texts: Vec<_> = turns.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, vec!["m0", "ok", "m1", "ok", "m2", "ok"]);
    }
}
