//! Response orchestrator: central coordinator wiring memory, retrieval, and
//! tools.
//!
//! Routes each message by mode, and records the exchange in memory only when
//! the answer was produced without error.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use bits_core::config::BitsConfig;
use bits_core::types::{ChatMessage, Mode, Role};
use bits_llm::{ChatRequest, LanguageModel};
use bits_tools::ToolRegistry;
use bits_vector::VectorBackend;

use crate::classifier::MetadataClassifier;
use crate::error::{bounded, ChatError};
use crate::memory::{ConversationMemory, MemoryManager};
use crate::prompts;
use crate::retrieval::HybridRetriever;
use crate::tooling::ToolPipeline;

/// Tunables for one chat session.
#[derive(Debug, Clone)]
pub struct ChatSettings {
    pub keep_rounds: usize,
    pub temperature: f32,
    pub max_message_chars: usize,
    pub query_limit: usize,
    pub max_results: usize,
    pub llm_timeout: Duration,
    pub retrieval_timeout: Duration,
    pub tool_timeout: Duration,
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self::from_config(&BitsConfig::default())
    }
}

impl ChatSettings {
    pub fn from_config(config: &BitsConfig) -> Self {
        Self {
            keep_rounds: config.memory.effective_keep_rounds(),
            temperature: config.llm.temperature,
            max_message_chars: config.chat.max_message_chars,
            query_limit: config.retrieval.query_limit,
            max_results: config.retrieval.effective_max_results(),
            llm_timeout: Duration::from_secs(config.llm.timeout_secs),
            retrieval_timeout: Duration::from_secs(config.retrieval.timeout_secs),
            tool_timeout: Duration::from_secs(config.tools.timeout_secs),
        }
    }
}

/// The language models a session talks to.
#[derive(Clone)]
pub struct ModelSet {
    /// Answers, classification, and tool follow-ups.
    pub chat: Arc<dyn LanguageModel>,
    /// Memory summarization.
    pub summarizer: Arc<dyn LanguageModel>,
    /// Tool selection.
    pub tool: Arc<dyn LanguageModel>,
}

impl ModelSet {
    /// Use one model for every role.
    pub fn single(model: Arc<dyn LanguageModel>) -> Self {
        Self {
            chat: model.clone(),
            summarizer: model.clone(),
            tool: model,
        }
    }
}

pub struct ResponseOrchestrator {
    model: Arc<dyn LanguageModel>,
    memory: MemoryManager,
    retriever: HybridRetriever,
    tools: ToolPipeline,
    settings: ChatSettings,
}

impl ResponseOrchestrator {
    pub fn new(
        models: ModelSet,
        backend: Arc<dyn VectorBackend>,
        registry: ToolRegistry,
        settings: ChatSettings,
    ) -> Self {
        let memory = MemoryManager::new(
            settings.keep_rounds,
            models.summarizer,
            settings.temperature,
            settings.llm_timeout,
        );
        let classifier =
            MetadataClassifier::new(models.chat.clone(), settings.temperature, settings.llm_timeout);
        let retriever = HybridRetriever::new(
            backend,
            classifier,
            settings.query_limit,
            settings.max_results,
            settings.retrieval_timeout,
        );
        let tools = ToolPipeline::new(
            models.tool,
            models.chat.clone(),
            registry,
            settings.temperature,
            settings.llm_timeout,
            settings.tool_timeout,
        );

        Self {
            model: models.chat,
            memory,
            retriever,
            tools,
            settings,
        }
    }

    /// Answer `message` in `mode`. Failures come back as `"Error: ..."` text
    /// and leave memory untouched.
    pub async fn respond(&mut self, message: &str, mode: Mode) -> String {
        match self.try_respond(message, mode).await {
            Ok(answer) => answer,
            Err(e) => {
                warn!(mode = %mode, error = %e, "Exchange failed");
                format!("Error: {}", e)
            }
        }
    }

    /// Same flow as [`respond`](Self::respond) with the typed error.
    pub async fn try_respond(&mut self, message: &str, mode: Mode) -> Result<String, ChatError> {
        if message.trim().is_empty() {
            return Err(ChatError::EmptyMessage);
        }
        if message.chars().count() > self.settings.max_message_chars {
            return Err(ChatError::MessageTooLong(self.settings.max_message_chars));
        }

        debug!(mode = %mode, chars = message.len(), "Handling message");
        let answer = match mode {
            Mode::Rag => self.answer_with_retrieval(message).await?,
            Mode::Tools => self.answer_with_tools(message).await?,
            Mode::Normal => self.answer(prompts::NORMAL_INSTRUCTION, message).await?,
        };
        let answer = answer.trim().to_string();

        self.memory.add_turn(Role::User, message).await;
        self.memory.add_turn(Role::Assistant, answer.clone()).await;
        info!(mode = %mode, turns = self.memory.memory().len(), "Exchange complete");
        Ok(answer)
    }

    pub fn clear_memory(&mut self) {
        self.memory.clear();
        info!("Conversation memory cleared");
    }

    pub fn memory(&self) -> &ConversationMemory {
        self.memory.memory()
    }

    pub fn retriever(&self) -> &HybridRetriever {
        &self.retriever
    }

    async fn answer_with_retrieval(&self, message: &str) -> Result<String, ChatError> {
        let retrieval = self.retriever.retrieve(message).await?;
        let instruction = if retrieval.is_empty() {
            prompts::NO_DOCUMENTS_INSTRUCTION.to_string()
        } else {
            prompts::rag_instruction(&retrieval.context())
        };
        self.answer(&instruction, message).await
    }

    async fn answer_with_tools(&self, message: &str) -> Result<String, ChatError> {
        let request = prompts::tools_request(self.memory.memory().summary(), message);
        self.tools
            .run_tooled(&request, message, self.memory.memory())
            .await
    }

    async fn answer(&self, instruction: &str, message: &str) -> Result<String, ChatError> {
        let mut messages = self.memory.get_context(instruction);
        messages.push(ChatMessage::user(message));
        let request = ChatRequest::new(messages).with_temperature(self.settings.temperature);
        let reply = bounded("chat completion", self.settings.llm_timeout, self.model.chat(request)).await?;
        Ok(reply.content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bits_core::types::{DocType, DocumentChunk, MessageRole};
    use bits_llm::{ChatReply, ScriptedModel};
    use bits_vector::{HashEmbedding, MemoryIndex};
    use serde_json::json;

    fn empty_index() -> Arc<MemoryIndex> {
        Arc::new(MemoryIndex::new(Arc::new(HashEmbedding::new(32))))
    }

    fn orchestrator(model: Arc<ScriptedModel>, backend: Arc<dyn VectorBackend>) -> ResponseOrchestrator {
        let mut registry = ToolRegistry::new();
        registry.register_defaults("/nonexistent/bits/storage");
        ResponseOrchestrator::new(ModelSet::single(model), backend, registry, ChatSettings::default())
    }

    #[test]
    fn test_settings_cap_retrieval_results() {
        let mut config = BitsConfig::default();
        config.retrieval.max_results = 20;
        assert_eq!(ChatSettings::from_config(&config).max_results, 8);
    }

    #[tokio::test]
    async fn test_normal_mode_records_exchange() {
        let model = Arc::new(ScriptedModel::always("  Hello there!  "));
        let mut orch = orchestrator(model.clone(), empty_index());

        let answer = orch.respond("hi", Mode::Normal).await;
        assert_eq!(answer, "Hello there!");

        let turns: Vec<_> = orch.memory().turns().cloned().collect();
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].role, Role::User);
        assert_eq!(turns[0].text, "hi");
        assert_eq!(turns[1].text, "Hello there!");

        let request = &model.requests()[0];
        assert_eq!(request.messages[0].content, prompts::NORMAL_INSTRUCTION);
        assert_eq!(request.messages.last().unwrap().role, MessageRole::User);
    }

    #[tokio::test]
    async fn test_four_exchanges_keep_six_turns() {
        let model = Arc::new(ScriptedModel::always("ok"));
        let mut orch = orchestrator(model, empty_index());
        for i in 0..3 {
            orch.respond(&format!("m{}", i), Mode::Normal).await;
        }
        assert_eq!(orch.memory().len(), 6);
        orch.respond("m3", Mode::Normal).await;
        assert_eq!(orch.memory().len(), 6);
        assert_eq!(orch.memory().summary(), "ok");
    }

    #[tokio::test]
    async fn test_rag_with_empty_index_uses_no_documents_instruction() {
        let model = Arc::new(
            ScriptedModel::new()
                .then_text(r#"{"type":"people","subtype":""}"#)
                .then_text("I couldn't find specific docs, but..."),
        );
        let mut orch = orchestrator(model.clone(), empty_index());

        let answer = orch.respond("who runs the lab?", Mode::Rag).await;
        assert_eq!(answer, "I couldn't find specific docs, but...");
        assert_eq!(orch.memory().len(), 2);

        let requests = model.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[1].messages[0].content, prompts::NO_DOCUMENTS_INSTRUCTION);
    }

    #[tokio::test]
    async fn test_rag_with_documents_embeds_context() {
        let index = empty_index();
        index
            .upsert(&[DocumentChunk::new(
                "Dr. Kim leads the optics lab.",
                "Team",
                "team.md",
                DocType::People,
                "team",
                0,
            )])
            .await
            .unwrap();

        let model = Arc::new(
            ScriptedModel::new()
                .then_text("not json at all")
                .then_text("Dr. Kim."),
        );
        let mut orch = orchestrator(model.clone(), index);
        assert_eq!(orch.respond("who leads optics?", Mode::Rag).await, "Dr. Kim.");

        let system = &model.requests()[1].messages[0].content;
        assert!(system.starts_with("Below is some context information"));
        assert!(system.contains("Document 1 (Source: team.md)\nDr. Kim leads the optics lab."));
    }

    #[tokio::test]
    async fn test_backend_failure_returns_error_and_skips_memory() {
        struct FailingBackend;

        #[async_trait::async_trait]
        impl VectorBackend for FailingBackend {
            fn name(&self) -> &str {
                "failing"
            }
            async fn collection_exists(&self) -> bits_core::Result<bool> {
                Ok(true)
            }
            async fn upsert(&self, _chunks: &[DocumentChunk]) -> bits_core::Result<usize> {
                Ok(0)
            }
            async fn query(
                &self,
                _text: &str,
                _filter: Option<bits_core::types::StructuredFilter>,
                _limit: usize,
            ) -> bits_core::Result<Vec<bits_vector::ScoredChunk>> {
                Err(bits_core::BitsError::Search("connection refused".to_string()))
            }
            async fn count(&self) -> bits_core::Result<usize> {
                Ok(0)
            }
        }

        let model = Arc::new(ScriptedModel::always("{}"));
        let mut orch = orchestrator(model, Arc::new(FailingBackend));
        orch.respond("warm up", Mode::Normal).await;
        assert_eq!(orch.memory().len(), 2);

        let answer = orch.respond("find papers", Mode::Rag).await;
        assert!(answer.starts_with("Error: "));
        assert!(answer.contains("connection refused"));
        assert_eq!(orch.memory().len(), 2);
    }

    #[tokio::test]
    async fn test_tools_mode_unknown_tool_is_recorded() {
        let model = Arc::new(
            ScriptedModel::new().then_reply(ChatReply::text("").with_tool_call("weather_report", json!({}))),
        );
        let mut orch = orchestrator(model, empty_index());

        let answer = orch.respond("will it rain?", Mode::Tools).await;
        assert_eq!(answer, "Warning: tool not found: weather_report");
        let last = orch.memory().turns().last().unwrap().clone();
        assert_eq!(last.text, "Warning: tool not found: weather_report");
        assert_eq!(orch.memory().len(), 2);
    }

    #[tokio::test]
    async fn test_tools_mode_prefixes_summary() {
        let model = Arc::new(ScriptedModel::always("done"));
        let settings = ChatSettings {
            keep_rounds: 1,
            ..ChatSettings::default()
        };
        let mut orch = ResponseOrchestrator::new(
            ModelSet::single(model.clone()),
            empty_index(),
            ToolRegistry::new(),
            settings,
        );
        orch.respond("first", Mode::Normal).await;
        orch.respond("second", Mode::Normal).await;
        assert_eq!(orch.memory().summary(), "done");

        orch.respond("list files", Mode::Tools).await;
        let requests = model.requests();
        let tool_request = &requests[requests.len() - 2];
        assert_eq!(
            tool_request.messages[0].content,
            "Context: done\nUser Request: list files"
        );
    }

    #[tokio::test]
    async fn test_model_error_returns_error_string() {
        let model = Arc::new(ScriptedModel::new().then_fail("connection refused"));
        let mut orch = orchestrator(model, empty_index());
        let answer = orch.respond("hi", Mode::Normal).await;
        assert_eq!(answer, "Error: LLM error: connection failed: connection refused");
        assert!(orch.memory().is_empty());
    }

    #[tokio::test]
    async fn test_validation_rejects_empty_and_long_messages() {
        let model = Arc::new(ScriptedModel::always("unused"));
        let mut orch = orchestrator(model.clone(), empty_index());

        assert!(matches!(
            orch.try_respond("   ", Mode::Normal).await,
            Err(ChatError::EmptyMessage)
        ));
        let long = "x".repeat(4001);
        assert!(matches!(
            orch.try_respond(&long, Mode::Normal).await,
            Err(ChatError::MessageTooLong(4000))
        ));
        assert_eq!(model.call_count(), 0);
        assert!(orch.memory().is_empty());
    }

    #[tokio::test]
    async fn test_clear_memory() {
        let model = Arc::new(ScriptedModel::always("ok"));
        let mut orch = orchestrator(model, empty_index());
        orch.respond("hi", Mode::Normal).await;
        orch.clear_memory();
        assert!(orch.memory().is_empty());
    }
}
