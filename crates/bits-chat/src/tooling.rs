//! Tool invocation pipeline for Tools mode.
//!
//! One tool call per turn: the model proposes calls, the first one runs, and
//! a follow-up call turns the tool output into the answer.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use bits_core::types::{ChatMessage, ToolCall};
use bits_llm::{ChatReply, ChatRequest, LanguageModel};
use bits_tools::ToolRegistry;

use crate::error::{bounded, ChatError};
use crate::memory::ConversationMemory;
use crate::prompts;

/// What to do with a tool-agent reply.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolDecision {
    /// Run this call. Only the first proposed call is kept.
    Call(ToolCall),
    /// No call proposed; answer with this text.
    Reply(String),
}

impl ToolDecision {
    pub fn from_reply(reply: ChatReply) -> Self {
        let proposed = reply.tool_calls.len();
        match reply.tool_calls.into_iter().next() {
            Some(call) => {
                if proposed > 1 {
                    debug!(proposed, kept = %call.name, "Ignoring extra tool calls");
                }
                ToolDecision::Call(call)
            }
            None => ToolDecision::Reply(reply.content),
        }
    }
}

pub struct ToolPipeline {
    tool_model: Arc<dyn LanguageModel>,
    answer_model: Arc<dyn LanguageModel>,
    registry: ToolRegistry,
    temperature: f32,
    llm_timeout: Duration,
    tool_timeout: Duration,
}

impl ToolPipeline {
    pub fn new(
        tool_model: Arc<dyn LanguageModel>,
        answer_model: Arc<dyn LanguageModel>,
        registry: ToolRegistry,
        temperature: f32,
        llm_timeout: Duration,
        tool_timeout: Duration,
    ) -> Self {
        Self {
            tool_model,
            answer_model,
            registry,
            temperature,
            llm_timeout,
            tool_timeout,
        }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Answer `message` with tool access. `request` is what the tool agent
    /// sees (the message, possibly with the summary prepended).
    pub async fn run_tooled(
        &self,
        request: &str,
        message: &str,
        memory: &ConversationMemory,
    ) -> Result<String, ChatError> {
        let selection = ChatRequest::new(vec![ChatMessage::user(request)])
            .with_tools(self.registry.specs())
            .with_temperature(self.temperature);
        let reply = bounded("tool selection", self.llm_timeout, self.tool_model.chat(selection)).await?;

        let call = match ToolDecision::from_reply(reply) {
            ToolDecision::Reply(text) if text.is_empty() => {
                return Ok(prompts::EMPTY_TOOL_REPLY.to_string());
            }
            ToolDecision::Reply(text) => return Ok(text),
            ToolDecision::Call(call) => call,
        };

        let Some(tool) = self.registry.get(&call.name) else {
            warn!(tool = %call.name, "Model proposed an unknown tool");
            return Ok(prompts::tool_not_found(&call.name));
        };

        info!(tool = %call.name, "Invoking tool");
        let output = bounded(
            &format!("tool '{}'", call.name),
            self.tool_timeout,
            tool.invoke(&call.arguments),
        )
        .await?;

        let mut messages = memory.get_context(prompts::TOOL_FOLLOWUP_INSTRUCTION);
        messages.push(ChatMessage::user(prompts::tool_followup(
            &call.name, &output, message,
        )));
        let followup = ChatRequest::new(messages).with_temperature(self.temperature);
        let answer = bounded("tool follow-up", self.llm_timeout, self.answer_model.chat(followup)).await?;
        Ok(answer.content)
    }
}
