//! Bounded conversation memory with a running summary.
//!
//! The buffer keeps at most `keep_rounds * 2` turns. Whenever it grows past
//! that bound the oldest round is folded into the summary by the summarizer
//! model before the two turns are dropped.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use bits_core::types::{ChatMessage, Role, Turn};
use bits_llm::{ChatRequest, LanguageModel};

use crate::error::{bounded, ChatError};
use crate::prompts;

/// Summary plus buffered turns.
#[derive(Debug, Clone)]
pub struct ConversationMemory {
    summary: String,
    buffer: VecDeque<Turn>,
    keep_rounds: usize,
}

impl ConversationMemory {
    /// `keep_rounds` below one is raised to one.
    pub fn new(keep_rounds: usize) -> Self {
        Self {
            summary: String::new(),
            buffer: VecDeque::new(),
            keep_rounds: keep_rounds.max(1),
        }
    }

    pub fn summary(&self) -> &str {
        &self.summary
    }

    pub fn turns(&self) -> impl Iterator<Item = &Turn> {
        self.buffer.iter()
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn keep_rounds(&self) -> usize {
        self.keep_rounds
    }

    pub fn max_turns(&self) -> usize {
        self.keep_rounds * 2
    }

    /// System message (instruction plus summary, if any) followed by the
    /// buffered turns in order.
    pub fn get_context(&self, system_instruction: &str) -> Vec<ChatMessage> {
        let system = if self.summary.is_empty() {
            system_instruction.to_string()
        } else {
            format!(
                "{}\n\n{}\n{}",
                system_instruction,
                prompts::SUMMARY_HEADER,
                self.summary
            )
        };

        let mut messages = Vec::with_capacity(self.buffer.len() + 1);
        messages.push(ChatMessage::system(system));
        messages.extend(self.buffer.iter().map(ChatMessage::from));
        messages
    }

    pub fn clear(&mut self) {
        self.summary.clear();
        self.buffer.clear();
    }

    pub fn snapshot(&self) -> MemorySnapshot {
        MemorySnapshot {
            summary: self.summary.clone(),
            turns: self.buffer.iter().cloned().collect(),
            keep_rounds: self.keep_rounds,
        }
    }
}

/// Serializable view of the memory for inspection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemorySnapshot {
    pub summary: String,
    pub turns: Vec<Turn>,
    pub keep_rounds: usize,
}

/// Owns the memory and the model that summarizes pruned rounds.
pub struct MemoryManager {
    memory: ConversationMemory,
    summarizer: Arc<dyn LanguageModel>,
    temperature: f32,
    timeout: Duration,
}

impl MemoryManager {
    pub fn new(
        keep_rounds: usize,
        summarizer: Arc<dyn LanguageModel>,
        temperature: f32,
        timeout: Duration,
    ) -> Self {
        Self {
            memory: ConversationMemory::new(keep_rounds),
            summarizer,
            temperature,
            timeout,
        }
    }

    pub fn memory(&self) -> &ConversationMemory {
        &self.memory
    }

    pub fn get_context(&self, system_instruction: &str) -> Vec<ChatMessage> {
        self.memory.get_context(system_instruction)
    }

    pub fn clear(&mut self) {
        self.memory.clear();
    }

    /// Append a turn, then prune until the buffer is within bounds.
    pub async fn add_turn(&mut self, role: Role, text: impl Into<String>) {
        self.memory.buffer.push_back(Turn {
            role,
            text: text.into(),
        });
        self.prune().await;
    }

    async fn prune(&mut self) {
        while self.memory.buffer.len() > self.memory.max_turns() {
            let lines = self
                .memory
                .buffer
                .iter()
                .take(2)
                .map(Turn::transcript_line)
                .collect::<Vec<_>>()
                .join("\n");

            match self.summarize_with_retry(&lines).await {
                Ok(summary) => {
                    self.memory.summary = summary;
                }
                Err(e) => {
                    warn!(error = %e, "Summarization failed twice; keeping raw transcript");
                    if self.memory.summary.is_empty() {
                        self.memory.summary = lines;
                    } else {
                        self.memory.summary = format!("{}\n{}", self.memory.summary, lines);
                    }
                }
            }

            self.memory.buffer.drain(..2);
            debug!(
                remaining = self.memory.buffer.len(),
                summary_chars = self.memory.summary.len(),
                "Pruned one round into summary"
            );
        }
    }

    async fn summarize_with_retry(&self, lines: &str) -> Result<String, ChatError> {
        match self.summarize(lines).await {
            Ok(summary) => Ok(summary),
            Err(first) => {
                debug!(error = %first, "Summarization failed, retrying once");
                self.summarize(lines).await
            }
        }
    }

    async fn summarize(&self, lines: &str) -> Result<String, ChatError> {
        let prompt = prompts::summary_prompt(&self.memory.summary, lines);
        let request = ChatRequest::new(vec![ChatMessage::user(prompt)])
            .with_temperature(self.temperature);
        let reply = bounded("summarization", self.timeout, self.summarizer.chat(request)).await?;
        Ok(reply.content.trim().to_string())
    }
}
