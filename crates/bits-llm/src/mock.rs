//! Scripted language model for deterministic tests.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::LlmError;
use crate::provider::{ChatReply, ChatRequest, LanguageModel};

enum Step {
    Reply(ChatReply),
    Fail(String),
}

/// Replays queued replies in order and records every request it receives.
///
/// When the queue is empty the fallback reply is returned, or an
/// `InvalidResponse` error if no fallback was set.
pub struct ScriptedModel {
    name: String,
    steps: Mutex<VecDeque<Step>>,
    fallback: Option<ChatReply>,
    requests: Mutex<Vec<ChatRequest>>,
}

impl ScriptedModel {
    pub fn new() -> Self {
        Self {
            name: "scripted".to_string(),
            steps: Mutex::new(VecDeque::new()),
            fallback: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// A model that always answers with `text`.
    pub fn always(text: impl Into<String>) -> Self {
        Self::new().with_fallback(ChatReply::text(text))
    }

    pub fn with_fallback(mut self, reply: ChatReply) -> Self {
        self.fallback = Some(reply);
        self
    }

    pub fn then_reply(self, reply: ChatReply) -> Self {
        self.push(Step::Reply(reply));
        self
    }

    pub fn then_text(self, text: impl Into<String>) -> Self {
        self.then_reply(ChatReply::text(text))
    }

    pub fn then_fail(self, message: impl Into<String>) -> Self {
        self.push(Step::Fail(message.into()));
        self
    }

    /// Every request seen so far, oldest first.
    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().map(|r| r.len()).unwrap_or(0)
    }

    fn push(&self, step: Step) {
        if let Ok(mut steps) = self.steps.lock() {
            steps.push_back(step);
        }
    }
}

impl Default for ScriptedModel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    fn name(&self) -> &str {
        &self.name
    }

    async fn chat(&self, request: ChatRequest) -> Result<ChatReply, LlmError> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request);
        }

        let step = self.steps.lock().ok().and_then(|mut s| s.pop_front());
        match step {
            Some(Step::Reply(reply)) => Ok(reply),
            Some(Step::Fail(message)) => Err(LlmError::ConnectionFailed(message)),
            None => self
                .fallback
                .clone()
                .ok_or_else(|| LlmError::InvalidResponse("script exhausted".to_string())),
        }
    }
}
