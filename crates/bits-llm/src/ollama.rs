//! Ollama chat client.
//!
//! Talks to a local Ollama server over its native `/api/chat` endpoint,
//! non-streaming. Tool definitions go out in the OpenAI function format and
//! `message.tool_calls` is parsed back into [`ToolCall`]s.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use bits_core::types::{ChatMessage, MessageRole, ToolCall};

use crate::error::LlmError;
use crate::provider::{ChatReply, ChatRequest, LanguageModel, ToolSpec};

/// Connection settings for one Ollama model.
#[derive(Clone, Debug)]
pub struct OllamaConfig {
    pub endpoint: String,
    pub model: String,
    pub temperature: f32,
    pub timeout: Duration,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:11434".to_string(),
            model: "qwen3:1.7b".to_string(),
            temperature: 0.1,
            timeout: Duration::from_secs(120),
        }
    }
}

/// Ollama-backed [`LanguageModel`].
pub struct OllamaClient {
    config: OllamaConfig,
    client: Client,
}

impl OllamaClient {
    pub fn new(config: OllamaConfig) -> Result<Self, LlmError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| LlmError::ConnectionFailed(e.to_string()))?;
        Ok(Self { config, client })
    }

    pub fn config(&self) -> &OllamaConfig {
        &self.config
    }

    fn api_url(&self, path: &str) -> String {
        let base = self.config.endpoint.trim_end_matches('/');
        format!("{}{}", base, path)
    }

    fn build_request(&self, request: ChatRequest) -> OllamaChatRequest {
        OllamaChatRequest {
            model: self.config.model.clone(),
            messages: request
                .messages
                .into_iter()
                .map(OllamaMessage::from)
                .collect(),
            stream: false,
            tools: request.tools.into_iter().map(OllamaTool::from).collect(),
            options: OllamaOptions {
                temperature: request.temperature.unwrap_or(self.config.temperature),
            },
        }
    }
}

// Ollama API types
#[derive(Debug, Serialize)]
struct OllamaChatRequest {
    model: String,
    messages: Vec<OllamaMessage>,
    stream: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<OllamaTool>,
    options: OllamaOptions,
}

#[derive(Debug, Serialize)]
struct OllamaMessage {
    role: &'static str,
    content: String,
}

impl From<ChatMessage> for OllamaMessage {
    fn from(message: ChatMessage) -> Self {
        let role = match message.role {
            MessageRole::System => "system",
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
        };
        Self {
            role,
            content: message.content,
        }
    }
}

#[derive(Debug, Serialize)]
struct OllamaTool {
    #[serde(rename = "type")]
    kind: &'static str,
    function: OllamaFunction,
}

#[derive(Debug, Serialize)]
struct OllamaFunction {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

impl From<ToolSpec> for OllamaTool {
    fn from(spec: ToolSpec) -> Self {
        Self {
            kind: "function",
            function: OllamaFunction {
                name: spec.name,
                description: spec.description,
                parameters: spec.parameters,
            },
        }
    }
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct OllamaChatResponse {
    message: OllamaResponseMessage,
}

#[derive(Debug, Deserialize)]
struct OllamaResponseMessage {
    #[serde(default)]
    content: String,
    #[serde(default)]
    tool_calls: Vec<OllamaToolCall>,
}

#[derive(Debug, Deserialize)]
struct OllamaToolCall {
    function: OllamaCalledFunction,
}

#[derive(Debug, Deserialize)]
struct OllamaCalledFunction {
    name: String,
    #[serde(default)]
    arguments: serde_json::Value,
}

/// Parse a raw `/api/chat` response body into a [`ChatReply`].
pub fn parse_chat_response(body: &str) -> Result<ChatReply, LlmError> {
    let response: OllamaChatResponse =
        serde_json::from_str(body).map_err(|e| LlmError::InvalidResponse(e.to_string()))?;

    let tool_calls = response
        .message
        .tool_calls
        .into_iter()
        .map(|call| ToolCall {
            name: call.function.name,
            arguments: normalize_arguments(call.function.arguments),
        })
        .collect();

    Ok(ChatReply {
        content: response.message.content,
        tool_calls,
    })
}

/// Some models emit arguments as a JSON-encoded string; decode those into an
/// object. Null becomes an empty object.
fn normalize_arguments(arguments: serde_json::Value) -> serde_json::Value {
    match arguments {
        serde_json::Value::Null => serde_json::json!({}),
        serde_json::Value::String(raw) => {
            serde_json::from_str(&raw).unwrap_or_else(|_| serde_json::json!({}))
        }
        other => other,
    }
}

#[async_trait]
impl LanguageModel for OllamaClient {
    fn name(&self) -> &str {
        &self.config.model
    }

    async fn chat(&self, request: ChatRequest) -> Result<ChatReply, LlmError> {
        let url = self.api_url("/api/chat");
        let body = self.build_request(request);
        debug!(
            model = %self.config.model,
            messages = body.messages.len(),
            tools = body.tools.len(),
            "Sending chat request"
        );

        let response = self.client.post(&url).json(&body).send().await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();

            if body.contains("model") && body.contains("not found") {
                return Err(LlmError::ModelNotFound(self.config.model.clone()));
            }

            return Err(LlmError::Api { status, body });
        }

        let text = response.text().await?;
        parse_chat_response(&text)
    }
}
