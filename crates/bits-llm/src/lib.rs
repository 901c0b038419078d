//! Language model service for bits.
//!
//! Defines the [`LanguageModel`] contract used by the chat engine, an Ollama
//! HTTP client, and a scripted model for deterministic tests.

pub mod error;
pub mod mock;
pub mod ollama;
pub mod provider;

pub use error::LlmError;
pub use mock::ScriptedModel;
pub use ollama::{OllamaClient, OllamaConfig};
pub use provider::{ChatReply, ChatRequest, LanguageModel, ToolSpec};
