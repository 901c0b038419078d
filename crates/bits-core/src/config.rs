use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{BitsError, Result};

/// Top-level configuration for the bits assistant.
///
/// Loaded from `~/.bits/config.toml` by default. Each section corresponds
/// to one collaborator of the response orchestrator.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BitsConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub memory: MemoryConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub tools: ToolsConfig,
    #[serde(default)]
    pub chat: ChatConfig,
    #[serde(default)]
    pub api: ApiConfig,
}

impl BitsConfig {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: BitsConfig = toml::from_str(&content)?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults if the
    /// file does not exist or cannot be parsed.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| BitsError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Data directory for the local index snapshot and logs.
    pub data_dir: String,
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            data_dir: "~/.bits/data".to_string(),
            log_level: "info".to_string(),
        }
    }
}

/// Language model service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Base URL of the Ollama server.
    pub endpoint: String,
    /// Model used for chat, classification and tool follow-ups.
    pub model: String,
    /// Model used to fold pruned turns into the running summary.
    pub summarizer_model: String,
    /// Model used for the tool-selection call.
    pub tool_model: String,
    /// Sampling temperature for every call.
    pub temperature: f32,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:11434".to_string(),
            model: "qwen3:1.7b".to_string(),
            summarizer_model: "qwen3:1.7b".to_string(),
            tool_model: "qwen3:1.7b".to_string(),
            temperature: 0.1,
            timeout_secs: 120,
        }
    }
}

/// Conversation memory settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    /// Rounds (user + assistant) kept verbatim before summarization.
    pub keep_rounds: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self { keep_rounds: 3 }
    }
}

impl MemoryConfig {
    /// `keep_rounds` clamped to at least one round.
    pub fn effective_keep_rounds(&self) -> usize {
        self.keep_rounds.max(1)
    }
}

/// Hard cap on entries in one retrieval result.
pub const MAX_RETRIEVAL_RESULTS: usize = 8;

/// Document retrieval settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Backend: "memory" (in-process index) or "qdrant".
    pub backend: String,
    /// Qdrant REST endpoint.
    pub qdrant_url: String,
    /// Optional Qdrant API key.
    pub qdrant_api_key: Option<String>,
    /// Collection holding the knowledge chunks.
    pub collection: String,
    /// Embedding service: "ollama" or "hash".
    pub embedding: String,
    /// Embedding model name served by Ollama.
    pub embedding_model: String,
    /// Embedding dimension.
    pub embedding_dim: usize,
    /// Hits requested from the backend per query.
    pub query_limit: usize,
    /// Maximum entries kept in a retrieval result, at most
    /// [`MAX_RETRIEVAL_RESULTS`].
    pub max_results: usize,
    /// Timeout for a single backend call in seconds.
    pub timeout_secs: u64,
    /// Target chunk size in characters at ingest.
    pub chunk_size: usize,
    /// Overlap between consecutive chunks in characters.
    pub chunk_overlap: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            backend: "memory".to_string(),
            qdrant_url: "http://127.0.0.1:6333".to_string(),
            qdrant_api_key: None,
            collection: "lab_knowledge".to_string(),
            embedding: "ollama".to_string(),
            embedding_model: "all-minilm".to_string(),
            embedding_dim: 384,
            query_limit: 3,
            max_results: 8,
            timeout_secs: 30,
            chunk_size: 500,
            chunk_overlap: 100,
        }
    }
}

impl RetrievalConfig {
    /// `max_results` clamped to `1..=MAX_RETRIEVAL_RESULTS`.
    pub fn effective_max_results(&self) -> usize {
        self.max_results.clamp(1, MAX_RETRIEVAL_RESULTS)
    }
}

/// Tool invocation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    /// Directory listed by the `list_storage_files` tool.
    pub storage_dir: String,
    /// Timeout for a single tool execution in seconds.
    pub timeout_secs: u64,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            storage_dir: "data_storage".to_string(),
            timeout_secs: 30,
        }
    }
}

/// Chat session settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// Pending requests admitted to the session queue.
    pub queue_depth: usize,
    /// Longest accepted user message in characters.
    pub max_message_chars: usize,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            queue_depth: 10,
            max_message_chars: 4000,
        }
    }
}

/// HTTP API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3030,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_default_config() {
        let config = BitsConfig::default();
        assert_eq!(config.general.data_dir, "~/.bits/data");
        assert_eq!(config.llm.endpoint, "http://127.0.0.1:11434");
        assert_eq!(config.llm.model, "qwen3:1.7b");
        assert_eq!(config.memory.keep_rounds, 3);
        assert_eq!(config.retrieval.backend, "memory");
        assert_eq!(config.retrieval.collection, "lab_knowledge");
        assert_eq!(config.retrieval.query_limit, 3);
        assert_eq!(config.retrieval.max_results, 8);
        assert_eq!(config.chat.queue_depth, 10);
        assert_eq!(config.api.port, 3030);
    }

    #[test]
    fn test_load_valid_config() {
        let content = r#"
[general]
log_level = "debug"

[llm]
endpoint = "http://gpu-box:11434"
model = "llama3.2"
timeout_secs = 45

[memory]
keep_rounds = 5

[retrieval]
backend = "qdrant"
qdrant_url = "http://qdrant:6333"
qdrant_api_key = "secret"
query_limit = 4

[chat]
queue_depth = 2
"#;
        let file = create_temp_config(content);
        let config = BitsConfig::load(file.path()).unwrap();
        assert_eq!(config.general.log_level, "debug");
        assert_eq!(config.llm.endpoint, "http://gpu-box:11434");
        assert_eq!(config.llm.model, "llama3.2");
        assert_eq!(config.llm.timeout_secs, 45);
        assert_eq!(config.memory.keep_rounds, 5);
        assert_eq!(config.retrieval.backend, "qdrant");
        assert_eq!(config.retrieval.qdrant_api_key.as_deref(), Some("secret"));
        assert_eq!(config.retrieval.query_limit, 4);
        assert_eq!(config.chat.queue_depth, 2);
    }

    #[test]
    fn test_load_partial_config_uses_defaults() {
        let content = r#"
[llm]
model = "mistral"
"#;
        let file = create_temp_config(content);
        let config = BitsConfig::load(file.path()).unwrap();
        assert_eq!(config.llm.model, "mistral");
        assert_eq!(config.llm.summarizer_model, "qwen3:1.7b");
        assert!((config.llm.temperature - 0.1).abs() < f32::EPSILON);
        assert_eq!(config.retrieval.max_results, 8);
        assert_eq!(config.tools.storage_dir, "data_storage");
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let config = BitsConfig::load_or_default(Path::new("/nonexistent/config.toml"));
        assert_eq!(config.general.data_dir, "~/.bits/data");
    }

    #[test]
    fn test_config_load_invalid_toml() {
        let file = create_temp_config("this is {{ not valid TOML");
        assert!(BitsConfig::load(file.path()).is_err());
    }

    #[test]
    fn test_save_creates_parent_dirs_and_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sub").join("config.toml");

        let mut config = BitsConfig::default();
        config.memory.keep_rounds = 7;
        config.save(&path).unwrap();

        assert!(path.exists());
        let reloaded = BitsConfig::load(&path).unwrap();
        assert_eq!(reloaded.memory.keep_rounds, 7);
        assert_eq!(reloaded.llm.model, config.llm.model);
    }

    #[test]
    fn test_empty_toml_uses_all_defaults() {
        let file = create_temp_config("");
        let config = BitsConfig::load(file.path()).unwrap();
        assert_eq!(config.memory.keep_rounds, 3);
        assert_eq!(config.retrieval.chunk_size, 500);
        assert_eq!(config.retrieval.chunk_overlap, 100);
    }

    #[test]
    fn test_keep_rounds_clamped_to_one() {
        let memory = MemoryConfig { keep_rounds: 0 };
        assert_eq!(memory.effective_keep_rounds(), 1);
        let memory = MemoryConfig { keep_rounds: 4 };
        assert_eq!(memory.effective_keep_rounds(), 4);
    }

    #[test]
    fn test_max_results_capped_at_eight() {
        let file = create_temp_config("[retrieval]\nmax_results = 50\n");
        let config = BitsConfig::load(file.path()).unwrap();
        assert_eq!(config.retrieval.max_results, 50);
        assert_eq!(config.retrieval.effective_max_results(), MAX_RETRIEVAL_RESULTS);

        let retrieval = RetrievalConfig {
            max_results: 0,
            ..Default::default()
        };
        assert_eq!(retrieval.effective_max_results(), 1);
        let retrieval = RetrievalConfig {
            max_results: 5,
            ..Default::default()
        };
        assert_eq!(retrieval.effective_max_results(), 5);
    }
}
