//! Tool registry and trait definition.
//!
//! Defines the `Tool` async trait and the registry the tool pipeline uses to
//! look tools up by the exact name the model proposed.

pub mod clock;
pub mod gpu;
pub mod storage_files;
pub mod system;

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use bits_llm::provider::ToolSpec;

use crate::error::ToolError;

pub use clock::GetTimeTool;
pub use gpu::GpuInfoTool;
pub use storage_files::ListStorageFilesTool;
pub use system::{DiskInfoTool, SystemInfoTool};

/// A callable utility exposed to the model.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Name the model uses to call this tool.
    fn name(&self) -> &str;

    /// One-line description sent with the tool definition.
    fn description(&self) -> &str;

    /// JSON schema of the arguments object.
    fn parameters(&self) -> Value {
        serde_json::json!({ "type": "object", "properties": {} })
    }

    /// Run the tool and return its textual output.
    async fn invoke(&self, arguments: &Value) -> Result<String, ToolError>;
}

/// Registry of tools keyed by name.
#[derive(Default, Clone)]
pub struct ToolRegistry {
    tools: BTreeMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool, replacing any tool with the same name.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        tracing::debug!(tool = tool.name(), "Registered tool");
        self.tools.insert(tool.name().to_string(), tool);
    }

    /// Register the built-in tools.
    pub fn register_defaults(&mut self, storage_dir: impl Into<PathBuf>) {
        self.register(Arc::new(GetTimeTool));
        self.register(Arc::new(SystemInfoTool));
        self.register(Arc::new(DiskInfoTool::default()));
        self.register(Arc::new(GpuInfoTool::default()));
        self.register(Arc::new(ListStorageFilesTool::new(storage_dir)));
    }

    /// Exact-name lookup.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// Definitions advertised to the model, sorted by name.
    pub fn specs(&self) -> Vec<ToolSpec> {
        self.tools
            .values()
            .map(|tool| ToolSpec {
                name: tool.name().to_string(),
                description: tool.description().to_string(),
                parameters: tool.parameters(),
            })
            .collect()
    }

    pub fn names(&self) -> Vec<String> {
        self.tools.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }

        fn description(&self) -> &str {
            "Echo the text argument"
        }

        async fn invoke(&self, arguments: &Value) -> Result<String, ToolError> {
            arguments
                .get("text")
                .and_then(Value::as_str)
                .map(str::to_string)
                .ok_or_else(|| ToolError::InvalidArguments("missing text".to_string()))
        }
    }

    #[test]
    fn test_register_defaults() {
        let mut registry = ToolRegistry::new();
        registry.register_defaults("data_storage");
        assert_eq!(
            registry.names(),
            vec![
                "disk_info",
                "get_time",
                "gpu_info",
                "list_storage_files",
                "system_info"
            ]
        );
        assert!(registry.get("get_time").is_some());
        assert!(registry.get("GET_TIME").is_none());
    }

    #[test]
    fn test_specs_carry_schema() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool));
        let specs = registry.specs();
        assert_eq!(specs.len(), 1);
        assert_eq!(specs[0].name, "echo");
        assert_eq!(specs[0].parameters["type"], "object");
    }

    #[test]
    fn test_register_replaces_same_name() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool));
        registry.register(Arc::new(EchoTool));
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn test_invoke_through_registry() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool));
        let tool = registry.get("echo").unwrap();
        let out = tool.invoke(&serde_json::json!({"text": "hi"})).await.unwrap();
        assert_eq!(out, "hi");
        assert!(tool.invoke(&serde_json::json!({})).await.is_err());
    }
}
