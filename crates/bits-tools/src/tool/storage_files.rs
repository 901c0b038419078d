//! Storage directory listing tool.

use std::path::PathBuf;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::ToolError;
use crate::tool::Tool;

const EMPTY: &str = "Directory empty.";

/// Lists file names and sizes in the configured storage directory.
pub struct ListStorageFilesTool {
    dir: PathBuf,
}

impl ListStorageFilesTool {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

#[async_trait]
impl Tool for ListStorageFilesTool {
    fn name(&self) -> &str {
        "list_storage_files"
    }

    fn description(&self) -> &str {
        "List filenames in the data storage directory. Use only when the user asks which files are available."
    }

    async fn invoke(&self, _arguments: &Value) -> Result<String, ToolError> {
        if !tokio::fs::try_exists(&self.dir).await? {
            return Ok(EMPTY.to_string());
        }

        let mut entries = tokio::fs::read_dir(&self.dir).await?;
        let mut files = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let metadata = entry.metadata().await?;
            if metadata.is_file() {
                let size_mb = metadata.len() as f64 / (1024.0 * 1024.0);
                files.push((entry.file_name().to_string_lossy().into_owned(), size_mb));
            }
        }

        if files.is_empty() {
            return Ok(EMPTY.to_string());
        }

        files.sort_by(|a, b| a.0.cmp(&b.0));
        let lines: Vec<String> = files
            .iter()
            .map(|(name, size)| format!("- {} ({:.4} MB)", name, size))
            .collect();
        Ok(format!(
            "Files in {}:\n{}",
            self.dir.display(),
            lines.join("\n")
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_directory() {
        let tool = ListStorageFilesTool::new("/nonexistent/bits/storage");
        assert_eq!(tool.invoke(&Value::Null).await.unwrap(), EMPTY);
    }

    #[tokio::test]
    async fn test_empty_directory() {
        let dir = tempfile::tempdir().unwrap();
        let tool = ListStorageFilesTool::new(dir.path());
        assert_eq!(tool.invoke(&Value::Null).await.unwrap(), EMPTY);
    }

    #[tokio::test]
    async fn test_lists_files_with_sizes() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.csv"), vec![0u8; 1024 * 1024]).unwrap();
        std::fs::write(dir.path().join("a.txt"), b"hello").unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();

        let tool = ListStorageFilesTool::new(dir.path());
        let out = tool.invoke(&Value::Null).await.unwrap();
        let lines: Vec<&str> = out.lines().collect();
        assert!(lines[0].starts_with("Files in "));
        assert_eq!(lines[1], "- a.txt (0.0000 MB)");
        assert_eq!(lines[2], "- b.csv (1.0000 MB)");
        assert_eq!(lines.len(), 3);
    }
}
