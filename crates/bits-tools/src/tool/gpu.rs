//! NVIDIA GPU status tool backed by `nvidia-smi`.

use std::path::PathBuf;

use async_trait::async_trait;
use serde_json::Value;
use tokio::process::Command;

use crate::error::ToolError;
use crate::tool::Tool;

pub const NO_GPU: &str = "No NVIDIA GPU detected.";

const QUERY: &str = "--query-gpu=name,utilization.gpu,temperature.gpu,memory.used,memory.total";

/// Reports load, temperature, and memory of each NVIDIA GPU.
pub struct GpuInfoTool {
    command: PathBuf,
}

impl GpuInfoTool {
    /// Use a specific `nvidia-smi` binary.
    pub fn with_command(command: impl Into<PathBuf>) -> Self {
        Self {
            command: command.into(),
        }
    }
}

impl Default for GpuInfoTool {
    fn default() -> Self {
        Self::with_command("nvidia-smi")
    }
}

#[async_trait]
impl Tool for GpuInfoTool {
    fn name(&self) -> &str {
        "gpu_info"
    }

    fn description(&self) -> &str {
        "Get NVIDIA GPU status (Load, Memory, Temperature)"
    }

    async fn invoke(&self, _arguments: &Value) -> Result<String, ToolError> {
        let output = match Command::new(&self.command)
            .args([QUERY, "--format=csv,noheader,nounits"])
            .output()
            .await
        {
            Ok(output) if output.status.success() => output,
            Ok(output) => {
                tracing::debug!(status = %output.status, "nvidia-smi exited with an error");
                return Ok(NO_GPU.to_string());
            }
            Err(e) => {
                tracing::debug!(error = %e, "nvidia-smi not available");
                return Ok(NO_GPU.to_string());
            }
        };

        let lines = parse_gpu_rows(&String::from_utf8_lossy(&output.stdout));
        if lines.is_empty() {
            return Ok(NO_GPU.to_string());
        }
        Ok(lines.join("\n"))
    }
}

/// One line per well-formed CSV row; memory columns are MiB.
fn parse_gpu_rows(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .filter_map(|line| {
            let fields: Vec<&str> = line.split(',').map(str::trim).collect();
            let [name, load, temp, used, total] = fields.as_slice() else {
                return None;
            };
            let load: f64 = load.parse().ok()?;
            let used: f64 = used.parse().ok()?;
            let total: f64 = total.parse().ok()?;
            Some(format!(
                "GPU: {} | Load: {:.1}% | Temp: {}°C | Mem: {:.2}/{:.2} GB",
                name,
                load,
                temp,
                used / 1024.0,
                total / 1024.0
            ))
        })
        .collect()
}
