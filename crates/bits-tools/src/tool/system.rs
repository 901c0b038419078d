//! Host CPU, memory, and disk usage tools.

use std::path::PathBuf;

use async_trait::async_trait;
use serde_json::Value;
use sysinfo::{Disks, System, MINIMUM_CPU_UPDATE_INTERVAL};

use crate::error::ToolError;
use crate::tool::Tool;

const GB: f64 = 1e9;
const NO_DISK: &str = "No disk information available.";

/// Reports CPU core count, current CPU load, and RAM usage.
pub struct SystemInfoTool;

#[async_trait]
impl Tool for SystemInfoTool {
    fn name(&self) -> &str {
        "system_info"
    }

    fn description(&self) -> &str {
        "CPU and RAM usage"
    }

    async fn invoke(&self, _arguments: &Value) -> Result<String, ToolError> {
        let mut sys = System::new();
        // CPU usage is a delta between two refreshes.
        sys.refresh_cpu_usage();
        tokio::time::sleep(MINIMUM_CPU_UPDATE_INTERVAL).await;
        sys.refresh_cpu_usage();
        sys.refresh_memory();

        Ok(format_system(
            sys.cpus().len(),
            sys.global_cpu_usage(),
            sys.used_memory(),
            sys.total_memory(),
        ))
    }
}

/// Reports used and total space of one mounted filesystem.
pub struct DiskInfoTool {
    mount_point: PathBuf,
}

impl DiskInfoTool {
    pub fn new(mount_point: impl Into<PathBuf>) -> Self {
        Self {
            mount_point: mount_point.into(),
        }
    }
}

impl Default for DiskInfoTool {
    fn default() -> Self {
        Self::new("/")
    }
}

#[async_trait]
impl Tool for DiskInfoTool {
    fn name(&self) -> &str {
        "disk_info"
    }

    fn description(&self) -> &str {
        "Get Disk/Storage usage for the root directory"
    }

    async fn invoke(&self, _arguments: &Value) -> Result<String, ToolError> {
        let disks = Disks::new_with_refreshed_list();
        // Fall back to the largest disk when the mount point is not listed.
        let disk = disks
            .list()
            .iter()
            .find(|d| d.mount_point() == self.mount_point.as_path())
            .or_else(|| disks.list().iter().max_by_key(|d| d.total_space()));

        Ok(match disk {
            Some(d) => format_disk(d.total_space().saturating_sub(d.available_space()), d.total_space()),
            None => NO_DISK.to_string(),
        })
    }
}

fn format_system(cores: usize, cpu_percent: f32, used_bytes: u64, total_bytes: u64) -> String {
    format!(
        "CPU: {} cores, Usage: {:.1}%\nRAM: {:.2}/{:.2} GB",
        cores,
        cpu_percent,
        used_bytes as f64 / GB,
        total_bytes as f64 / GB
    )
}

fn format_disk(used_bytes: u64, total_bytes: u64) -> String {
    if total_bytes == 0 {
        return NO_DISK.to_string();
    }
    let percent = used_bytes as f64 / total_bytes as f64 * 100.0;
    format!(
        "Disk: {:.2}/{:.2} GB ({:.1}% used)",
        used_bytes as f64 / GB,
        total_bytes as f64 / GB,
        percent
    )
}
