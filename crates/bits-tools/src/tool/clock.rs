//! Current local time tool.

use async_trait::async_trait;
use chrono::Local;
use serde_json::Value;

use crate::error::ToolError;
use crate::tool::Tool;

pub const TIME_FORMAT: &str = "%Y-%m-%d (%A) %H:%M:%S";

/// Returns the current local date, weekday, and time.
pub struct GetTimeTool;

#[async_trait]
impl Tool for GetTimeTool {
    fn name(&self) -> &str {
        "get_time"
    }

    fn description(&self) -> &str {
        "Current time"
    }

    async fn invoke(&self, _arguments: &Value) -> Result<String, ToolError> {
        let now = Local::now().format(TIME_FORMAT).to_string();
        tracing::debug!(time = %now, "get_time invoked");
        Ok(now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_get_time_format() {
        let out = GetTimeTool.invoke(&Value::Null).await.unwrap();
        assert!(chrono::NaiveDateTime::parse_from_str(&out, TIME_FORMAT).is_ok());
        assert!(out.contains('('));
    }
}
