//! 回显工具：把一段文本记入日志并原样确认，调试用

use async_trait::async_trait;
use serde_json::Value;

use crate::tools::{Tool, ToolError};

pub struct RespondTool;

#[async_trait]
impl Tool for RespondTool {
    fn name(&self) -> &str {
        "respond_me"
    }
    fn description(&self) -> &str {
        "Echo a message into the host log. Parameters: thing"
    }
    fn param_names(&self) -> &[&str] {
        &["thing"]
    }
    async fn execute(&self, args: Value) -> Result<Value, ToolError> {
        let thing = match args.get("thing") {
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => {
                return Err(ToolError::BadArgumentType(
                    "missing required parameter 'thing'".to_string(),
                ))
            }
        };
        tracing::info!(message = %thing, "respond_me");
        Ok(Value::String(format!("printed:{}", thing)))
    }
}
