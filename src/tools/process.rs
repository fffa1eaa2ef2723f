//! 进程类工具：应用启动与等待
//!
//! start_application 受执行器的应用白名单约束（这里不重复检查）；
//! run_process 没有处理器——默认策略将其列入禁用集合，纵深防御。

use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use serde_json::Value;

use crate::security;
use crate::tools::{Tool, ToolError};

/// 启动一个脱离管理的桌面应用；返回 {pid, start_id}
pub struct StartApplicationTool {
    base: std::path::PathBuf,
}

impl StartApplicationTool {
    pub fn new(base: impl AsRef<Path>) -> Self {
        Self {
            base: base.as_ref().to_path_buf(),
        }
    }

    /// 形如路径的实参（含分隔符或 ~）解析为绝对路径，其余原样传给 OS 的 PATH 查找
    fn resolve_if_pathlike(&self, raw: &str) -> Result<String, ToolError> {
        if raw.contains('/') || raw.contains('\\') || raw.starts_with('~') {
            let resolved = security::resolve_path(raw, &self.base)?;
            Ok(resolved.display().to_string())
        } else {
            Ok(raw.to_string())
        }
    }
}

#[async_trait]
impl Tool for StartApplicationTool {
    fn name(&self) -> &str {
        "start_application"
    }
    fn description(&self) -> &str {
        "Launch a whitelisted desktop application, detached. \
         Parameters: app_name, args (optional string list). Returns {pid, start_id}"
    }
    fn param_names(&self) -> &[&str] {
        &["app_name", "args"]
    }
    async fn execute(&self, args: Value) -> Result<Value, ToolError> {
        let app_name = match args.get("app_name") {
            Some(Value::String(s)) if !s.trim().is_empty() => s.clone(),
            Some(Value::String(_)) | None => {
                return Err(ToolError::BadArgumentValue(
                    "'app_name' must be a non-empty string".to_string(),
                ))
            }
            Some(other) => {
                return Err(ToolError::BadArgumentType(format!(
                    "'app_name' must be a string, got {}",
                    other
                )))
            }
        };
        let program = self.resolve_if_pathlike(&app_name)?;

        let mut extra: Vec<String> = Vec::new();
        if let Some(list) = args.get("args") {
            let Some(items) = list.as_array() else {
                return Err(ToolError::BadArgumentType(
                    "'args' must be a list of strings".to_string(),
                ));
            };
            for item in items {
                let Some(s) = item.as_str() else {
                    return Err(ToolError::BadArgumentType(format!(
                        "'args' entries must be strings, got {}",
                        item
                    )));
                };
                extra.push(self.resolve_if_pathlike(s)?);
            }
        }

        let child = std::process::Command::new(&program)
            .args(&extra)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| ToolError::from_io(e, &program))?;

        let start_id = uuid::Uuid::new_v4().simple().to_string();
        Ok(serde_json::json!({
            "pid": child.id(),
            "start_id": format!("start-{}", &start_id[..8]),
        }))
    }
}

/// 暂停执行指定秒数并返回该数值；接受数字或数字字符串
pub struct WaitTool;

#[async_trait]
impl Tool for WaitTool {
    fn name(&self) -> &str {
        "wait"
    }
    fn description(&self) -> &str {
        "Pause for the given number of seconds. Parameters: seconds"
    }
    fn param_names(&self) -> &[&str] {
        &["seconds"]
    }
    async fn execute(&self, args: Value) -> Result<Value, ToolError> {
        let seconds = match args.get("seconds") {
            Some(Value::Number(n)) => n.as_f64().ok_or_else(|| {
                ToolError::BadArgumentValue(format!("'seconds' out of range: {}", n))
            })?,
            Some(Value::String(s)) => s.trim().parse::<f64>().map_err(|_| {
                ToolError::BadArgumentValue(format!("'seconds' is not a number: '{}'", s))
            })?,
            Some(other) => {
                return Err(ToolError::BadArgumentType(format!(
                    "'seconds' must be a number, got {}",
                    other
                )))
            }
            None => {
                return Err(ToolError::BadArgumentType(
                    "missing required parameter 'seconds'".to_string(),
                ))
            }
        };
        if !seconds.is_finite() || seconds < 0.0 {
            return Err(ToolError::BadArgumentValue(format!(
                "'seconds' must be a non-negative finite number, got {}",
                seconds
            )));
        }
        tokio::time::sleep(std::time::Duration::from_secs_f64(seconds)).await;
        Ok(serde_json::json!(seconds))
    }
}
