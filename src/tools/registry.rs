//! 工具注册表与能力契约
//!
//! 所有能力处理器实现 Tool trait（name / description / param_names / execute）。
//! ToolRegistry 在启动时按名注册，重名视为致命配置错误；
//! 策略门与超时不在这里，统一由 ExecutorCore 施加。

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::core::AgentError;

/// 处理器可返回的闭合错误枚举。
/// Other 之外均为可恢复错误（执行器映射为 status=error）；
/// Other 表示未预见的内部错误，映射为 status=fatal。
#[derive(Error, Debug)]
pub enum ToolError {
    #[error("NotFound: {0}")]
    NotFound(String),

    #[error("PermissionDenied: {0}")]
    PermissionDenied(String),

    #[error("AlreadyExists: {0}")]
    AlreadyExists(String),

    #[error("NotADirectory: {0}")]
    NotADirectory(String),

    /// 目标对象（窗口、控件等）不存在
    #[error("TargetNotFound: {0}")]
    TargetNotFound(String),

    /// 移入回收目录失败
    #[error("TrashDenied: {0}")]
    TrashDenied(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("BadArgumentType: {0}")]
    BadArgumentType(String),

    #[error("BadArgumentValue: {0}")]
    BadArgumentValue(String),

    #[error("Internal: {0}")]
    Other(String),
}

impl ToolError {
    /// IO 错误归入对应类别；未识别的种类归入 Other（最终呈现为 fatal）
    pub fn from_io(err: std::io::Error, what: impl std::fmt::Display) -> Self {
        use std::io::ErrorKind;
        let msg = format!("{}: {}", what, err);
        match err.kind() {
            ErrorKind::NotFound => ToolError::NotFound(msg),
            ErrorKind::PermissionDenied => ToolError::PermissionDenied(msg),
            ErrorKind::AlreadyExists => ToolError::AlreadyExists(msg),
            ErrorKind::NotADirectory | ErrorKind::IsADirectory => {
                ToolError::NotADirectory(msg)
            }
            ErrorKind::TimedOut => ToolError::Timeout(msg),
            ErrorKind::InvalidInput | ErrorKind::InvalidData => {
                ToolError::BadArgumentValue(msg)
            }
            _ => ToolError::Other(msg),
        }
    }
}

/// 能力契约：宿主可用同一契约注册鼠标/键盘/窗口等外部后端
#[async_trait]
pub trait Tool: Send + Sync {
    /// 动作名（注册表键，也是规划器使用的 action）
    fn name(&self) -> &str;

    /// 供规划器理解的功能描述（进入 system prompt 的工具清单）
    fn description(&self) -> &str;

    /// 声明接受的参数名集合；执行器拒绝未声明的参数
    fn param_names(&self) -> &[&str];

    /// 执行一次调用；只允许返回闭合枚举中的错误
    async fn execute(&self, args: Value) -> Result<Value, ToolError>;
}

/// 静态分发表：action 名 → 处理器
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册工具；同名注册返回 DuplicateTool，调用方应当直接启动失败
    pub fn register(&mut self, tool: impl Tool + 'static) -> Result<(), AgentError> {
        let name = tool.name().to_string();
        if self.tools.contains_key(&name) {
            return Err(AgentError::DuplicateTool(name));
        }
        self.tools.insert(name, Arc::new(tool));
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// (name, description) 列表，按名排序，用于拼装规划器提示词
    pub fn tool_descriptions(&self) -> Vec<(String, String)> {
        let mut out: Vec<(String, String)> = self
            .tools
            .values()
            .map(|t| (t.name().to_string(), t.description().to_string()))
            .collect();
        out.sort();
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NoopTool;

    #[async_trait]
    impl Tool for NoopTool {
        fn name(&self) -> &str {
            "noop"
        }
        fn description(&self) -> &str {
            "does nothing"
        }
        fn param_names(&self) -> &[&str] {
            &[]
        }
        async fn execute(&self, _args: Value) -> Result<Value, ToolError> {
            Ok(Value::Null)
        }
    }

    #[test]
    fn test_duplicate_registration_is_fatal() {
        let mut registry = ToolRegistry::new();
        registry.register(NoopTool).unwrap();
        let err = registry.register(NoopTool).unwrap_err();
        assert!(matches!(err, AgentError::DuplicateTool(name) if name == "noop"));
    }

    #[test]
    fn test_lookup() {
        let mut registry = ToolRegistry::new();
        registry.register(NoopTool).unwrap();
        assert!(registry.contains("noop"));
        assert!(registry.get("noop").is_some());
        assert!(registry.get("missing").is_none());
    }

    #[test]
    fn test_io_error_mapping() {
        let err = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        assert!(matches!(ToolError::from_io(err, "x"), ToolError::NotFound(_)));
        let err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "no");
        assert!(matches!(
            ToolError::from_io(err, "x"),
            ToolError::PermissionDenied(_)
        ));
        let err = std::io::Error::other("disk on fire");
        assert!(matches!(ToolError::from_io(err, "x"), ToolError::Other(_)));
    }
}
