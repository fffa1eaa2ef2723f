//! 能力层：契约、注册表、执行器与内建工具

pub mod executor;
pub mod fs;
pub mod process;
pub mod registry;
pub mod respond;

use std::path::Path;

pub use executor::{ExecutorCore, ToolResult, ToolStatus};
pub use fs::{
    AppendFileTool, CreateDirTool, ListDirTool, MoveFileTool, ReadFileTool, RecycleTool,
    SandboxRoot, WriteFileTool,
};
pub use process::{StartApplicationTool, WaitTool};
pub use registry::{Tool, ToolError, ToolRegistry};
pub use respond::RespondTool;

use crate::core::AgentError;

/// 注册默认工具箱（文件系统 + 应用启动 + 等待 + 回显）。
/// run_process 故意没有处理器：默认策略将其禁用，注册表层面也不提供。
pub fn default_registry(base: &Path) -> Result<ToolRegistry, AgentError> {
    let mut registry = ToolRegistry::new();
    let root = SandboxRoot::new(base);
    registry.register(ReadFileTool::new(root.clone()))?;
    registry.register(WriteFileTool::new(root.clone()))?;
    registry.register(AppendFileTool::new(root.clone()))?;
    registry.register(ListDirTool::new(root.clone()))?;
    registry.register(MoveFileTool::new(root.clone()))?;
    registry.register(CreateDirTool::new(root.clone()))?;
    registry.register(RecycleTool::new(root))?;
    registry.register(StartApplicationTool::new(base))?;
    registry.register(WaitTool)?;
    registry.register(RespondTool)?;
    Ok(registry)
}
