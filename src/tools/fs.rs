//! 沙箱文件系统工具
//!
//! 全部路径经 security::resolve_path 解析到注入的沙箱根，再由处理器自己操作；
//! 包含校验本身在 ExecutorCore 的策略门完成，这里只做解析与 IO。
//! 错误一律映射进闭合枚举，处理器从不 panic。

use std::fs;
use std::io::Write as _;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::Value;

use crate::security;
use crate::tools::{Tool, ToolError};

/// 文件系统工具共享的沙箱根
#[derive(Debug, Clone)]
pub struct SandboxRoot {
    base: PathBuf,
}

impl SandboxRoot {
    pub fn new(base: impl AsRef<Path>) -> Self {
        Self {
            base: base.as_ref().to_path_buf(),
        }
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    /// 取 args[key] 作为路径并解析；缺失或非字符串 → BadArgumentType
    fn resolve(&self, args: &Value, key: &str) -> Result<PathBuf, ToolError> {
        let raw = require_str(args, key)?;
        security::resolve_path(raw, &self.base)
    }
}

fn require_str<'a>(args: &'a Value, key: &str) -> Result<&'a str, ToolError> {
    match args.get(key) {
        Some(Value::String(s)) => Ok(s),
        Some(other) => Err(ToolError::BadArgumentType(format!(
            "parameter '{}' must be a string, got {}",
            key, other
        ))),
        None => Err(ToolError::BadArgumentType(format!(
            "missing required parameter '{}'",
            key
        ))),
    }
}

/// content 参数：字符串原样，其余 JSON 编码后写入
fn content_string(args: &Value) -> Result<String, ToolError> {
    match args.get("content") {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(other) => Ok(other.to_string()),
        None => Err(ToolError::BadArgumentType(
            "missing required parameter 'content'".to_string(),
        )),
    }
}

pub struct ReadFileTool {
    root: SandboxRoot,
}

impl ReadFileTool {
    pub fn new(root: SandboxRoot) -> Self {
        Self { root }
    }
}

#[async_trait]
impl Tool for ReadFileTool {
    fn name(&self) -> &str {
        "read_file"
    }
    fn description(&self) -> &str {
        "Read a text file and return its full content. Parameters: path"
    }
    fn param_names(&self) -> &[&str] {
        &["path"]
    }
    async fn execute(&self, args: Value) -> Result<Value, ToolError> {
        let path = self.root.resolve(&args, "path")?;
        let content = fs::read_to_string(&path)
            .map_err(|e| ToolError::from_io(e, path.display()))?;
        Ok(Value::String(content))
    }
}

pub struct WriteFileTool {
    root: SandboxRoot,
}

impl WriteFileTool {
    pub fn new(root: SandboxRoot) -> Self {
        Self { root }
    }
}

#[async_trait]
impl Tool for WriteFileTool {
    fn name(&self) -> &str {
        "write_file"
    }
    fn description(&self) -> &str {
        "Create or overwrite a text file, creating parent directories. \
         Parameters: path, content. Returns the resolved path"
    }
    fn param_names(&self) -> &[&str] {
        &["path", "content"]
    }
    async fn execute(&self, args: Value) -> Result<Value, ToolError> {
        let path = self.root.resolve(&args, "path")?;
        let content = content_string(&args)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| ToolError::from_io(e, parent.display()))?;
        }
        fs::write(&path, content).map_err(|e| ToolError::from_io(e, path.display()))?;
        Ok(Value::String(path.display().to_string()))
    }
}

pub struct AppendFileTool {
    root: SandboxRoot,
}

impl AppendFileTool {
    pub fn new(root: SandboxRoot) -> Self {
        Self { root }
    }
}

#[async_trait]
impl Tool for AppendFileTool {
    fn name(&self) -> &str {
        "append_file"
    }
    fn description(&self) -> &str {
        "Append text to a file, creating it if missing. Parameters: path, content"
    }
    fn param_names(&self) -> &[&str] {
        &["path", "content"]
    }
    async fn execute(&self, args: Value) -> Result<Value, ToolError> {
        let path = self.root.resolve(&args, "path")?;
        let content = content_string(&args)?;
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| ToolError::from_io(e, path.display()))?;
        file.write_all(content.as_bytes())
            .map_err(|e| ToolError::from_io(e, path.display()))?;
        Ok(Value::String(path.display().to_string()))
    }
}

pub struct ListDirTool {
    root: SandboxRoot,
}

impl ListDirTool {
    pub fn new(root: SandboxRoot) -> Self {
        Self { root }
    }
}

#[async_trait]
impl Tool for ListDirTool {
    fn name(&self) -> &str {
        "list_dir"
    }
    fn description(&self) -> &str {
        "List entry names in a directory. Parameters: path"
    }
    fn param_names(&self) -> &[&str] {
        &["path"]
    }
    async fn execute(&self, args: Value) -> Result<Value, ToolError> {
        let path = self.root.resolve(&args, "path")?;
        let entries = fs::read_dir(&path).map_err(|e| ToolError::from_io(e, path.display()))?;
        let mut names: Vec<String> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        Ok(Value::Array(names.into_iter().map(Value::String).collect()))
    }
}

pub struct MoveFileTool {
    root: SandboxRoot,
}

impl MoveFileTool {
    pub fn new(root: SandboxRoot) -> Self {
        Self { root }
    }
}

#[async_trait]
impl Tool for MoveFileTool {
    fn name(&self) -> &str {
        "move_file"
    }
    fn description(&self) -> &str {
        "Move or rename a file/directory, creating destination parents. Parameters: src, dst"
    }
    fn param_names(&self) -> &[&str] {
        &["src", "dst"]
    }
    async fn execute(&self, args: Value) -> Result<Value, ToolError> {
        let src = self.root.resolve(&args, "src")?;
        let dst = self.root.resolve(&args, "dst")?;
        if let Some(parent) = dst.parent() {
            fs::create_dir_all(parent).map_err(|e| ToolError::from_io(e, parent.display()))?;
        }
        fs::rename(&src, &dst).map_err(|e| ToolError::from_io(e, src.display()))?;
        Ok(Value::String(dst.display().to_string()))
    }
}

pub struct CreateDirTool {
    root: SandboxRoot,
}

impl CreateDirTool {
    pub fn new(root: SandboxRoot) -> Self {
        Self { root }
    }
}

#[async_trait]
impl Tool for CreateDirTool {
    fn name(&self) -> &str {
        "create_dir"
    }
    fn description(&self) -> &str {
        "Create a directory (with parents). Parameters: path"
    }
    fn param_names(&self) -> &[&str] {
        &["path"]
    }
    async fn execute(&self, args: Value) -> Result<Value, ToolError> {
        let path = self.root.resolve(&args, "path")?;
        fs::create_dir_all(&path).map_err(|e| ToolError::from_io(e, path.display()))?;
        Ok(Value::String(path.display().to_string()))
    }
}

/// 软删除：移入沙箱根下的 .trash，文件名追加随机后缀避免冲突
pub struct RecycleTool {
    root: SandboxRoot,
}

impl RecycleTool {
    pub fn new(root: SandboxRoot) -> Self {
        Self { root }
    }
}

#[async_trait]
impl Tool for RecycleTool {
    fn name(&self) -> &str {
        "move_to_recycle_bin"
    }
    fn description(&self) -> &str {
        "Soft-delete: move a file/directory into the sandbox trash. Parameters: path"
    }
    fn param_names(&self) -> &[&str] {
        &["path"]
    }
    async fn execute(&self, args: Value) -> Result<Value, ToolError> {
        let path = self.root.resolve(&args, "path")?;
        if !path.exists() {
            return Err(ToolError::NotFound(format!("{}", path.display())));
        }
        let trash = self.root.base().join(".trash");
        fs::create_dir_all(&trash)
            .map_err(|e| ToolError::TrashDenied(format!("{}: {}", trash.display(), e)))?;

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "item".to_string());
        let suffix = uuid::Uuid::new_v4().simple().to_string();
        let dest = trash.join(format!("{}-{}", name, &suffix[..8]));
        fs::rename(&path, &dest)
            .map_err(|e| ToolError::TrashDenied(format!("{}: {}", path.display(), e)))?;
        Ok(Value::String(format!(
            "moved-to-recycle-bin:{}",
            path.display()
        )))
    }
}
