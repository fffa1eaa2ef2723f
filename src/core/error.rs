//! Agent 错误类型
//!
//! 规划协议错误（提取 / 解析 / 校验）、推理服务错误与启动期配置错误；
//! 工具处理器侧的闭合错误枚举见 tools::ToolError。

use thiserror::Error;

/// 运行过程中可能出现的错误（规划协议、推理服务、启动配置）
#[derive(Error, Debug)]
pub enum AgentError {
    /// 助手文本中找不到完整的 JSON 块
    #[error("Extraction error: {0}")]
    Extraction(String),

    /// 提取出的块不是合法 JSON
    #[error("JSON parse error: {0}")]
    JsonParse(String),

    /// JSON 合法但不符合单步协议（恰好一个 tool_call 或 final_response）
    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("LLM error: {0}")]
    Llm(String),

    #[error("Config error: {0}")]
    Config(String),

    /// 同名工具重复注册，属启动期致命配置错误
    #[error("Duplicate tool registration: {0}")]
    DuplicateTool(String),
}
