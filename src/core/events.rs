//! 过程事件：编排器产出、宿主（UI 等）消费的单步事件流

use serde::Serialize;
use serde_json::Value;

use crate::tools::ToolResult;

/// 单步事件（序列化为 {type, content} 供前端展示）
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "content", rename_all = "snake_case")]
pub enum Step {
    /// 用户输入已进入本轮运行
    UserPrompt(String),
    /// 规划器产出的完整决策 JSON（tool_call 或 final_response 对象）
    Thought(Value),
    /// 执行器产出的观察结果
    ToolResult(ToolResult),
    /// 最终回复或终止标记
    Assistant(String),
}
