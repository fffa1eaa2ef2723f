//! 规划协议：单步决策的解析与校验
//!
//! 推理服务每轮必须输出单个 JSON 对象，且恰好包含 tool_call 与 final_response 之一；
//! 其余一律为协议错误，由 ReasoningClient 记入转写后上抛。

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::core::AgentError;

/// 规划器提出的单步工具调用；action 为空交由执行器报 "missing action"
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    #[serde(default)]
    pub action: String,
    #[serde(default)]
    pub parameters: Map<String, Value>,
}

/// 单步决策：要么调一个工具，要么给最终回复
#[derive(Debug, Clone)]
pub enum Plan {
    ToolCall(ToolCall),
    FinalResponse(String),
}

/// 校验提取出的 JSON 是否符合协议并构造 Plan
pub fn parse_plan(value: &Value) -> Result<Plan, AgentError> {
    let Some(obj) = value.as_object() else {
        return Err(AgentError::Protocol(
            "planner output is not a JSON object".to_string(),
        ));
    };
    match (obj.get("tool_call"), obj.get("final_response")) {
        (Some(_), Some(_)) => Err(AgentError::Protocol(
            "both tool_call and final_response present".to_string(),
        )),
        (None, None) => Err(AgentError::Protocol(
            "neither tool_call nor final_response present".to_string(),
        )),
        (Some(call), None) => {
            let call: ToolCall = serde_json::from_value(call.clone())
                .map_err(|e| AgentError::Protocol(format!("malformed tool_call: {}", e)))?;
            Ok(Plan::ToolCall(call))
        }
        (None, Some(Value::String(text))) => Ok(Plan::FinalResponse(text.clone())),
        (None, Some(other)) => Err(AgentError::Protocol(format!(
            "final_response must be a string, got {}",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_call_plan() {
        let value = serde_json::json!({
            "tool_call": {"action": "wait", "parameters": {"seconds": 1}}
        });
        match parse_plan(&value).unwrap() {
            Plan::ToolCall(call) => {
                assert_eq!(call.action, "wait");
                assert_eq!(call.parameters.get("seconds"), Some(&serde_json::json!(1)));
            }
            Plan::FinalResponse(_) => panic!("expected tool_call"),
        }
    }

    #[test]
    fn test_final_response_plan() {
        let value = serde_json::json!({"final_response": "all done"});
        assert!(matches!(
            parse_plan(&value).unwrap(),
            Plan::FinalResponse(text) if text == "all done"
        ));
    }

    #[test]
    fn test_both_keys_rejected() {
        let value = serde_json::json!({
            "tool_call": {"action": "wait"},
            "final_response": "done"
        });
        assert!(matches!(parse_plan(&value), Err(AgentError::Protocol(_))));
    }

    #[test]
    fn test_neither_key_rejected() {
        let value = serde_json::json!({"thought": "hmm"});
        assert!(matches!(parse_plan(&value), Err(AgentError::Protocol(_))));
    }

    #[test]
    fn test_non_object_rejected() {
        assert!(matches!(
            parse_plan(&serde_json::json!(["final_response"])),
            Err(AgentError::Protocol(_))
        ));
    }

    #[test]
    fn test_non_string_final_response_rejected() {
        let value = serde_json::json!({"final_response": {"text": "hi"}});
        assert!(matches!(parse_plan(&value), Err(AgentError::Protocol(_))));
    }

    #[test]
    fn test_missing_parameters_defaults_empty() {
        let value = serde_json::json!({"tool_call": {"action": "list_dir"}});
        match parse_plan(&value).unwrap() {
            Plan::ToolCall(call) => assert!(call.parameters.is_empty()),
            Plan::FinalResponse(_) => panic!("expected tool_call"),
        }
    }
}
