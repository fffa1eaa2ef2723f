//! 推理客户端：会话转写与规划协议的执行方
//!
//! 独占持有转写（单写者），每轮拼 [system 提示] + 扁平化历史调用推理服务，
//! 提取并校验 Plan；失败的一轮也会以错误条目留在转写里，下一次尝试可见。
//! summarize_and_clear 将全部历史原子替换为单条 Memory 摘要，失败时保持原样。

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

use crate::core::AgentError;
use crate::llm::{LlmClient, Message};
use crate::react::{extract_json_block, parse_plan, Plan};
use crate::tools::ToolResult;

/// 转写条目角色
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
    /// 压缩后的历史摘要
    Memory,
}

/// 条目内容：纯文本或结构化 JSON（发送前统一 JSON 编码为字符串）
#[derive(Debug, Clone)]
pub enum EntryContent {
    Text(String),
    Json(Value),
}

#[derive(Debug, Clone)]
pub struct HistoryEntry {
    pub role: Role,
    pub content: EntryContent,
}

impl HistoryEntry {
    fn text(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: EntryContent::Text(content.into()),
        }
    }

    fn json(role: Role, content: Value) -> Self {
        Self {
            role,
            content: EntryContent::Json(content),
        }
    }

    /// 扁平化为发送给推理服务的消息正文
    pub fn flatten(&self) -> String {
        match &self.content {
            EntryContent::Text(s) => s.clone(),
            EntryContent::Json(v) => v.to_string(),
        }
    }
}

pub struct ReasoningClient {
    llm: Arc<dyn LlmClient>,
    react_prompt: String,
    summarizer_prompt: String,
    history: Vec<HistoryEntry>,
}

impl ReasoningClient {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        react_prompt: impl Into<String>,
        summarizer_prompt: impl Into<String>,
    ) -> Self {
        Self {
            llm,
            react_prompt: react_prompt.into(),
            summarizer_prompt: summarizer_prompt.into(),
            history: Vec::new(),
        }
    }

    pub fn history(&self) -> &[HistoryEntry] {
        &self.history
    }

    /// 请求下一步决策。user_input 为 Some 时先追加一条 User 条目。
    pub async fn get_next_step(
        &mut self,
        user_input: Option<&str>,
    ) -> Result<Plan, AgentError> {
        if let Some(input) = user_input {
            self.history.push(HistoryEntry::text(Role::User, input));
        }

        let mut messages = vec![Message::system(self.react_prompt.clone())];
        messages.extend(self.to_llm_messages());
        let assistant_text = self
            .llm
            .complete(&messages)
            .await
            .map_err(AgentError::Llm)?;

        let block = match extract_json_block(&assistant_text) {
            Ok(block) => block,
            Err(err) => return Err(self.record_failure(err)),
        };
        let parsed: Value = match serde_json::from_str(block) {
            Ok(value) => value,
            Err(err) => {
                return Err(self.record_failure(AgentError::JsonParse(err.to_string())))
            }
        };
        let plan = match parse_plan(&parsed) {
            Ok(plan) => plan,
            Err(err) => return Err(self.record_failure(err)),
        };

        // 成功：原始决策对象入转写，后续轮次可见
        self.history.push(HistoryEntry::json(Role::Assistant, parsed));
        Ok(plan)
    }

    /// 无条件把执行结果追加为 Tool 条目
    pub fn add_tool_response(&mut self, result: &ToolResult) {
        let value = serde_json::to_value(result).unwrap_or(Value::Null);
        self.history.push(HistoryEntry::json(Role::Tool, value));
    }

    /// 把整段转写压缩成一条 Memory 条目；推理失败时转写保持原样
    pub async fn summarize_and_clear(&mut self) -> Result<(), AgentError> {
        if self.history.is_empty() {
            return Ok(());
        }
        let mut messages = vec![Message::system(self.summarizer_prompt.clone())];
        messages.extend(self.to_llm_messages());
        let summary = self
            .llm
            .complete(&messages)
            .await
            .map_err(AgentError::Llm)?;

        self.history.clear();
        self.history.push(HistoryEntry::text(Role::Memory, summary));
        Ok(())
    }

    /// 失败的一轮也要留痕，否则模型会在同一个坑里反复踩
    fn record_failure(&mut self, err: AgentError) -> AgentError {
        self.history.push(HistoryEntry::json(
            Role::Assistant,
            serde_json::json!({"status": "error", "error": err.to_string()}),
        ));
        err
    }

    fn to_llm_messages(&self) -> Vec<Message> {
        self.history
            .iter()
            .map(|entry| {
                let content = entry.flatten();
                match entry.role {
                    Role::System => Message::system(content),
                    Role::Assistant => Message::assistant(content),
                    // tool 与 memory 没有通用的原生角色，降级为 user
                    Role::User | Role::Tool | Role::Memory => Message::user(content),
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockLlmClient;

    fn client_with(mock: MockLlmClient) -> ReasoningClient {
        ReasoningClient::new(Arc::new(mock), "react prompt", "summarizer prompt")
    }

    #[tokio::test]
    async fn test_tool_call_round() {
        let mock = MockLlmClient::scripted([
            r#"```json
{"tool_call": {"action": "wait", "parameters": {"seconds": 1}}}
```"#,
        ]);
        let mut client = client_with(mock);
        let plan = client.get_next_step(Some("wait a bit")).await.unwrap();
        assert!(matches!(plan, Plan::ToolCall(call) if call.action == "wait"));
        // user + assistant
        assert_eq!(client.history().len(), 2);
        assert_eq!(client.history()[0].role, Role::User);
        assert_eq!(client.history()[1].role, Role::Assistant);
    }

    #[tokio::test]
    async fn test_protocol_failure_leaves_error_entry() {
        let mock = MockLlmClient::scripted([r#"{"thought": "no decision"}"#]);
        let mut client = client_with(mock);
        let err = client.get_next_step(Some("go")).await.unwrap_err();
        assert!(matches!(err, AgentError::Protocol(_)));
        // user + assistant 错误条目
        assert_eq!(client.history().len(), 2);
        let entry = &client.history()[1];
        assert_eq!(entry.role, Role::Assistant);
        assert!(entry.flatten().contains("Protocol error"));
    }

    #[tokio::test]
    async fn test_extraction_failure_leaves_error_entry() {
        let mock = MockLlmClient::scripted(["I refuse to answer in JSON."]);
        let mut client = client_with(mock);
        let err = client.get_next_step(Some("go")).await.unwrap_err();
        assert!(matches!(err, AgentError::Extraction(_)));
        assert!(client.history()[1].flatten().contains("Extraction error"));
    }

    #[tokio::test]
    async fn test_summarize_replaces_history() {
        let mock = MockLlmClient::scripted([
            r#"{"final_response": "done"}"#,
            "the user asked and we answered",
        ]);
        let mut client = client_with(mock);
        client.get_next_step(Some("hi")).await.unwrap();
        client.add_tool_response(&crate::tools::ToolResult::success(Value::Null));
        assert_eq!(client.history().len(), 3);

        client.summarize_and_clear().await.unwrap();
        assert_eq!(client.history().len(), 1);
        assert_eq!(client.history()[0].role, Role::Memory);
        assert_eq!(
            client.history()[0].flatten(),
            "the user asked and we answered"
        );
    }

    #[tokio::test]
    async fn test_summarize_failure_keeps_history() {
        // 脚本只有一条：摘要那次调用会失败
        let mock = MockLlmClient::scripted([r#"{"final_response": "done"}"#]);
        let mut client = client_with(mock);
        client.get_next_step(Some("hi")).await.unwrap();
        let before = client.history().len();

        let err = client.summarize_and_clear().await.unwrap_err();
        assert!(matches!(err, AgentError::Llm(_)));
        assert_eq!(client.history().len(), before);
    }
}
