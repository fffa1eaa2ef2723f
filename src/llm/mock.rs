//! Mock 推理客户端（用于测试与无 API Key 运行）
//!
//! 两种模式：scripted 按序弹出预置回复，耗尽后报错；
//! repeating 永远返回同一条（循环守卫测试用）。默认实例固定回一条 final_response。

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::llm::{LlmClient, Message};

pub struct MockLlmClient {
    script: Mutex<VecDeque<String>>,
    repeat: Option<String>,
}

impl Default for MockLlmClient {
    fn default() -> Self {
        Self::repeating(
            r#"{"final_response": "Mock backend active. Set OPENAI_API_KEY to talk to a real model."}"#,
        )
    }
}

impl MockLlmClient {
    /// 按序返回给定回复，耗尽后 complete 返回 Err
    pub fn scripted<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            script: Mutex::new(responses.into_iter().map(Into::into).collect()),
            repeat: None,
        }
    }

    /// 每次都返回同一条回复
    pub fn repeating(response: impl Into<String>) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            repeat: Some(response.into()),
        }
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete(&self, _messages: &[Message]) -> Result<String, String> {
        if let Some(fixed) = &self.repeat {
            return Ok(fixed.clone());
        }
        let mut script = self
            .script
            .lock()
            .map_err(|_| "mock script lock poisoned".to_string())?;
        script
            .pop_front()
            .ok_or_else(|| "mock script exhausted".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scripted_order_then_exhaustion() {
        let mock = MockLlmClient::scripted(["a", "b"]);
        assert_eq!(mock.complete(&[]).await.unwrap(), "a");
        assert_eq!(mock.complete(&[]).await.unwrap(), "b");
        assert!(mock.complete(&[]).await.is_err());
    }

    #[tokio::test]
    async fn test_repeating_never_exhausts() {
        let mock = MockLlmClient::repeating("same");
        for _ in 0..3 {
            assert_eq!(mock.complete(&[]).await.unwrap(), "same");
        }
    }
}
