//! 推理服务客户端抽象
//!
//! 所有后端（OpenAI 兼容 / Mock）实现 LlmClient::complete：消息列表 → 原始助手文本。
//! 本层不施加超时，也不理解规划协议；协议解析在 react::client。

use async_trait::async_trait;

/// 发送给推理服务的消息角色
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    System,
    User,
    Assistant,
}

/// 单条消息
#[derive(Debug, Clone)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// 推理服务客户端
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// 阻塞式完成：整段消息进，整段助手文本出
    async fn complete(&self, messages: &[Message]) -> Result<String, String>;
}
