//! Mantis - 桌面智能体决策核心
//!
//! 语言模型规划器驱动的本地自动化：一次提出一个工具调用，观察结果，
//! 循环直到给出最终回复。模块划分：
//! - **config**: 应用配置（TOML + 环境变量）
//! - **core**: 错误类型、Step 事件流与 ReAct 编排器
//! - **llm**: 推理服务客户端（OpenAI 兼容 / Mock）
//! - **react**: 会话转写、JSON 提取与规划协议
//! - **security**: 路径包含与可执行白名单策略
//! - **tools**: 能力契约、注册表与执行器沙箱

pub mod config;
pub mod core;
pub mod llm;
pub mod react;
pub mod security;
pub mod tools;
