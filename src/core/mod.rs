//! 核心层：错误类型、过程事件与 ReAct 编排

pub mod error;
pub mod events;
pub mod orchestrator;

pub use error::AgentError;
pub use events::Step;
pub use orchestrator::{
    create_llm_from_config, spawn_agent, Orchestrator, DEFAULT_MAX_STEPS,
};
