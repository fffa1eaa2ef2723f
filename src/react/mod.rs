//! 规划协议层：转写管理、JSON 提取与单步决策

pub mod client;
pub mod extract;
pub mod plan;

pub use client::{EntryContent, HistoryEntry, ReasoningClient, Role};
pub use extract::extract_json_block;
pub use plan::{parse_plan, Plan, ToolCall};
