//! Mantis - 桌面智能体决策核心
//!
//! 入口：初始化日志、读取命令行提示词、后台驱动一次运行，并把 Step 事件按 JSON 行打印。

use anyhow::Context;
use mantis::config::{load_config, AppConfig};
use mantis::core::spawn_agent;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 日志：默认 info，可通过 RUST_LOG 覆盖
    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive("info".parse().unwrap()))
        .with(fmt::layer())
        .init();

    let prompt = std::env::args().skip(1).collect::<Vec<_>>().join(" ");
    anyhow::ensure!(!prompt.trim().is_empty(), "usage: mantis <prompt>");

    let cfg = load_config(None).unwrap_or_else(|e| {
        tracing::warn!(error = %e, "config load failed, using defaults");
        AppConfig::default()
    });

    let (mut step_rx, _cancel_token, handle) =
        spawn_agent(&cfg, prompt).context("Failed to start agent run")?;

    while let Some(step) = step_rx.recv().await {
        println!("{}", serde_json::to_string(&step)?);
    }
    handle.await.context("Agent run task failed")?;

    Ok(())
}
