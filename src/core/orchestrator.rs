//! ReAct 编排器：主控状态机
//!
//! Start → AwaitPlan → (ToolCall → Execute → Observe)* → FinalResponse；
//! 循环守卫防失控成本，取消令牌在迭代之间协作检查，
//! 任何退出路径都尽力做一次转写摘要（失败只记日志，不影响主结果）。

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::config::AppConfig;
use crate::core::Step;
use crate::llm::{LlmClient, MockLlmClient, OpenAiClient};
use crate::react::{Plan, ReasoningClient};
use crate::security::Policy;
use crate::tools::{default_registry, ExecutorCore, ToolResult};

/// 单次运行的默认最大 ReAct 步数
pub const DEFAULT_MAX_STEPS: usize = 50;

const DEFAULT_REACT_PROMPT: &str = include_str!("../../config/prompts/react.txt");
const DEFAULT_SUMMARIZER_PROMPT: &str = include_str!("../../config/prompts/summarizer.txt");

fn emit(tx: &mpsc::UnboundedSender<Step>, step: Step) {
    // 接收端关闭意味着宿主不再关心事件；丢弃即可
    let _ = tx.send(step);
}

pub struct Orchestrator {
    max_steps: usize,
}

impl Orchestrator {
    pub fn new(max_steps: usize) -> Self {
        Self {
            max_steps: if max_steps == 0 {
                DEFAULT_MAX_STEPS
            } else {
                max_steps
            },
        }
    }

    /// 驱动一次完整运行；事件经 step_tx 增量推送
    pub async fn run(
        &self,
        client: &mut ReasoningClient,
        executor: &ExecutorCore,
        prompt: &str,
        step_tx: &mpsc::UnboundedSender<Step>,
        cancel_token: CancellationToken,
    ) {
        emit(step_tx, Step::UserPrompt(prompt.to_string()));
        self.run_loop(client, executor, prompt, step_tx, cancel_token)
            .await;
        // 摘要失败绝不掩盖已经产出的主结果
        if let Err(e) = client.summarize_and_clear().await {
            tracing::debug!(error = %e, "transcript summarization failed");
        }
    }

    async fn run_loop(
        &self,
        client: &mut ReasoningClient,
        executor: &ExecutorCore,
        prompt: &str,
        step_tx: &mpsc::UnboundedSender<Step>,
        cancel_token: CancellationToken,
    ) {
        let mut plan = match client.get_next_step(Some(prompt)).await {
            Ok(plan) => plan,
            Err(e) => {
                emit(step_tx, Step::Assistant(format!("Planner error: {}", e)));
                emit(
                    step_tx,
                    Step::Assistant("(no final_response produced)".to_string()),
                );
                return;
            }
        };
        emit(step_tx, Step::Thought(plan_to_value(&plan)));

        let mut guard = 0usize;
        loop {
            match plan {
                Plan::FinalResponse(text) => {
                    emit(step_tx, Step::Assistant(text));
                    return;
                }
                Plan::ToolCall(tool_call) => {
                    if cancel_token.is_cancelled() {
                        tracing::info!("run cancelled by host");
                        emit(step_tx, Step::Assistant("(cancelled by user)".to_string()));
                        return;
                    }
                    guard += 1;
                    if guard > self.max_steps {
                        tracing::warn!(max_steps = self.max_steps, "loop guard tripped");
                        let overrun = ToolResult::error("too-many-steps");
                        client.add_tool_response(&overrun);
                        emit(step_tx, Step::ToolResult(overrun));
                        emit(
                            step_tx,
                            Step::Assistant("(no final_response produced)".to_string()),
                        );
                        return;
                    }

                    let result = executor.execute(&tool_call).await;
                    client.add_tool_response(&result);
                    emit(step_tx, Step::ToolResult(result));

                    plan = match client.get_next_step(None).await {
                        Ok(plan) => plan,
                        Err(e) => {
                            emit(step_tx, Step::Assistant(format!("Planner error: {}", e)));
                            emit(
                                step_tx,
                                Step::Assistant("(no final_response produced)".to_string()),
                            );
                            return;
                        }
                    };
                    emit(step_tx, Step::Thought(plan_to_value(&plan)));
                }
            }
        }
    }
}

/// Thought 事件携带与线上协议一致的完整决策对象
fn plan_to_value(plan: &Plan) -> serde_json::Value {
    match plan {
        Plan::ToolCall(call) => serde_json::json!({"tool_call": call}),
        Plan::FinalResponse(text) => serde_json::json!({"final_response": text}),
    }
}

/// 按配置与可用的 API Key 选择推理后端；没有 Key 或显式 mock 时退回 Mock
pub fn create_llm_from_config(cfg: &AppConfig) -> Arc<dyn LlmClient> {
    if cfg.llm.provider.eq_ignore_ascii_case("mock") {
        tracing::info!("Using Mock reasoning backend (configured)");
        return Arc::new(MockLlmClient::default());
    }
    let api_key = std::env::var("MANTIS_API_KEY")
        .ok()
        .or_else(|| std::env::var("OPENAI_API_KEY").ok());
    match api_key {
        Some(key) => {
            tracing::info!(model = %cfg.llm.model, "Using OpenAI-compatible reasoning backend");
            Arc::new(OpenAiClient::new(
                cfg.llm.base_url.as_deref(),
                &cfg.llm.model,
                Some(&key),
            ))
        }
        None => {
            tracing::warn!("No API key found (MANTIS_API_KEY / OPENAI_API_KEY), using Mock backend");
            Arc::new(MockLlmClient::default())
        }
    }
}

/// 从磁盘加载提示词，找不到时用内嵌默认值
fn load_prompt(candidates: &[&str], fallback: &str) -> String {
    candidates
        .iter()
        .find_map(|path| std::fs::read_to_string(path).ok())
        .unwrap_or_else(|| fallback.to_string())
}

/// 从配置组装全套组件并在后台任务中驱动一次运行。
/// 返回事件接收端、取消令牌与任务句柄。
pub fn spawn_agent(
    cfg: &AppConfig,
    prompt: String,
) -> anyhow::Result<(
    mpsc::UnboundedReceiver<Step>,
    CancellationToken,
    tokio::task::JoinHandle<()>,
)> {
    let base_path = cfg.agent_base_path();
    std::fs::create_dir_all(&base_path)?;
    let base_path = base_path.canonicalize().unwrap_or(base_path);

    let policy = Policy::new(
        &base_path,
        cfg.policy.app_whitelist.clone(),
        cfg.policy.forbidden_actions.iter().cloned(),
        cfg.policy.enforce_app_whitelist,
    );
    let registry = default_registry(&base_path)?;
    let executor = ExecutorCore::new(registry, policy, cfg.tools.tool_timeout_secs);

    let mut react_prompt = load_prompt(
        &["config/prompts/react.txt", "../config/prompts/react.txt"],
        DEFAULT_REACT_PROMPT,
    );
    react_prompt.push_str("\n\nAvailable tools:\n");
    for (name, description) in executor.tool_descriptions() {
        react_prompt.push_str(&format!("- {}: {}\n", name, description));
    }
    let summarizer_prompt = load_prompt(
        &[
            "config/prompts/summarizer.txt",
            "../config/prompts/summarizer.txt",
        ],
        DEFAULT_SUMMARIZER_PROMPT,
    );

    let llm = create_llm_from_config(cfg);
    let mut client = ReasoningClient::new(llm, react_prompt, summarizer_prompt);

    let (step_tx, step_rx) = mpsc::unbounded_channel();
    let cancel_token = CancellationToken::new();
    let orchestrator = Orchestrator::new(cfg.agent.max_steps);

    let run_token = cancel_token.clone();
    let handle = tokio::spawn(async move {
        orchestrator
            .run(&mut client, &executor, &prompt, &step_tx, run_token)
            .await;
    });

    Ok((step_rx, cancel_token, handle))
}
