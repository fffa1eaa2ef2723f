//! 执行器沙箱
//!
//! 每个 ToolCall 恰好产出一个 ToolResult，处理器的任何失败都不会越过这层外泄：
//! 策略门（禁用动作 / 路径包含 / 应用白名单 / 参数名校验）严格先于派发，
//! 闭合错误枚举 → status=error，未预见错误与 panic → status=fatal。
//! 每次调用落一条结构化审计日志。

use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::time::{timeout, Duration};

use crate::react::ToolCall;
use crate::security::Policy;
use crate::tools::{Tool, ToolError, ToolRegistry};

/// 带路径语义、必须通过包含校验的参数名
const PATH_PARAM_KEYS: [&str; 3] = ["path", "src", "dst"];

/// 受应用白名单约束的动作
const LAUNCH_ACTION: &str = "start_application";

/// 单次执行结果状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolStatus {
    Success,
    /// 可恢复：规划器看到后可换一条路
    Error,
    /// 执行器内部缺陷或处理器 panic，不应重试
    Fatal,
}

/// 执行结果；result / error 互斥，仅由本模块构造
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    pub status: ToolStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ToolResult {
    pub(crate) fn success(result: Value) -> Self {
        Self {
            status: ToolStatus::Success,
            result: Some(result),
            error: None,
        }
    }

    pub(crate) fn error(msg: impl Into<String>) -> Self {
        Self {
            status: ToolStatus::Error,
            result: None,
            error: Some(msg.into()),
        }
    }

    pub(crate) fn fatal(msg: impl Into<String>) -> Self {
        Self {
            status: ToolStatus::Fatal,
            result: None,
            error: Some(msg.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == ToolStatus::Success
    }
}

/// 策略门 + 派发 + 超时 + 错误翻译
pub struct ExecutorCore {
    registry: ToolRegistry,
    policy: Policy,
    timeout: Duration,
}

impl ExecutorCore {
    pub fn new(registry: ToolRegistry, policy: Policy, timeout_secs: u64) -> Self {
        Self {
            registry,
            policy,
            timeout: Duration::from_secs(timeout_secs),
        }
    }

    pub fn policy(&self) -> &Policy {
        &self.policy
    }

    pub fn tool_descriptions(&self) -> Vec<(String, String)> {
        self.registry.tool_descriptions()
    }

    /// 执行一次 ToolCall；总是返回 ToolResult，从不向调用方抛错
    pub async fn execute(&self, call: &ToolCall) -> ToolResult {
        let started = Instant::now();
        let result = self.execute_inner(call).await;

        let outcome = match result.status {
            ToolStatus::Success => "success",
            ToolStatus::Error => "error",
            ToolStatus::Fatal => "fatal",
        };
        let audit = serde_json::json!({
            "action": call.action,
            "outcome": outcome,
            "duration_ms": started.elapsed().as_millis() as u64,
            "args_preview": args_preview(&call.parameters),
        });
        tracing::info!(audit = %audit, "tool");

        result
    }

    async fn execute_inner(&self, call: &ToolCall) -> ToolResult {
        let action = call.action.trim();
        if action.is_empty() {
            return ToolResult::error("missing action");
        }
        let Some(tool) = self.registry.get(action) else {
            return ToolResult::error(format!("unknown action: '{}'", action));
        };
        if let Err(e) = self.enforce_policy(action, tool.as_ref(), &call.parameters) {
            return ToolResult::error(e.to_string());
        }

        let args = Value::Object(call.parameters.clone());
        let mut handle = tokio::spawn({
            let tool = Arc::clone(&tool);
            async move { tool.execute(args).await }
        });

        let joined = match timeout(self.timeout, &mut handle).await {
            Ok(joined) => joined,
            Err(_) => {
                // 超时必须中止底层任务，不允许悬挂的半完成操作
                handle.abort();
                return ToolResult::error(
                    ToolError::Timeout(format!(
                        "'{}' exceeded {}s",
                        action,
                        self.timeout.as_secs()
                    ))
                    .to_string(),
                );
            }
        };

        match joined {
            Ok(Ok(value)) => ToolResult::success(value),
            Ok(Err(ToolError::Other(msg))) => {
                tracing::error!(action = %action, error = %msg, "unexpected tool failure");
                ToolResult::fatal(format!("executor internal error: {}", msg))
            }
            Ok(Err(err)) => ToolResult::error(err.to_string()),
            // 处理器 panic 经 JoinError 捕获，属缺陷而非用户可恢复错误
            Err(join_err) => {
                tracing::error!(action = %action, error = %join_err, "tool handler panicked");
                ToolResult::fatal(format!("executor internal error: {}", join_err))
            }
        }
    }

    /// 策略检查，严格先于任何处理器代码执行
    fn enforce_policy(
        &self,
        action: &str,
        tool: &dyn Tool,
        params: &Map<String, Value>,
    ) -> Result<(), ToolError> {
        // 禁用动作无条件拒绝，即使被错误注册
        if self.policy.is_forbidden(action) {
            return Err(ToolError::PermissionDenied(format!(
                "action '{}' is permanently disabled by policy",
                action
            )));
        }

        // 路径类参数必须落在沙箱根之内；非字符串值同样不通过
        for key in PATH_PARAM_KEYS {
            if let Some(value) = params.get(key) {
                let path = value.as_str().unwrap_or_default();
                if !self.policy.contains_path(path) {
                    let shown = value
                        .as_str()
                        .map(str::to_string)
                        .unwrap_or_else(|| value.to_string());
                    return Err(ToolError::PermissionDenied(format!(
                        "path '{}' is outside the allowed base directory '{}'",
                        shown,
                        self.policy.base_path().display()
                    )));
                }
            }
        }

        if action == LAUNCH_ACTION {
            let app_name = params
                .get("app_name")
                .and_then(Value::as_str)
                .unwrap_or_default();
            if app_name.trim().is_empty() {
                return Err(ToolError::BadArgumentValue(
                    "'start_application' requires a non-empty 'app_name'".to_string(),
                ));
            }
            if !self.policy.launch_allowed(app_name) {
                return Err(ToolError::PermissionDenied(format!(
                    "application '{}' is not on the whitelist",
                    app_name
                )));
            }
        }

        // 未声明的参数直接拒绝，等价于处理器签名不匹配
        let declared = tool.param_names();
        for key in params.keys() {
            if !declared.contains(&key.as_str()) {
                return Err(ToolError::BadArgumentType(format!(
                    "unexpected parameter '{}' for action '{}'",
                    key, action
                )));
            }
        }
        Ok(())
    }
}

/// 审计日志里的参数预览：截断长字符串，避免把文件内容整段落盘
fn args_preview(params: &Map<String, Value>) -> Value {
    const MAX_LEN: usize = 120;
    let preview: Map<String, Value> = params
        .iter()
        .map(|(k, v)| {
            let shown = match v {
                Value::String(s) if s.chars().count() > MAX_LEN => {
                    Value::String(format!("{}…", s.chars().take(MAX_LEN).collect::<String>()))
                }
                other => other.clone(),
            };
            (k.clone(), shown)
        })
        .collect();
    Value::Object(preview)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use crate::tools::{RespondTool, WaitTool};

    fn call(action: &str, params: Value) -> ToolCall {
        ToolCall {
            action: action.to_string(),
            parameters: params.as_object().cloned().unwrap_or_default(),
        }
    }

    struct CountingTool {
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Tool for CountingTool {
        fn name(&self) -> &str {
            "run_process"
        }
        fn description(&self) -> &str {
            "should never run"
        }
        fn param_names(&self) -> &[&str] {
            &["command"]
        }
        async fn execute(&self, _args: Value) -> Result<Value, ToolError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Value::Null)
        }
    }

    struct PanicTool;

    #[async_trait]
    impl Tool for PanicTool {
        fn name(&self) -> &str {
            "boom"
        }
        fn description(&self) -> &str {
            "panics"
        }
        fn param_names(&self) -> &[&str] {
            &[]
        }
        async fn execute(&self, _args: Value) -> Result<Value, ToolError> {
            panic!("handler bug");
        }
    }

    fn executor_with(registry: ToolRegistry, timeout_secs: u64) -> ExecutorCore {
        let policy = Policy::new(
            "/tmp",
            vec!["calc.exe".to_string()],
            ["run_process".to_string()],
            true,
        );
        ExecutorCore::new(registry, policy, timeout_secs)
    }

    #[tokio::test]
    async fn test_missing_action() {
        let executor = executor_with(ToolRegistry::new(), 5);
        let result = executor.execute(&call("", serde_json::json!({}))).await;
        assert_eq!(result.status, ToolStatus::Error);
        assert_eq!(result.error.as_deref(), Some("missing action"));
    }

    #[tokio::test]
    async fn test_unknown_action() {
        let executor = executor_with(ToolRegistry::new(), 5);
        let result = executor
            .execute(&call("launch_missiles", serde_json::json!({})))
            .await;
        assert_eq!(result.status, ToolStatus::Error);
        assert!(result.error.unwrap().contains("unknown action"));
    }

    #[tokio::test]
    async fn test_wait_success() {
        let mut registry = ToolRegistry::new();
        registry.register(WaitTool).unwrap();
        let executor = executor_with(registry, 5);
        let result = executor
            .execute(&call("wait", serde_json::json!({"seconds": 0.01})))
            .await;
        assert_eq!(result.status, ToolStatus::Success);
        assert_eq!(result.result, Some(serde_json::json!(0.01)));
    }

    #[tokio::test]
    async fn test_forbidden_action_never_dispatched() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut registry = ToolRegistry::new();
        registry
            .register(CountingTool {
                calls: Arc::clone(&calls),
            })
            .unwrap();
        let executor = executor_with(registry, 5);
        let result = executor
            .execute(&call("run_process", serde_json::json!({"command": "ls"})))
            .await;
        assert_eq!(result.status, ToolStatus::Error);
        assert!(result.error.unwrap().contains("PermissionDenied"));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_unexpected_parameter_rejected() {
        let mut registry = ToolRegistry::new();
        registry.register(WaitTool).unwrap();
        let executor = executor_with(registry, 5);
        let result = executor
            .execute(&call("wait", serde_json::json!({"seconds": 1, "loud": true})))
            .await;
        assert_eq!(result.status, ToolStatus::Error);
        assert!(result.error.unwrap().contains("BadArgumentType"));
    }

    #[tokio::test]
    async fn test_path_param_escape_blocked() {
        let mut registry = ToolRegistry::new();
        registry.register(RespondTool).unwrap();
        let executor = executor_with(registry, 5);
        // respond_me 本身不接受 path，但策略门在参数名校验之前就拦下越界路径
        let result = executor
            .execute(&call(
                "respond_me",
                serde_json::json!({"path": "/tmp/../etc/passwd"}),
            ))
            .await;
        assert_eq!(result.status, ToolStatus::Error);
        assert!(result.error.unwrap().contains("PermissionDenied"));
    }

    #[tokio::test]
    async fn test_launch_requires_app_name() {
        let mut registry = ToolRegistry::new();
        registry
            .register(crate::tools::StartApplicationTool::new("/tmp"))
            .unwrap();
        let executor = executor_with(registry, 5);
        let result = executor
            .execute(&call("start_application", serde_json::json!({})))
            .await;
        assert_eq!(result.status, ToolStatus::Error);
        assert!(result.error.unwrap().contains("BadArgumentValue"));
    }

    #[tokio::test]
    async fn test_launch_blocked_by_whitelist() {
        let mut registry = ToolRegistry::new();
        registry
            .register(crate::tools::StartApplicationTool::new("/tmp"))
            .unwrap();
        let executor = executor_with(registry, 5);
        let result = executor
            .execute(&call(
                "start_application",
                serde_json::json!({"app_name": "bash"}),
            ))
            .await;
        assert_eq!(result.status, ToolStatus::Error);
        assert!(result.error.unwrap().contains("not on the whitelist"));

        // 白名单内的 basename 通过策略门（真正 spawn 失败是处理器层面的 NotFound）
        let result = executor
            .execute(&call(
                "start_application",
                serde_json::json!({"app_name": "calc.exe"}),
            ))
            .await;
        let err = result.error.unwrap();
        assert!(!err.contains("whitelist"), "unexpected policy rejection: {}", err);
    }

    #[tokio::test]
    async fn test_timeout_maps_to_error() {
        let mut registry = ToolRegistry::new();
        registry.register(WaitTool).unwrap();
        let executor = executor_with(registry, 0);
        let result = executor
            .execute(&call("wait", serde_json::json!({"seconds": 5})))
            .await;
        assert_eq!(result.status, ToolStatus::Error);
        assert!(result.error.unwrap().contains("Timeout"));
    }

    #[tokio::test]
    async fn test_panic_maps_to_fatal() {
        let mut registry = ToolRegistry::new();
        registry.register(PanicTool).unwrap();
        let executor = executor_with(registry, 5);
        let result = executor.execute(&call("boom", serde_json::json!({}))).await;
        assert_eq!(result.status, ToolStatus::Fatal);
        assert!(result.error.unwrap().contains("executor internal error"));
    }
}
