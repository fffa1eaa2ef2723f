//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `MANTIS__*` 覆盖
//! （双下划线表示嵌套，如 `MANTIS__AGENT__MAX_STEPS=20`）。

use std::path::PathBuf;

use serde::Deserialize;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    #[serde(default)]
    pub agent: AgentSection,
    #[serde(default)]
    pub llm: LlmSection,
    #[serde(default)]
    pub tools: ToolsSection,
    #[serde(default)]
    pub policy: PolicySection,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            agent: AgentSection::default(),
            llm: LlmSection::default(),
            tools: ToolsSection::default(),
            policy: PolicySection::default(),
        }
    }
}

impl AppConfig {
    /// 沙箱根目录：配置优先，否则用户家目录，最后退回 ./workspace
    pub fn agent_base_path(&self) -> PathBuf {
        self.agent
            .base_path
            .clone()
            .or_else(dirs::home_dir)
            .unwrap_or_else(|| PathBuf::from("workspace"))
    }
}

/// [agent] 段：应用名、沙箱根、循环守卫
#[derive(Debug, Clone, Deserialize)]
pub struct AgentSection {
    pub name: Option<String>,
    /// 沙箱根目录，未设置时用用户家目录
    pub base_path: Option<PathBuf>,
    /// 单次运行允许的最大 ReAct 步数
    #[serde(default = "default_max_steps")]
    pub max_steps: usize,
}

impl Default for AgentSection {
    fn default() -> Self {
        Self {
            name: None,
            base_path: None,
            max_steps: default_max_steps(),
        }
    }
}

fn default_max_steps() -> usize {
    50
}

/// [llm] 段：后端选择
#[derive(Debug, Clone, Deserialize)]
pub struct LlmSection {
    /// 后端：openai（兼容端点）/ mock
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_model")]
    pub model: String,
    pub base_url: Option<String>,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            base_url: None,
        }
    }
}

fn default_provider() -> String {
    "openai".to_string()
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

/// [tools] 段：单次工具调用超时
#[derive(Debug, Clone, Deserialize)]
pub struct ToolsSection {
    #[serde(default = "default_tool_timeout_secs")]
    pub tool_timeout_secs: u64,
}

impl Default for ToolsSection {
    fn default() -> Self {
        Self {
            tool_timeout_secs: default_tool_timeout_secs(),
        }
    }
}

fn default_tool_timeout_secs() -> u64 {
    30
}

/// [policy] 段：应用白名单与禁用动作
#[derive(Debug, Clone, Deserialize)]
pub struct PolicySection {
    /// 允许 start_application 启动的可执行文件（仅比较 basename，大小写不敏感）
    #[serde(default = "default_app_whitelist")]
    pub app_whitelist: Vec<String>,
    #[serde(default = "default_true")]
    pub enforce_app_whitelist: bool,
    /// 永久禁用的动作，即使注册了处理器也拒绝
    #[serde(default = "default_forbidden_actions")]
    pub forbidden_actions: Vec<String>,
}

impl Default for PolicySection {
    fn default() -> Self {
        Self {
            app_whitelist: default_app_whitelist(),
            enforce_app_whitelist: true,
            forbidden_actions: default_forbidden_actions(),
        }
    }
}

fn default_app_whitelist() -> Vec<String> {
    vec![
        "notepad.exe".into(),
        "calc.exe".into(),
        "mspaint.exe".into(),
        "spotify.exe".into(),
    ]
}

fn default_true() -> bool {
    true
}

fn default_forbidden_actions() -> Vec<String> {
    vec!["run_process".into()]
}

/// 从 config 目录加载配置，环境变量 MANTIS__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 MANTIS__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("MANTIS")
            .separator("__")
            .try_parsing(true),
    );

    let c = builder.build()?;
    c.try_deserialize()
}
