//! 安全策略
//!
//! 纯谓词：路径包含校验（防 `..` 逃逸）与可执行白名单（仅比较 basename，大小写不敏感）。
//! Policy 在构造时固化，运行期只读；规划器产出的任何内容都无法修改它。
//! 已知缺口：白名单只看 basename，不解析二进制真实路径。

use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};

use crate::tools::ToolError;

/// 将用户/模型给出的路径解析为绝对规范路径：
/// 展开 `~`，相对路径拼到 `base` 上，词法消除 `.` 与 `..`（根之上的 `..` 停留在根）。
/// 不访问文件系统，不跟随符号链接。
pub fn resolve_path(path: &str, base: &Path) -> Result<PathBuf, ToolError> {
    if path.trim().is_empty() {
        return Err(ToolError::BadArgumentValue(
            "path must be a non-empty string".to_string(),
        ));
    }
    let expanded = expand_home(path);
    let joined = if expanded.is_absolute() {
        expanded
    } else {
        base.join(expanded)
    };
    Ok(normalize(&joined))
}

/// `path` 解析后是否落在 `base` 之内：双方归一化后，要求最长公共组件前缀
/// 恰好等于 `base`（按组件比较，不是字符串前缀）。任何解析失败都按不包含处理。
pub fn path_is_contained(path: &str, base: &Path) -> bool {
    let resolved = match resolve_path(path, base) {
        Ok(p) => p,
        Err(_) => return false,
    };
    components_prefix(&normalize(base), &resolved)
}

/// `app_name` 的 basename（大小写不敏感）是否在白名单中；空输入一律拒绝
pub fn executable_is_whitelisted(app_name: &str, whitelist: &[String]) -> bool {
    if app_name.trim().is_empty() {
        return false;
    }
    // 同时接受 / 与 \ 作为分隔符，保证两种平台写法行为一致
    let basename = app_name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(app_name)
        .to_lowercase();
    if basename.is_empty() {
        return false;
    }
    whitelist
        .iter()
        .any(|allowed| allowed.to_lowercase() == basename)
}

fn expand_home(path: &str) -> PathBuf {
    if path == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    }
    for prefix in ["~/", "~\\"] {
        if let Some(rest) = path.strip_prefix(prefix) {
            if let Some(home) = dirs::home_dir() {
                return home.join(rest);
            }
        }
    }
    PathBuf::from(path)
}

/// 词法归一化：丢弃 `.`，`..` 弹出最近的普通组件，根/盘符之上的 `..` 被丢弃
pub(crate) fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for comp in path.components() {
        match comp {
            Component::CurDir => {}
            Component::ParentDir => {
                let popped = matches!(
                    out.components().next_back(),
                    Some(Component::Normal(_))
                );
                if popped {
                    out.pop();
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// `base` 的全部组件是否是 `path` 组件序列的前缀
fn components_prefix(base: &Path, path: &Path) -> bool {
    let mut path_comps = path.components();
    for base_comp in base.components() {
        match path_comps.next() {
            Some(comp) if comp == base_comp => {}
            _ => return false,
        }
    }
    true
}

/// 不可变安全策略：构造一次，随处共享
#[derive(Debug, Clone)]
pub struct Policy {
    base_path: PathBuf,
    app_whitelist: Vec<String>,
    forbidden_actions: HashSet<String>,
    enforce_app_whitelist: bool,
}

impl Policy {
    pub fn new(
        base_path: impl AsRef<Path>,
        app_whitelist: Vec<String>,
        forbidden_actions: impl IntoIterator<Item = String>,
        enforce_app_whitelist: bool,
    ) -> Self {
        let base = base_path.as_ref();
        // 沙箱根优先用真实路径；目录不存在时退回词法归一化
        let base_path = base
            .canonicalize()
            .unwrap_or_else(|_| normalize(&absolutize(base)));
        Self {
            base_path,
            app_whitelist,
            forbidden_actions: forbidden_actions.into_iter().collect(),
            enforce_app_whitelist,
        }
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// 动作是否被永久禁用（独立于注册表，即使错误注册也拒绝）
    pub fn is_forbidden(&self, action: &str) -> bool {
        self.forbidden_actions.contains(action)
    }

    pub fn contains_path(&self, path: &str) -> bool {
        path_is_contained(path, &self.base_path)
    }

    /// 是否允许启动该应用；未开启白名单强制时放行
    pub fn launch_allowed(&self, app_name: &str) -> bool {
        !self.enforce_app_whitelist
            || executable_is_whitelisted(app_name, &self.app_whitelist)
    }
}

fn absolutize(path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    }
}
