//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `MENTOR__*` 覆盖（双下划线表示嵌套，如 `MENTOR__LLM__PROVIDER=groq`）。

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    #[serde(default)]
    pub app: AppSection,
    #[serde(default)]
    pub store: StoreSection,
    #[serde(default)]
    pub session: SessionSection,
    #[serde(default)]
    pub llm: LlmSection,
    #[serde(default)]
    pub documents: DocumentsSection,
}

/// [app] 段
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppSection {
    pub name: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackendKind {
    Memory,
    #[default]
    File,
    Sqlite,
}

/// [store] 段：后端与路径（file 为目录，sqlite 为数据库文件）
#[derive(Debug, Clone, Deserialize)]
pub struct StoreSection {
    #[serde(default)]
    pub backend: StoreBackendKind,
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
}

impl Default for StoreSection {
    fn default() -> Self {
        Self {
            backend: StoreBackendKind::default(),
            path: default_store_path(),
        }
    }
}

fn default_store_path() -> PathBuf {
    PathBuf::from("data/memory")
}

/// 回复来源：固定转移表文案，或交给语言模型生成
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReplyMode {
    #[default]
    Fixed,
    Generated,
}

/// [session] 段：上下文窗口、回复模式、生成超时与兜底文案
#[derive(Debug, Clone, Deserialize)]
pub struct SessionSection {
    #[serde(default = "default_window")]
    pub history_window: usize,
    #[serde(default = "default_window")]
    pub task_window: usize,
    #[serde(default)]
    pub reply_mode: ReplyMode,
    #[serde(default = "default_reply_timeout_secs")]
    pub reply_timeout_secs: u64,
    /// 超时或失败后的额外重试次数（仍受同一个总超时约束）
    #[serde(default = "default_reply_retries")]
    pub reply_retries: u32,
    #[serde(default = "default_fallback_reply")]
    pub fallback_reply: String,
}

impl Default for SessionSection {
    fn default() -> Self {
        Self {
            history_window: default_window(),
            task_window: default_window(),
            reply_mode: ReplyMode::default(),
            reply_timeout_secs: default_reply_timeout_secs(),
            reply_retries: default_reply_retries(),
            fallback_reply: default_fallback_reply(),
        }
    }
}

impl SessionSection {
    pub fn reply_timeout(&self) -> Duration {
        Duration::from_secs(self.reply_timeout_secs)
    }
}

fn default_window() -> usize {
    3
}

fn default_reply_timeout_secs() -> u64 {
    30
}

fn default_reply_retries() -> u32 {
    1
}

pub(crate) fn default_fallback_reply() -> String {
    "No reply generated".to_string()
}

/// [llm] 段：后端选择；API Key 只从环境变量读取
#[derive(Debug, Clone, Deserialize)]
pub struct LlmSection {
    /// groq / openai / mock
    #[serde(default = "default_provider")]
    pub provider: String,
    pub model: Option<String>,
    pub base_url: Option<String>,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            base_url: None,
        }
    }
}

fn default_provider() -> String {
    "groq".to_string()
}

/// [documents] 段
#[derive(Debug, Clone, Deserialize)]
pub struct DocumentsSection {
    /// 上传回执中内容摘要的字符数
    #[serde(default = "default_snippet_chars")]
    pub snippet_chars: usize,
}

impl Default for DocumentsSection {
    fn default() -> Self {
        Self {
            snippet_chars: default_snippet_chars(),
        }
    }
}

fn default_snippet_chars() -> usize {
    300
}

/// 从 config 目录加载配置，环境变量 MENTOR__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 MENTOR__*（双下划线表示嵌套键）
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
        config::Environment::with_prefix("MENTOR")
            .separator("__")
            .try_parsing(true),
    );

    let c = builder.build()?;
    c.try_deserialize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.session.history_window, 3);
        assert_eq!(cfg.session.task_window, 3);
        assert_eq!(cfg.session.reply_mode, ReplyMode::Fixed);
        assert_eq!(cfg.session.fallback_reply, "No reply generated");
        assert_eq!(cfg.store.backend, StoreBackendKind::File);
        assert_eq!(cfg.llm.provider, "groq");
        assert_eq!(cfg.documents.snippet_chars, 300);
    }

    #[test]
    fn test_shipped_default_file_uses_fixed_replies() {
        let path = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("config/default.toml");
        let cfg: AppConfig = config::Config::builder()
            .add_source(config::File::from(path))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();
        assert_eq!(cfg.session.reply_mode, ReplyMode::Fixed);
        assert_eq!(cfg.store.backend, StoreBackendKind::File);
    }

    #[test]
    fn test_explicit_file_overrides() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("mentor.toml");
        std::fs::write(
            &path,
            r#"
[store]
backend = "sqlite"
path = "data/mentor.db"

[session]
reply_mode = "generated"
reply_timeout_secs = 5
"#,
        )
        .unwrap();

        let cfg = load_config(Some(path)).unwrap();
        assert_eq!(cfg.store.backend, StoreBackendKind::Sqlite);
        assert_eq!(cfg.session.reply_mode, ReplyMode::Generated);
        assert_eq!(cfg.session.reply_timeout(), Duration::from_secs(5));
        assert_eq!(cfg.session.history_window, 3);
    }
}
