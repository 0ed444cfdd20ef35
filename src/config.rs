//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `HIVE__*` 覆盖（双下划线表示嵌套，如 `HIVE__LLM__PROVIDER=openai`）。

use std::path::PathBuf;

use serde::Deserialize;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    #[serde(default)]
    pub app: AppSection,
    #[serde(default)]
    pub llm: LlmSection,
    #[serde(default)]
    pub workers: WorkersSection,
    #[serde(default)]
    pub escalation: EscalationSection,
    #[serde(default)]
    pub knowledge: KnowledgeSection,
}

/// [app] 段：工作目录与数据目录
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppSection {
    /// Worker 沙箱根目录，未设置时用 ./workspace
    pub workspace_root: Option<PathBuf>,
    /// 会话日志与知识库存放目录，未设置时用 ./.hive
    pub data_dir: Option<PathBuf>,
}

impl AppSection {
    pub fn workspace_root(&self) -> PathBuf {
        self.workspace_root
            .clone()
            .unwrap_or_else(|| PathBuf::from("workspace"))
    }

    pub fn data_dir(&self) -> PathBuf {
        self.data_dir.clone().unwrap_or_else(|| PathBuf::from(".hive"))
    }
}

/// [llm] 段：后端选择与超时
#[derive(Debug, Clone, Deserialize)]
pub struct LlmSection {
    /// 后端：openai / deepseek / mock
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_model")]
    pub model: String,
    pub base_url: Option<String>,
    /// 单次 LLM 请求超时（秒）
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            base_url: None,
            request_timeout_secs: default_request_timeout(),
        }
    }
}

fn default_provider() -> String {
    "deepseek".to_string()
}

fn default_model() -> String {
    "deepseek-chat".to_string()
}

fn default_request_timeout() -> u64 {
    60
}

/// [workers] 段：单步执行超时与 Shell 白名单
#[derive(Debug, Clone, Deserialize)]
pub struct WorkersSection {
    /// 单个步骤的执行超时（秒），超时按 FAILURE 处理
    #[serde(default = "default_worker_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub shell: ShellSection,
}

impl Default for WorkersSection {
    fn default() -> Self {
        Self {
            timeout_secs: default_worker_timeout_secs(),
            shell: ShellSection::default(),
        }
    }
}

fn default_worker_timeout_secs() -> u64 {
    180
}

/// [workers.shell] 段：允许执行的命令名（仅首词）与命令超时
#[derive(Debug, Clone, Deserialize)]
pub struct ShellSection {
    #[serde(default = "default_allowed_commands")]
    pub allowed_commands: Vec<String>,
    #[serde(default = "default_shell_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ShellSection {
    fn default() -> Self {
        Self {
            allowed_commands: default_allowed_commands(),
            timeout_secs: default_shell_timeout_secs(),
        }
    }
}

fn default_allowed_commands() -> Vec<String> {
    [
        "ls", "cat", "head", "tail", "wc", "grep", "find", "echo", "mkdir", "touch", "python3",
        "cargo", "rustc",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_shell_timeout_secs() -> u64 {
    60
}

/// [escalation] 段：升级求助的后端与超时
#[derive(Debug, Clone, Deserialize)]
pub struct EscalationSection {
    /// command（外部 CLI）/ llm（独立模型）/ none（不升级，直接记录失败）
    #[serde(default = "default_escalation_provider")]
    pub provider: String,
    /// provider = command 时执行的命令，问题文本经 stdin 传入
    #[serde(default = "default_escalation_command")]
    pub command: Vec<String>,
    /// provider = llm 时使用的模型，未设置则沿用 [llm].model
    pub model: Option<String>,
    #[serde(default = "default_escalation_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EscalationSection {
    fn default() -> Self {
        Self {
            provider: default_escalation_provider(),
            command: default_escalation_command(),
            model: None,
            timeout_secs: default_escalation_timeout_secs(),
        }
    }
}

fn default_escalation_provider() -> String {
    "command".to_string()
}

fn default_escalation_command() -> Vec<String> {
    vec!["gemini".into(), "ask".into(), "--stdin".into()]
}

fn default_escalation_timeout_secs() -> u64 {
    120
}

/// [knowledge] 段：共享知识库命名空间与规划时注入的教训条数
#[derive(Debug, Clone, Deserialize)]
pub struct KnowledgeSection {
    #[serde(default = "default_namespace")]
    pub namespace: String,
    #[serde(default = "default_lesson_hints")]
    pub lesson_hints: usize,
}

impl Default for KnowledgeSection {
    fn default() -> Self {
        Self {
            namespace: default_namespace(),
            lesson_hints: default_lesson_hints(),
        }
    }
}

fn default_namespace() -> String {
    "codex".to_string()
}

fn default_lesson_hints() -> usize {
    3
}

/// 从 config 目录加载配置，环境变量 HIVE__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 HIVE__*（双下划线表示嵌套键）
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
        } else {
            tracing::warn!(path = %path.display(), "config file not found, ignored");
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("HIVE")
            .separator("__")
            .try_parsing(true)
            .list_separator(" ")
            .with_list_parse_key("escalation.command")
            .with_list_parse_key("workers.shell.allowed_commands"),
    );

    let c = builder.build()?;
    c.try_deserialize()
}
