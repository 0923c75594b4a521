// 配置管理模块

pub mod path_validator;

use crate::auth::constants::{
    API_PREFIX, DEFAULT_BASE_URL, DEFAULT_TIME_ZONE, LOGIN_PATH, USER_AGENT,
};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tokio::fs;

pub use path_validator::{PathValidationResult, PathValidator};

/// 默认配置文件路径
pub const DEFAULT_CONFIG_PATH: &str = "config/app.toml";

/// 下载目录名（各候选基础目录下统一使用）
pub const DOWNLOAD_FOLDER_NAME: &str = "KidsNote";

/// 应用配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// 接口配置
    #[serde(default)]
    pub api: ApiConfig,
    /// 下载配置
    #[serde(default)]
    pub download: DownloadConfig,
    /// 会话配置
    #[serde(default)]
    pub session: SessionConfig,
    /// 🔥 日志配置
    #[serde(default)]
    pub log: LogConfig,
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// 是否启用日志文件持久化
    #[serde(default = "default_log_enabled")]
    pub enabled: bool,
    /// 日志文件保存目录
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,
    /// 日志保留天数（默认 7 天）
    #[serde(default = "default_log_retention_days")]
    pub retention_days: u32,
    /// 日志级别（默认 info）
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_enabled() -> bool {
    true
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("logs")
}

fn default_log_retention_days() -> u32 {
    7
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            enabled: default_log_enabled(),
            log_dir: default_log_dir(),
            retention_days: default_log_retention_days(),
            level: default_log_level(),
        }
    }
}

/// 接口配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// 站点地址
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// 登录页路径
    #[serde(default = "default_login_path")]
    pub login_path: String,
    /// 接口前缀
    #[serde(default = "default_api_prefix")]
    pub api_prefix: String,
    /// User-Agent
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// 单次请求超时（秒）
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// 列表接口的 tz 参数
    #[serde(default = "default_time_zone")]
    pub time_zone: String,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}
fn default_login_path() -> String {
    LOGIN_PATH.to_string()
}
fn default_api_prefix() -> String {
    API_PREFIX.to_string()
}
fn default_user_agent() -> String {
    USER_AGENT.to_string()
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_time_zone() -> String {
    DEFAULT_TIME_ZONE.to_string()
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            login_path: default_login_path(),
            api_prefix: default_api_prefix(),
            user_agent: default_user_agent(),
            timeout_secs: default_timeout_secs(),
            time_zone: default_time_zone(),
        }
    }
}

impl ApiConfig {
    /// 指向另一个站点地址（测试或代理）
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }
}

/// 下载配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadConfig {
    /// 首选下载目录
    #[serde(default = "default_download_dir")]
    pub download_dir: PathBuf,
    /// 首选目录不可用时依次尝试的目录
    #[serde(default)]
    pub fallback_dirs: Vec<PathBuf>,
    /// 单个文件最大尝试次数
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// 重试间隔（秒）
    #[serde(default = "default_retry_delay_secs")]
    pub retry_delay_secs: u64,
    /// 相邻两个文件之间的间隔（毫秒）
    #[serde(default = "default_item_interval_ms")]
    pub item_interval_ms: u64,
    /// 下载时多久收不到数据算作卡住（秒），卡住的尝试按失败重试
    #[serde(default = "default_stall_timeout_secs")]
    pub stall_timeout_secs: u64,
    /// 每轮列表请求的批次基数（第 n 轮请求 page_size = 基数 * n）
    #[serde(default = "default_page_size_unit")]
    pub page_size_unit: u32,
    /// 最大列表请求轮数
    #[serde(default = "default_max_page_rounds")]
    pub max_page_rounds: u32,
}

fn default_download_dir() -> PathBuf {
    PathBuf::from("downloads").join(DOWNLOAD_FOLDER_NAME)
}
fn default_max_retries() -> u32 {
    5
}
fn default_retry_delay_secs() -> u64 {
    5
}
fn default_item_interval_ms() -> u64 {
    100
}
fn default_stall_timeout_secs() -> u64 {
    30
}
fn default_page_size_unit() -> u32 {
    9999
}
fn default_max_page_rounds() -> u32 {
    10
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            download_dir: default_download_dir(),
            fallback_dirs: Vec::new(),
            max_retries: default_max_retries(),
            retry_delay_secs: default_retry_delay_secs(),
            item_interval_ms: default_item_interval_ms(),
            stall_timeout_secs: default_stall_timeout_secs(),
            page_size_unit: default_page_size_unit(),
            max_page_rounds: default_max_page_rounds(),
        }
    }
}

impl DownloadConfig {
    /// 按优先级列出候选下载目录
    ///
    /// 顺序：配置目录 → 配置的备用目录 → 系统下载/图片/文档目录 → 临时目录
    pub fn candidate_dirs(&self) -> Vec<PathBuf> {
        let mut candidates = vec![self.download_dir.clone()];
        candidates.extend(self.fallback_dirs.iter().cloned());

        for base in [dirs::download_dir(), dirs::picture_dir(), dirs::document_dir()]
            .into_iter()
            .flatten()
        {
            candidates.push(base.join(DOWNLOAD_FOLDER_NAME));
        }
        candidates.push(std::env::temp_dir().join(DOWNLOAD_FOLDER_NAME));

        let mut seen = std::collections::HashSet::new();
        candidates.retain(|p| seen.insert(p.clone()));
        candidates
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs)
    }

    pub fn item_interval(&self) -> Duration {
        Duration::from_millis(self.item_interval_ms)
    }

    pub fn stall_timeout(&self) -> Duration {
        Duration::from_secs(self.stall_timeout_secs.max(1))
    }

    /// 校验数值配置
    pub fn validate(&self) -> Result<()> {
        if self.max_retries == 0 {
            anyhow::bail!("download.max_retries 必须大于 0");
        }
        if self.page_size_unit == 0 {
            anyhow::bail!("download.page_size_unit 必须大于 0");
        }
        if self.max_page_rounds == 0 {
            anyhow::bail!("download.max_page_rounds 必须大于 0");
        }
        Ok(())
    }
}

/// 会话配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// 会话文件路径
    #[serde(default = "default_session_file")]
    pub session_file: PathBuf,
}

fn default_session_file() -> PathBuf {
    PathBuf::from("config/session.json")
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            session_file: default_session_file(),
        }
    }
}

impl AppConfig {
    /// 从文件加载配置
    pub async fn load_from_file(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .context("Failed to read config file")?;

        let config: AppConfig = toml::from_str(&content).context("Failed to parse config file")?;

        config.validate().context("配置文件验证失败")?;

        Ok(config)
    }

    /// 校验配置
    pub fn validate(&self) -> Result<()> {
        reqwest::Url::parse(&self.api.base_url)
            .with_context(|| format!("api.base_url 不是合法地址: {}", self.api.base_url))?;
        self.download.validate()
    }

    /// 保存配置到文件
    pub async fn save_to_file(&self, path: &str) -> Result<()> {
        self.validate().context("保存配置失败")?;

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;

        // 确保父目录存在
        if let Some(parent) = std::path::Path::new(path).parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .await
                    .context("Failed to create config directory")?;
            }
        }

        fs::write(path, content)
            .await
            .context("Failed to write config file")?;

        tracing::info!("✓ 配置已保存: {}", path);

        Ok(())
    }

    /// 加载或创建默认配置
    pub async fn load_or_default(path: &str) -> Self {
        match Self::load_from_file(path).await {
            Ok(config) => {
                tracing::info!("配置文件加载成功: {}", path);
                config
            }
            Err(e) => {
                tracing::warn!("配置文件加载失败，使用默认配置: {:#}", e);
                let default_config = Self::default();

                // 首次启动：只在文件不存在时写出默认配置，避免覆盖用户写错的文件
                if !std::path::Path::new(path).exists() {
                    if let Err(e) = default_config.save_to_file(path).await {
                        tracing::error!("保存默认配置失败: {}", e);
                    }
                }

                default_config
            }
        }
    }
}
