//! 应用配置
//!
//! 优先级从低到高：内置默认值、配置文件、`.env` 文件、`NOTELINGO_*` 环境变量。
//! 命令行参数由二进制程序在最后覆盖。

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::cache::{DEFAULT_CAPACITY, DEFAULT_TTL};
use crate::env::EnvConfig;
use crate::error::{helpers::config_error, NoteResult};
use crate::translator::TranslatorConfig;
use crate::worker::WorkerConfig;

/// 配置文件搜索路径，按顺序取第一个存在的文件
pub const CONFIG_PATHS: &[&str] = &[
    "notelingo.toml",
    "config/notelingo.toml",
    "~/.config/notelingo/config.toml",
    "/etc/notelingo/config.toml",
];

/// `.env` 文件搜索顺序，只加载第一个存在的文件
pub const ENV_FILES: &[&str] = &[".env.local", ".env.development", ".env.production", ".env"];

/// 重试次数上限
pub const MAX_RETRY_BUDGET: u32 = 10;

/// HTTP 服务配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1".to_string(),
            port: 8000,
        }
    }
}

/// 缓存配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,
    pub ttl_secs: u64,
    pub capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_secs: DEFAULT_TTL.as_secs(),
            capacity: DEFAULT_CAPACITY,
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

/// 存储配置，未设置路径时笔记只保存在内存中
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub path: Option<PathBuf>,
}

/// 完整应用配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub mode: String,
    pub log_level: String,
    pub server: ServerConfig,
    pub cache: CacheConfig,
    pub worker: WorkerConfig,
    pub translator: TranslatorConfig,
    pub storage: StorageConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            mode: "production".to_string(),
            log_level: "info".to_string(),
            server: ServerConfig::default(),
            cache: CacheConfig::default(),
            worker: WorkerConfig::default(),
            translator: TranslatorConfig::default(),
            storage: StorageConfig::default(),
        }
    }
}

impl AppConfig {
    /// 按优先级加载并验证配置
    ///
    /// `explicit` 为命令行指定的配置文件，指定时文件必须存在。
    pub fn load(explicit: Option<&Path>) -> NoteResult<Self> {
        Self::load_dotenv();

        let mut config = match explicit {
            Some(path) => {
                let expanded = shellexpand::tilde(&path.to_string_lossy()).into_owned();
                tracing::info!("加载配置文件: {}", expanded);
                Self::load_from_file(Path::new(&expanded))?
            }
            None => Self::search_config_file()?,
        };

        config.apply_env(&EnvConfig::from_env()?);
        config.validate()?;
        Ok(config)
    }

    fn search_config_file() -> NoteResult<Self> {
        for path in CONFIG_PATHS {
            let expanded = shellexpand::tilde(path);
            let candidate = Path::new(expanded.as_ref());
            if candidate.exists() {
                tracing::info!("加载配置文件: {}", expanded);
                return Self::load_from_file(candidate);
            }
        }

        tracing::info!("未找到配置文件，使用默认配置");
        Ok(Self::default())
    }

    /// 从指定文件加载，`.json` 按 JSON 解析，其余按 TOML 解析
    pub fn load_from_file(path: &Path) -> NoteResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            config_error(format!("读取配置文件 {} 失败: {}", path.display(), e))
        })?;

        let is_json = path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("json"))
            .unwrap_or(false);

        if is_json {
            serde_json::from_str(&content)
                .map_err(|e| config_error(format!("解析JSON配置失败: {}", e)))
        } else {
            toml::from_str(&content).map_err(|e| config_error(format!("解析TOML配置失败: {}", e)))
        }
    }

    fn load_dotenv() {
        for env_file in ENV_FILES {
            if Path::new(env_file).exists() && dotenv::from_filename(env_file).is_ok() {
                tracing::info!("已加载环境变量文件: {}", env_file);
                break;
            }
        }
    }

    /// 应用环境变量覆盖，只覆盖实际设置了的项
    pub fn apply_env(&mut self, env: &EnvConfig) {
        if let Some(ref mode) = env.mode {
            self.mode = mode.clone();
        }
        if let Some(ref level) = env.log_level {
            self.log_level = level.clone();
        }

        if let Some(ref addr) = env.bind_address {
            self.server.bind_address = addr.clone();
        }
        if let Some(port) = env.port {
            self.server.port = port;
        }

        if let Some(enabled) = env.cache_enabled {
            self.cache.enabled = enabled;
        }
        if let Some(ttl) = env.cache_ttl_secs {
            self.cache.ttl_secs = ttl;
        }
        if let Some(capacity) = env.cache_capacity {
            self.cache.capacity = capacity;
        }

        if let Some(concurrency) = env.worker_concurrency {
            self.worker.concurrency = concurrency;
        }
        if let Some(capacity) = env.queue_capacity {
            self.worker.queue_capacity = capacity;
        }
        if let Some(retries) = env.max_retries {
            self.worker.max_retries = retries;
        }
        if let Some(delay) = env.retry_base_delay_ms {
            self.worker.retry_base_delay_ms = delay;
        }
        if let Some(timeout) = env.translation_timeout_ms {
            self.worker.translation_timeout_ms = Some(timeout);
        }
        if let Some(policy) = env.commit_policy {
            self.worker.commit_policy = policy;
        }

        if let Some(ref url) = env.translator_api_url {
            self.translator.api_url = url.clone();
            tracing::info!("环境变量覆盖 API URL: {}", url);
        }
        if let Some(timeout) = env.translator_timeout_secs {
            self.translator.request_timeout_secs = timeout;
        }

        if let Some(ref path) = env.storage_path {
            self.storage.path = Some(PathBuf::from(path));
        }
    }

    /// 验证配置
    pub fn validate(&self) -> NoteResult<()> {
        if self.cache.ttl_secs == 0 {
            return Err(config_error("缓存有效期不能为0"));
        }
        if self.cache.capacity == 0 {
            return Err(config_error("缓存容量不能为0"));
        }
        if self.worker.concurrency == 0 {
            return Err(config_error("工作池并发数不能为0"));
        }
        if self.worker.queue_capacity == 0 {
            return Err(config_error("任务队列容量不能为0"));
        }
        if self.worker.max_retries > MAX_RETRY_BUDGET {
            return Err(config_error(format!(
                "重试次数不能超过 {}",
                MAX_RETRY_BUDGET
            )));
        }
        if self.worker.translation_timeout_ms == Some(0) {
            return Err(config_error("翻译超时必须大于0"));
        }

        let url = reqwest::Url::parse(&self.translator.api_url)
            .map_err(|e| config_error(format!("无效的翻译API地址 '{}': {}", self.translator.api_url, e)))?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(config_error(format!(
                "翻译API地址必须使用 http 或 https: {}",
                self.translator.api_url
            )));
        }

        self.socket_addr()?;
        Ok(())
    }

    /// 服务监听地址
    pub fn socket_addr(&self) -> NoteResult<SocketAddr> {
        let raw = format!("{}:{}", self.server.bind_address, self.server.port);
        raw.parse()
            .map_err(|e| config_error(format!("无效的监听地址 '{}': {}", raw, e)))
    }

    /// 以 TOML 格式输出配置
    pub fn to_toml_string(&self) -> NoteResult<String> {
        toml::to_string_pretty(self).map_err(|e| config_error(format!("序列化配置失败: {}", e)))
    }
}
