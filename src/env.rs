//! 统一的环境变量管理系统
//!
//! 每个配置项对应一个实现了 [`EnvVar`] 的类型，负责变量名、说明和解析。
//! 变量未设置时返回 `None`，由配置文件或内置默认值兜底。

use std::env;
use std::fmt;

use crate::worker::CommitPolicy;

/// 所有变量共用的前缀
pub const PREFIX: &str = "NOTELINGO_";

/// 环境变量解析错误
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvError {
    pub variable: String,
    pub message: String,
}

impl EnvError {
    fn new(variable: &str, message: impl Into<String>) -> Self {
        Self {
            variable: variable.to_string(),
            message: message.into(),
        }
    }
}

impl fmt::Display for EnvError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Environment variable '{}': {}", self.variable, self.message)
    }
}

impl std::error::Error for EnvError {}

pub type EnvResult<T> = Result<T, EnvError>;

/// 环境变量访问器特性
pub trait EnvVar<T> {
    const NAME: &'static str;
    /// 文档中展示的默认值
    const DEFAULT: Option<&'static str>;
    const DESCRIPTION: &'static str;

    fn parse(value: &str) -> EnvResult<T>;

    /// 从进程环境读取
    fn get() -> EnvResult<Option<T>> {
        Self::lookup(|name| env::var(name).ok())
    }

    /// 从任意来源读取，便于测试时不触碰进程环境
    fn lookup<F>(source: F) -> EnvResult<Option<T>>
    where
        F: Fn(&str) -> Option<String>,
    {
        match source(Self::NAME) {
            Some(value) => Self::parse(&value).map(Some),
            None => Ok(None),
        }
    }

    fn get_or_default(default: T) -> T {
        match Self::get() {
            Ok(Some(value)) => value,
            _ => default,
        }
    }
}

/// 核心环境变量定义
pub mod core {
    use super::*;

    /// 应用运行模式
    pub struct Mode;
    impl EnvVar<String> for Mode {
        const NAME: &'static str = "NOTELINGO_MODE";
        const DEFAULT: Option<&'static str> = Some("production");
        const DESCRIPTION: &'static str = "Application mode: development, production";

        fn parse(value: &str) -> EnvResult<String> {
            match value.to_lowercase().as_str() {
                "development" | "dev" => Ok("development".to_string()),
                "production" | "prod" => Ok("production".to_string()),
                _ => Err(EnvError::new(
                    Self::NAME,
                    format!("Invalid mode '{}'. Use: development, production", value),
                )),
            }
        }
    }

    /// 日志级别
    pub struct LogLevel;
    impl EnvVar<String> for LogLevel {
        const NAME: &'static str = "NOTELINGO_LOG_LEVEL";
        const DEFAULT: Option<&'static str> = Some("info");
        const DESCRIPTION: &'static str = "Log level: trace, debug, info, warn, error";

        fn parse(value: &str) -> EnvResult<String> {
            match value.to_lowercase().as_str() {
                "trace" | "debug" | "info" | "warn" | "error" => Ok(value.to_lowercase()),
                _ => Err(EnvError::new(
                    Self::NAME,
                    format!(
                        "Invalid log level '{}'. Use: trace, debug, info, warn, error",
                        value
                    ),
                )),
            }
        }
    }

    /// 禁用颜色输出
    pub struct NoColor;
    impl EnvVar<bool> for NoColor {
        const NAME: &'static str = "NO_COLOR";
        const DEFAULT: Option<&'static str> = None;
        const DESCRIPTION: &'static str = "Disable colored output when set to any value";

        fn parse(value: &str) -> EnvResult<bool> {
            // NO_COLOR 遵循标准：任何非空值都表示禁用颜色
            Ok(!value.is_empty())
        }
    }
}

/// HTTP 服务相关环境变量
pub mod server {
    use super::*;

    /// 绑定地址
    pub struct BindAddress;
    impl EnvVar<String> for BindAddress {
        const NAME: &'static str = "NOTELINGO_BIND_ADDRESS";
        const DEFAULT: Option<&'static str> = Some("127.0.0.1");
        const DESCRIPTION: &'static str = "Address the HTTP server binds to";

        fn parse(value: &str) -> EnvResult<String> {
            let addr = value.trim();
            if addr.is_empty() {
                return Err(EnvError::new(Self::NAME, "Address cannot be empty"));
            }
            Ok(addr.to_string())
        }
    }

    /// 端口
    pub struct Port;
    impl EnvVar<u16> for Port {
        const NAME: &'static str = "NOTELINGO_PORT";
        const DEFAULT: Option<&'static str> = Some("8000");
        const DESCRIPTION: &'static str = "HTTP server port";

        fn parse(value: &str) -> EnvResult<u16> {
            match value.trim().parse::<u16>() {
                Ok(port) if port > 0 => Ok(port),
                _ => Err(EnvError::new(
                    Self::NAME,
                    "Must be a valid port number (1-65535)",
                )),
            }
        }
    }
}

/// 缓存相关环境变量
pub mod cache {
    use super::*;

    /// 缓存启用状态
    pub struct Enabled;
    impl EnvVar<bool> for Enabled {
        const NAME: &'static str = "NOTELINGO_CACHE_ENABLED";
        const DEFAULT: Option<&'static str> = Some("true");
        const DESCRIPTION: &'static str = "Enable the read-through note cache";

        fn parse(value: &str) -> EnvResult<bool> {
            parse_bool(value, Self::NAME)
        }
    }

    /// 缓存有效期（秒）
    pub struct TtlSecs;
    impl EnvVar<u64> for TtlSecs {
        const NAME: &'static str = "NOTELINGO_CACHE_TTL_SECS";
        const DEFAULT: Option<&'static str> = Some("300");
        const DESCRIPTION: &'static str = "Cache entry time-to-live in seconds";

        fn parse(value: &str) -> EnvResult<u64> {
            parse_ranged(value, Self::NAME, 1, 86_400)
        }
    }

    /// 缓存容量
    pub struct Capacity;
    impl EnvVar<usize> for Capacity {
        const NAME: &'static str = "NOTELINGO_CACHE_CAPACITY";
        const DEFAULT: Option<&'static str> = Some("10000");
        const DESCRIPTION: &'static str = "Maximum number of cached note snapshots";

        fn parse(value: &str) -> EnvResult<usize> {
            parse_ranged(value, Self::NAME, 1, 10_000_000)
        }
    }
}

/// 翻译工作池相关环境变量
pub mod worker {
    use super::*;

    /// 并发数
    pub struct Concurrency;
    impl EnvVar<usize> for Concurrency {
        const NAME: &'static str = "NOTELINGO_WORKER_CONCURRENCY";
        const DEFAULT: Option<&'static str> = Some("4");
        const DESCRIPTION: &'static str = "Number of translation jobs executed concurrently";

        fn parse(value: &str) -> EnvResult<usize> {
            parse_ranged(value, Self::NAME, 1, 256)
        }
    }

    /// 队列容量
    pub struct QueueCapacity;
    impl EnvVar<usize> for QueueCapacity {
        const NAME: &'static str = "NOTELINGO_QUEUE_CAPACITY";
        const DEFAULT: Option<&'static str> = Some("1024");
        const DESCRIPTION: &'static str = "Translation queue capacity; requests beyond it are rejected";

        fn parse(value: &str) -> EnvResult<usize> {
            parse_ranged(value, Self::NAME, 1, 1_000_000)
        }
    }

    /// 最大重试次数
    pub struct MaxRetries;
    impl EnvVar<u32> for MaxRetries {
        const NAME: &'static str = "NOTELINGO_MAX_RETRIES";
        const DEFAULT: Option<&'static str> = Some("0");
        const DESCRIPTION: &'static str = "Retries for transient translation failures (0 disables retry)";

        fn parse(value: &str) -> EnvResult<u32> {
            parse_ranged(value, Self::NAME, 0, 10)
        }
    }

    /// 重试基础延迟（毫秒）
    pub struct RetryBaseDelayMs;
    impl EnvVar<u64> for RetryBaseDelayMs {
        const NAME: &'static str = "NOTELINGO_RETRY_BASE_DELAY_MS";
        const DEFAULT: Option<&'static str> = Some("1000");
        const DESCRIPTION: &'static str = "Base delay for exponential retry backoff in milliseconds";

        fn parse(value: &str) -> EnvResult<u64> {
            parse_ranged(value, Self::NAME, 0, 600_000)
        }
    }

    /// 翻译超时（毫秒）
    pub struct TranslationTimeoutMs;
    impl EnvVar<u64> for TranslationTimeoutMs {
        const NAME: &'static str = "NOTELINGO_TRANSLATION_TIMEOUT_MS";
        const DEFAULT: Option<&'static str> = None;
        const DESCRIPTION: &'static str = "Deadline for one translation call in milliseconds (unset: no deadline)";

        fn parse(value: &str) -> EnvResult<u64> {
            parse_ranged(value, Self::NAME, 1, 86_400_000)
        }
    }

    /// 提交策略
    pub struct Commit;
    impl EnvVar<CommitPolicy> for Commit {
        const NAME: &'static str = "NOTELINGO_COMMIT_POLICY";
        const DEFAULT: Option<&'static str> = Some("last-write-wins");
        const DESCRIPTION: &'static str = "Concurrent translation policy: last-write-wins, latest-dispatch-only";

        fn parse(value: &str) -> EnvResult<CommitPolicy> {
            value
                .parse()
                .map_err(|e: crate::error::NoteError| EnvError::new(Self::NAME, e.to_string()))
        }
    }
}

/// 翻译服务相关环境变量
pub mod translator {
    use super::*;

    /// API URL
    pub struct ApiUrl;
    impl EnvVar<String> for ApiUrl {
        const NAME: &'static str = "NOTELINGO_TRANSLATOR_API_URL";
        const DEFAULT: Option<&'static str> = Some(crate::translator::DEFAULT_API_URL);
        const DESCRIPTION: &'static str = "Translation API endpoint";

        fn parse(value: &str) -> EnvResult<String> {
            let url = value.trim();
            if url.starts_with("http://") || url.starts_with("https://") {
                Ok(url.to_string())
            } else {
                Err(EnvError::new(
                    Self::NAME,
                    "URL must start with http:// or https://",
                ))
            }
        }
    }

    /// 请求超时（秒）
    pub struct RequestTimeoutSecs;
    impl EnvVar<u64> for RequestTimeoutSecs {
        const NAME: &'static str = "NOTELINGO_TRANSLATOR_TIMEOUT_SECS";
        const DEFAULT: Option<&'static str> = Some("60");
        const DESCRIPTION: &'static str = "HTTP timeout for translation API requests in seconds";

        fn parse(value: &str) -> EnvResult<u64> {
            parse_ranged(value, Self::NAME, 1, 3600)
        }
    }
}

/// 存储相关环境变量
pub mod storage {
    use super::*;

    /// 数据库文件路径
    pub struct Path;
    impl EnvVar<String> for Path {
        const NAME: &'static str = "NOTELINGO_STORAGE_PATH";
        const DEFAULT: Option<&'static str> = None;
        const DESCRIPTION: &'static str = "redb database file; notes are kept in memory when unset";

        fn parse(value: &str) -> EnvResult<String> {
            let path = value.trim();
            if path.is_empty() {
                return Err(EnvError::new(Self::NAME, "Path cannot be empty"));
            }
            Ok(shellexpand::tilde(path).into_owned())
        }
    }
}

fn parse_bool(value: &str, var_name: &str) -> EnvResult<bool> {
    match value.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" | "enabled" => Ok(true),
        "false" | "0" | "no" | "off" | "disabled" => Ok(false),
        _ => Err(EnvError::new(
            var_name,
            format!(
                "Invalid boolean value '{}'. Use: true/false, 1/0, yes/no, on/off",
                value
            ),
        )),
    }
}

fn parse_ranged<T>(value: &str, var_name: &str, min: T, max: T) -> EnvResult<T>
where
    T: std::str::FromStr + PartialOrd + fmt::Display + Copy,
{
    let num: T = value
        .trim()
        .parse()
        .map_err(|_| EnvError::new(var_name, "Must be a valid non-negative number"))?;

    if num < min {
        return Err(EnvError::new(
            var_name,
            format!("Value {} is below minimum {}", num, min),
        ));
    }
    if num > max {
        return Err(EnvError::new(
            var_name,
            format!("Value {} exceeds maximum {}", num, max),
        ));
    }
    Ok(num)
}

/// 环境变量配置汇总
///
/// 只记录实际设置了的变量，未设置的字段为 `None`。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnvConfig {
    // 核心配置
    pub mode: Option<String>,
    pub log_level: Option<String>,

    // 服务配置
    pub bind_address: Option<String>,
    pub port: Option<u16>,

    // 缓存配置
    pub cache_enabled: Option<bool>,
    pub cache_ttl_secs: Option<u64>,
    pub cache_capacity: Option<usize>,

    // 工作池配置
    pub worker_concurrency: Option<usize>,
    pub queue_capacity: Option<usize>,
    pub max_retries: Option<u32>,
    pub retry_base_delay_ms: Option<u64>,
    pub translation_timeout_ms: Option<u64>,
    pub commit_policy: Option<CommitPolicy>,

    // 翻译服务配置
    pub translator_api_url: Option<String>,
    pub translator_timeout_secs: Option<u64>,

    // 存储配置
    pub storage_path: Option<String>,
}

impl EnvConfig {
    /// 从进程环境加载
    pub fn from_env() -> EnvResult<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// 从任意来源加载，第一个解析失败的变量会作为错误返回
    pub fn from_lookup<F>(source: F) -> EnvResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        Ok(Self {
            mode: core::Mode::lookup(&source)?,
            log_level: core::LogLevel::lookup(&source)?,

            bind_address: server::BindAddress::lookup(&source)?,
            port: server::Port::lookup(&source)?,

            cache_enabled: cache::Enabled::lookup(&source)?,
            cache_ttl_secs: cache::TtlSecs::lookup(&source)?,
            cache_capacity: cache::Capacity::lookup(&source)?,

            worker_concurrency: worker::Concurrency::lookup(&source)?,
            queue_capacity: worker::QueueCapacity::lookup(&source)?,
            max_retries: worker::MaxRetries::lookup(&source)?,
            retry_base_delay_ms: worker::RetryBaseDelayMs::lookup(&source)?,
            translation_timeout_ms: worker::TranslationTimeoutMs::lookup(&source)?,
            commit_policy: worker::Commit::lookup(&source)?,

            translator_api_url: translator::ApiUrl::lookup(&source)?,
            translator_timeout_secs: translator::RequestTimeoutSecs::lookup(&source)?,

            storage_path: storage::Path::lookup(&source)?,
        })
    }
}

fn doc_line<V: EnvVar<T>, T>(docs: &mut String) {
    let default = V::DEFAULT.unwrap_or("(none)");
    docs.push_str(&format!(
        "- `{}`: {} (default: {})\n",
        V::NAME,
        V::DESCRIPTION,
        default
    ));
}

/// 环境变量文档生成器
pub fn generate_env_docs() -> String {
    let mut docs = String::new();
    docs.push_str("# Environment Variables\n\n");

    docs.push_str("## Core\n\n");
    doc_line::<core::Mode, String>(&mut docs);
    doc_line::<core::LogLevel, String>(&mut docs);
    doc_line::<core::NoColor, bool>(&mut docs);

    docs.push_str("\n## Server\n\n");
    doc_line::<server::BindAddress, String>(&mut docs);
    doc_line::<server::Port, u16>(&mut docs);

    docs.push_str("\n## Cache\n\n");
    doc_line::<cache::Enabled, bool>(&mut docs);
    doc_line::<cache::TtlSecs, u64>(&mut docs);
    doc_line::<cache::Capacity, usize>(&mut docs);

    docs.push_str("\n## Worker\n\n");
    doc_line::<worker::Concurrency, usize>(&mut docs);
    doc_line::<worker::QueueCapacity, usize>(&mut docs);
    doc_line::<worker::MaxRetries, u32>(&mut docs);
    doc_line::<worker::RetryBaseDelayMs, u64>(&mut docs);
    doc_line::<worker::TranslationTimeoutMs, u64>(&mut docs);
    doc_line::<worker::Commit, CommitPolicy>(&mut docs);

    docs.push_str("\n## Translator\n\n");
    doc_line::<translator::ApiUrl, String>(&mut docs);
    doc_line::<translator::RequestTimeoutSecs, u64>(&mut docs);

    docs.push_str("\n## Storage\n\n");
    doc_line::<storage::Path, String>(&mut docs);

    docs
}
