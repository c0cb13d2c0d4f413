//! 日志初始化

use tracing_subscriber::EnvFilter;

use crate::error::{helpers::config_error, NoteResult};

/// 依赖库的默认日志级别，避免请求日志被淹没
const NOISY_CRATES: &str = ",hyper=warn,reqwest=warn,tower_http=info";

/// 初始化全局日志
///
/// `RUST_LOG` 优先，未设置时使用 `level`。重复初始化返回错误而不是 panic。
pub fn init_logging(level: &str, no_color: bool) -> NoteResult<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{}{}", level, NOISY_CRATES)));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_ansi(!no_color)
        .compact()
        .try_init()
        .map_err(|e| config_error(format!("初始化日志失败: {}", e)))
}
