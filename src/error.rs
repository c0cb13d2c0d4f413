//! 统一错误处理
//!
//! 提供结构化错误类型和错误处理机制

use std::fmt;

use thiserror::Error;

use crate::env::EnvError;

/// 笔记服务错误类型
#[derive(Error, Debug, Clone, PartialEq)]
pub enum NoteError {
    /// 笔记不存在
    #[error("笔记不存在: {0}")]
    NotFound(u64),

    /// 输入验证错误
    #[error("输入无效: {0}")]
    InvalidArgument(String),

    /// 外部翻译函数失败（只在任务层面出现，不会返回给请求方）
    #[error("翻译失败: {0}")]
    TranslationFailed(String),

    /// 任务队列已满或已关闭
    #[error("任务队列不可用: {0}")]
    QueueUnavailable(String),

    /// 存储错误
    #[error("存储错误: {0}")]
    Storage(String),

    /// 序列化错误
    #[error("序列化错误: {0}")]
    Serialization(String),

    /// 配置错误
    #[error("配置错误: {0}")]
    Config(String),

    /// 超时错误
    #[error("操作超时: {0}")]
    Timeout(String),

    /// 内部错误
    #[error("内部错误: {0}")]
    Internal(String),
}

impl NoteError {
    /// 检查错误是否可重试
    pub fn is_retryable(&self) -> bool {
        match self {
            NoteError::TranslationFailed(_) => true,
            NoteError::Timeout(_) => true,
            NoteError::QueueUnavailable(_) => true,
            NoteError::Storage(_) => true,
            NoteError::NotFound(_) => false,
            NoteError::InvalidArgument(_) => false,
            NoteError::Serialization(_) => false,
            NoteError::Config(_) => false,
            NoteError::Internal(_) => false,
        }
    }

    /// 获取错误的严重程度
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            NoteError::NotFound(_) => ErrorSeverity::Info,
            NoteError::InvalidArgument(_) => ErrorSeverity::Info,
            NoteError::TranslationFailed(_) => ErrorSeverity::Error,
            NoteError::QueueUnavailable(_) => ErrorSeverity::Warning,
            NoteError::Storage(_) => ErrorSeverity::Error,
            NoteError::Serialization(_) => ErrorSeverity::Error,
            NoteError::Config(_) => ErrorSeverity::Critical,
            NoteError::Timeout(_) => ErrorSeverity::Warning,
            NoteError::Internal(_) => ErrorSeverity::Critical,
        }
    }
}

/// 错误严重程度
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ErrorSeverity {
    Info,
    Warning,
    Error,
    Critical,
}

impl From<std::io::Error> for NoteError {
    fn from(error: std::io::Error) -> Self {
        NoteError::Storage(format!("IO错误: {}", error))
    }
}

impl From<serde_json::Error> for NoteError {
    fn from(error: serde_json::Error) -> Self {
        NoteError::Serialization(format!("JSON序列化错误: {}", error))
    }
}

impl From<toml::de::Error> for NoteError {
    fn from(error: toml::de::Error) -> Self {
        NoteError::Config(format!("TOML解析错误: {}", error))
    }
}

impl From<redb::Error> for NoteError {
    fn from(error: redb::Error) -> Self {
        NoteError::Storage(format!("redb错误: {}", error))
    }
}

impl From<reqwest::Error> for NoteError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            NoteError::Timeout(format!("翻译API请求超时: {}", error))
        } else {
            NoteError::TranslationFailed(format!("翻译API请求失败: {}", error))
        }
    }
}

impl From<tokio::time::error::Elapsed> for NoteError {
    fn from(error: tokio::time::error::Elapsed) -> Self {
        NoteError::Timeout(format!("异步操作超时: {}", error))
    }
}

impl From<EnvError> for NoteError {
    fn from(error: EnvError) -> Self {
        NoteError::Config(error.to_string())
    }
}

/// 错误结果类型别名
pub type NoteResult<T> = Result<T, NoteError>;

/// 错误处理助手函数
pub mod helpers {
    use super::*;

    /// 按严重程度记录错误
    pub fn log_error(error: &NoteError) {
        match error.severity() {
            ErrorSeverity::Info => tracing::info!("{}", error),
            ErrorSeverity::Warning => tracing::warn!("{}", error),
            ErrorSeverity::Error => tracing::error!("{}", error),
            ErrorSeverity::Critical => tracing::error!("严重错误: {}", error),
        }
    }

    /// 创建输入验证错误
    pub fn validation_error<T: fmt::Display>(msg: T) -> NoteError {
        NoteError::InvalidArgument(msg.to_string())
    }

    /// 创建配置错误
    pub fn config_error<T: fmt::Display>(msg: T) -> NoteError {
        NoteError::Config(msg.to_string())
    }
}
