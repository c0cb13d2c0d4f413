//! Web 模块的数据类型定义

use std::sync::Arc;

use axum::{http::StatusCode, response::Json};
use serde::{Deserialize, Serialize};

use crate::cache::CacheStats;
use crate::error::NoteError;
use crate::service::{NoteService, ServiceStatsSnapshot};
use crate::worker::{DeadLetter, DeadLetterQueue, WorkerStats, WorkerStatsSnapshot};

/// 应用状态
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<NoteService>,
    pub worker_stats: Arc<WorkerStats>,
    pub dead_letters: Arc<DeadLetterQueue>,
}

/// 处理器的错误返回类型
pub type ApiError = (StatusCode, Json<serde_json::Value>);

/// 把服务错误映射为 HTTP 状态码和 `{"error": ...}` 响应体
pub fn api_error(error: NoteError) -> ApiError {
    let status = match error {
        NoteError::NotFound(_) => StatusCode::NOT_FOUND,
        NoteError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
        NoteError::QueueUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };

    // 验证消息原样返回给客户端
    let message = match error {
        NoteError::InvalidArgument(msg) => msg,
        NoteError::NotFound(_) => "Not found.".to_string(),
        other => {
            crate::error::helpers::log_error(&other);
            other.to_string()
        }
    };

    (status, Json(serde_json::json!({ "error": message })))
}

/// 翻译请求
#[derive(Debug, Default, Deserialize)]
pub struct TranslateRequest {
    #[serde(default)]
    pub target_language: Option<String>,
}

/// 翻译已受理响应
#[derive(Debug, Serialize)]
pub struct TranslateAccepted {
    pub message: &'static str,
    pub job_id: u64,
}

/// 统计响应
#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub cache: CacheStats,
    pub cache_hit_rate: f64,
    pub service: ServiceStatsSnapshot,
    pub worker: WorkerStatsSnapshot,
    pub dead_letters: Vec<DeadLetter>,
}

/// 健康检查响应
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}
