//! Web 路由处理器
//!
//! 笔记服务是同步的（redb 写事务会落盘），所有服务调用都放到阻塞线程上执行。

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{rejection::JsonRejection, Json as ExtractJson, Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json},
};
use tokio::task;

use crate::error::{helpers::validation_error, NoteError, NoteResult};
use crate::model::{NewNote, Note, NoteChanges, NoteId};
use crate::service::NoteService;
use crate::web::types::{
    api_error, ApiError, AppState, HealthResponse, StatsResponse, TranslateAccepted,
    TranslateRequest,
};

/// 在阻塞线程上调用笔记服务
async fn with_service<T, F>(state: &AppState, call: F) -> Result<T, ApiError>
where
    F: FnOnce(&NoteService) -> NoteResult<T> + Send + 'static,
    T: Send + 'static,
{
    let service = Arc::clone(&state.service);
    task::spawn_blocking(move || call(&service))
        .await
        .map_err(|e| api_error(NoteError::Internal(format!("处理线程异常退出: {}", e))))?
        .map_err(api_error)
}

/// 请求体无法解析时按输入错误返回 400
fn json_body<T>(payload: Result<ExtractJson<T>, JsonRejection>) -> Result<T, ApiError> {
    payload
        .map(|ExtractJson(value)| value)
        .map_err(|rejection| api_error(validation_error(rejection.body_text())))
}

/// 列出全部笔记，按创建时间倒序
pub async fn list_notes(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Note>>, ApiError> {
    with_service(&state, |service| service.list())
        .await
        .map(Json)
}

/// 创建笔记
pub async fn create_note(
    State(state): State<Arc<AppState>>,
    payload: Result<ExtractJson<NewNote>, JsonRejection>,
) -> Result<(StatusCode, Json<Note>), ApiError> {
    let request = json_body(payload)?;
    let note = with_service(&state, move |service| service.create(request)).await?;
    Ok((StatusCode::CREATED, Json(note)))
}

/// 读取笔记
///
/// 直接返回缓存中的序列化快照，不再重新编码。
pub async fn get_note(
    State(state): State<Arc<AppState>>,
    Path(id): Path<NoteId>,
) -> Result<impl IntoResponse, ApiError> {
    let snapshot = with_service(&state, move |service| service.read(id)).await?;
    Ok((
        [(header::CONTENT_TYPE, "application/json")],
        snapshot.into_string(),
    ))
}

/// 整体更新笔记
pub async fn replace_note(
    State(state): State<Arc<AppState>>,
    Path(id): Path<NoteId>,
    payload: Result<ExtractJson<NewNote>, JsonRejection>,
) -> Result<Json<Note>, ApiError> {
    let request = json_body(payload)?;
    with_service(&state, move |service| {
        service.update(id, NoteChanges::from(request))
    })
    .await
    .map(Json)
}

/// 部分更新笔记
pub async fn patch_note(
    State(state): State<Arc<AppState>>,
    Path(id): Path<NoteId>,
    payload: Result<ExtractJson<NoteChanges>, JsonRejection>,
) -> Result<Json<Note>, ApiError> {
    let changes = json_body(payload)?;
    with_service(&state, move |service| service.update(id, changes))
        .await
        .map(Json)
}

/// 删除笔记
pub async fn delete_note(
    State(state): State<Arc<AppState>>,
    Path(id): Path<NoteId>,
) -> Result<StatusCode, ApiError> {
    with_service(&state, move |service| service.delete(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// 提交翻译任务
///
/// 请求体缺失或无法解析时按未提供目标语言处理。
pub async fn translate_note(
    State(state): State<Arc<AppState>>,
    Path(id): Path<NoteId>,
    body: Bytes,
) -> Result<(StatusCode, Json<TranslateAccepted>), ApiError> {
    let request: TranslateRequest = serde_json::from_slice(&body).unwrap_or_default();
    let target_language = request.target_language.unwrap_or_default();

    let job_id = with_service(&state, move |service| {
        service.request_translation(id, &target_language)
    })
    .await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(TranslateAccepted {
            message: "Translation task started.",
            job_id,
        }),
    ))
}

/// 统计信息
pub async fn get_stats(State(state): State<Arc<AppState>>) -> Json<StatsResponse> {
    let cache = state.service.cache().stats();
    Json(StatsResponse {
        cache_hit_rate: cache.hit_rate(),
        cache,
        service: state.service.stats().snapshot(),
        worker: state.worker_stats.snapshot(),
        dead_letters: state.dead_letters.snapshot(),
    })
}

/// 健康检查
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}
