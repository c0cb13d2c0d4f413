//! Web 路由定义

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};

use crate::web::{handlers::*, types::AppState};

/// 创建 API 路由
pub fn create_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/notes", get(list_notes).post(create_note))
        .route(
            "/api/notes/:id",
            get(get_note)
                .put(replace_note)
                .patch(patch_note)
                .delete(delete_note),
        )
        .route("/api/notes/:id/translate", post(translate_note))
        .route("/api/stats", get(get_stats))
        .route("/health", get(health))
}
