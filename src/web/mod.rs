//! Web 服务器模块
//!
//! 把笔记服务暴露为 JSON HTTP 接口

pub mod handlers;
pub mod routes;
pub mod types;

pub use routes::create_routes;
pub use types::*;

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::error::{NoteError, NoteResult};

/// 创建带中间件的路由器
pub fn create_router(app_state: Arc<AppState>) -> Router {
    create_routes()
        .with_state(app_state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Web 服务器
pub struct WebServer {
    addr: SocketAddr,
    state: Arc<AppState>,
}

impl WebServer {
    pub fn new(addr: SocketAddr, state: Arc<AppState>) -> Self {
        Self { addr, state }
    }

    /// 启动 Web 服务器，`shutdown` 完成后停止接受新连接并等待在途请求结束
    pub async fn start_with_shutdown<F>(self, shutdown: F) -> NoteResult<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let listener = tokio::net::TcpListener::bind(self.addr)
            .await
            .map_err(|e| NoteError::Internal(format!("绑定地址 {} 失败: {}", self.addr, e)))?;

        tracing::info!("Web 服务启动: http://{}", self.addr);

        axum::serve(listener, create_router(self.state))
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|e| NoteError::Internal(format!("服务器错误: {}", e)))?;

        tracing::info!("Web 服务已停止");
        Ok(())
    }
}
