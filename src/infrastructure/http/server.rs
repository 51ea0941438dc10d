//! HTTP Server
//!
//! 路由挂载中间件后绑定监听地址，收到关闭信号后等待进行中的请求结束

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::DefaultBodyLimit;
use axum::middleware;
use axum::Router;
use http::header::{AUTHORIZATION, CONTENT_TYPE};
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::middleware::error_logging_middleware;
use super::routes::create_routes;
use super::state::AppState;
use crate::config::ServerConfig;

/// 请求体上限，预取请求会携带整章段落
const MAX_BODY_BYTES: usize = 16 * 1024 * 1024;

/// 播放器页面通常与服务不同源
fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers([AUTHORIZATION, CONTENT_TYPE])
        .expose_headers(Any)
        .max_age(Duration::from_secs(3600))
}

pub struct HttpServer {
    addr: String,
    state: Arc<AppState>,
}

impl HttpServer {
    pub fn new(config: &ServerConfig, state: AppState) -> Self {
        Self {
            addr: config.addr(),
            state: Arc::new(state),
        }
    }

    /// 完整 Router：路由 + 请求体上限 + 日志 + CORS
    pub fn router(&self) -> Router {
        create_routes()
            .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
            .layer(middleware::from_fn(error_logging_middleware))
            .layer(TraceLayer::new_for_http())
            .layer(cors_layer())
            .with_state(self.state.clone())
    }

    /// 启动服务器，`shutdown_signal` 完成后优雅关闭
    pub async fn run_with_shutdown<F>(self, shutdown_signal: F) -> Result<(), std::io::Error>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind(&self.addr).await?;
        tracing::info!(addr = %self.addr, "HTTP server listening");

        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown_signal)
            .await
    }
}
