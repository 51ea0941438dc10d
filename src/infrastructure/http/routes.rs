//! HTTP Routes
//!
//! API Endpoints:
//! - /api/ping                  GET   健康检查
//! - /api/tts/speak             POST  单段合成
//! - /api/tts/audio/{fp}        GET   按指纹获取音频
//! - /api/tts/voices            GET   可用音色（?lang=）
//! - /api/tts/prefetch          POST  预热显式区间
//! - /api/tts/position          POST  播放位置变化
//! - /api/tts/download          POST  生成单章音频文件
//! - /api/tts/download/{file}   GET   下载单章音频文件
//! - /api/cache/stats           GET   缓存统计
//! - /api/cache/clear           POST  清空缓存
//! - /api/cache/positions       POST  某章已缓存的段落
//! - /api/job/create            POST  创建或续传整书任务
//! - /api/job/list              GET   任务列表
//! - /api/job/get               POST  任务详情
//! - /api/job/delete            POST  删除（取消）任务
//! - /api/job/download/{id}     GET   下载任务结果

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use super::handlers;
use super::state::AppState;

/// 创建所有路由
pub fn create_routes() -> Router<Arc<AppState>> {
    Router::new().nest("/api", api_routes())
}

/// API 路由
fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/ping", get(handlers::ping))
        .nest("/tts", tts_routes())
        .nest("/cache", cache_routes())
        .nest("/job", job_routes())
}

/// TTS 路由
fn tts_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/speak", post(handlers::speak))
        .route("/audio/:fingerprint", get(handlers::get_artifact_audio))
        .route("/voices", get(handlers::list_voices))
        .route("/prefetch", post(handlers::prefetch))
        .route("/position", post(handlers::position_changed))
        .route("/download", post(handlers::download_chapter))
        .route("/download/:filename", get(handlers::get_chapter_download))
}

/// Cache 路由
fn cache_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/stats", get(handlers::cache_stats))
        .route("/clear", post(handlers::clear_cache))
        .route("/positions", post(handlers::cached_positions))
}

/// Job 路由
fn job_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/create", post(handlers::create_job))
        .route("/list", get(handlers::list_jobs))
        .route("/get", post(handlers::get_job))
        .route("/delete", post(handlers::delete_job))
        .route("/download/:id", get(handlers::download_job))
}
