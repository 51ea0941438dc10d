//! Cache HTTP Handlers

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::application::{ClearCacheCommand, GetCacheStatsQuery, ListCachedPositionsQuery};
use crate::infrastructure::http::dto::{ApiResponse, VoiceParams};
use crate::infrastructure::http::error::ApiError;
use crate::infrastructure::http::state::AppState;

#[derive(Debug, Serialize)]
pub struct CacheStatsResponse {
    pub total_entries: usize,
    pub total_size_bytes: u64,
    pub hit_count: u64,
    pub miss_count: u64,
}

#[derive(Debug, Serialize)]
pub struct ClearCacheResponseDto {
    pub removed: usize,
}

#[derive(Debug, Deserialize)]
pub struct CachedPositionsRequest {
    pub book_id: String,
    pub chapter_ref: String,
    #[serde(flatten)]
    pub params: VoiceParams,
}

#[derive(Debug, Serialize)]
pub struct CachedPositionDto {
    pub paragraph_index: u32,
    pub fingerprint: String,
    pub audio_url: String,
}

pub async fn cache_stats(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<CacheStatsResponse>>, ApiError> {
    let stats = state.cache_stats_handler.handle(GetCacheStatsQuery).await?;
    Ok(Json(ApiResponse::success(CacheStatsResponse {
        total_entries: stats.total_entries,
        total_size_bytes: stats.total_size_bytes,
        hit_count: stats.hit_count,
        miss_count: stats.miss_count,
    })))
}

pub async fn clear_cache(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<ClearCacheResponseDto>>, ApiError> {
    let result = state.clear_cache_handler.handle(ClearCacheCommand).await?;
    Ok(Json(ApiResponse::success(ClearCacheResponseDto {
        removed: result.removed,
    })))
}

/// 某章节中已缓存的段落，供播放器跳过等待
pub async fn cached_positions(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CachedPositionsRequest>,
) -> Result<Json<ApiResponse<Vec<CachedPositionDto>>>, ApiError> {
    let query = ListCachedPositionsQuery {
        book_id: req.book_id,
        chapter_ref: req.chapter_ref,
        params: req.params.into(),
    };

    let positions = state
        .cached_positions_handler
        .handle(query)
        .await?
        .into_iter()
        .map(|p| CachedPositionDto {
            paragraph_index: p.paragraph_index,
            audio_url: format!("/api/tts/audio/{}", p.fingerprint),
            fingerprint: p.fingerprint,
        })
        .collect();

    Ok(Json(ApiResponse::success(positions)))
}
