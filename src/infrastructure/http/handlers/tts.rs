//! TTS HTTP Handlers - 交互式合成与预取

use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::Response,
    Json,
};
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio_util::io::ReaderStream;

use super::job::content_disposition;
use crate::application::{
    DownloadChapterCommand, GetArtifactAudioQuery, GetChapterDownloadQuery, ListVoicesQuery,
    PositionChangedCommand, PrefetchCommand, PrefetchResponse, SpeakCommand, VoiceInfo,
};
use crate::domain::speech::WordTiming;
use crate::infrastructure::adapters::storage::sanitize_filename;
use crate::infrastructure::http::dto::{ApiResponse, VoiceParams};
use crate::infrastructure::http::error::ApiError;
use crate::infrastructure::http::state::AppState;

// ============================================================================
// DTOs
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct SpeakRequest {
    pub text: String,
    #[serde(flatten)]
    pub params: VoiceParams,
    /// 是否在响应中内联 base64 音频
    #[serde(default)]
    pub inline_audio: bool,
}

#[derive(Debug, Serialize)]
pub struct SpeakResponseDto {
    pub fingerprint: String,
    pub cached: bool,
    pub audio_url: String,
    pub content_type: String,
    pub size_bytes: u64,
    pub word_timings: Vec<WordTiming>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_base64: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PrefetchRequestDto {
    pub book_id: String,
    pub chapter_ref: String,
    pub paragraphs: Vec<String>,
    #[serde(flatten)]
    pub params: VoiceParams,
    pub start_index: usize,
    pub end_index: usize,
}

#[derive(Debug, Deserialize)]
pub struct PositionRequestDto {
    pub book_id: String,
    pub chapter_ref: String,
    pub paragraphs: Vec<String>,
    #[serde(flatten)]
    pub params: VoiceParams,
    pub current_index: usize,
}

#[derive(Debug, Serialize)]
pub struct PrefetchResponseDto {
    pub accepted: bool,
    pub window_start: usize,
    pub window_end: usize,
    pub scheduled: usize,
}

impl From<PrefetchResponse> for PrefetchResponseDto {
    fn from(r: PrefetchResponse) -> Self {
        Self {
            accepted: r.accepted,
            window_start: r.window_start,
            window_end: r.window_end,
            scheduled: r.scheduled,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct DownloadChapterRequest {
    pub sentences: Vec<String>,
    #[serde(flatten)]
    pub params: VoiceParams,
    /// 文件名主干，不含扩展名
    #[serde(default)]
    pub filename: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct DownloadChapterResponseDto {
    pub download_url: String,
    pub filename: String,
    pub size_bytes: u64,
    pub cached_sentences: usize,
}

#[derive(Debug, Deserialize)]
pub struct ListVoicesParams {
    pub lang: Option<String>,
}

// ============================================================================
// Handlers
// ============================================================================

/// 单段合成，命中缓存时不调用 provider
pub async fn speak(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SpeakRequest>,
) -> Result<Json<ApiResponse<SpeakResponseDto>>, ApiError> {
    let command = SpeakCommand {
        text: req.text,
        params: req.params.into(),
    };

    let result = state.speak_handler.handle(command).await?;
    let artifact = &result.artifact;

    let audio_base64 = req
        .inline_audio
        .then(|| base64::engine::general_purpose::STANDARD.encode(artifact.audio()));

    Ok(Json(ApiResponse::success(SpeakResponseDto {
        audio_url: format!("/api/tts/audio/{}", result.fingerprint),
        content_type: artifact.content_type().to_string(),
        size_bytes: artifact.size_bytes(),
        word_timings: artifact.word_timings().to_vec(),
        audio_base64,
        fingerprint: result.fingerprint,
        cached: result.cached,
    })))
}

/// 按指纹返回原始音频字节
pub async fn get_artifact_audio(
    State(state): State<Arc<AppState>>,
    Path(fingerprint): Path<String>,
) -> Result<Response, ApiError> {
    let result = state
        .get_artifact_audio_handler
        .handle(GetArtifactAudioQuery { fingerprint })
        .await?;

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, result.content_type)
        .header(header::CONTENT_LENGTH, result.audio_data.len())
        .header(header::CACHE_CONTROL, "public, max-age=31536000, immutable")
        .body(Body::from(result.audio_data))
        .map_err(|e| ApiError::Internal(format!("Failed to build response: {}", e)))
}

/// 可用音色，`?lang=en` 按 locale 前缀过滤
pub async fn list_voices(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListVoicesParams>,
) -> Result<Json<ApiResponse<Vec<VoiceInfo>>>, ApiError> {
    let voices = state
        .list_voices_handler
        .handle(ListVoicesQuery { lang: params.lang })
        .await?;
    Ok(Json(ApiResponse::success(voices)))
}

/// 预热显式区间，立即返回
pub async fn prefetch(
    State(state): State<Arc<AppState>>,
    Json(req): Json<PrefetchRequestDto>,
) -> Result<Json<ApiResponse<PrefetchResponseDto>>, ApiError> {
    let command = PrefetchCommand {
        book_id: req.book_id,
        chapter_ref: req.chapter_ref,
        paragraphs: req.paragraphs,
        params: req.params.into(),
        start_index: req.start_index,
        end_index: req.end_index,
    };

    let result = state.prefetch_handler.prefetch(command)?;
    Ok(Json(ApiResponse::success(result.into())))
}

/// 播放位置变化，按配置的窗口预热
pub async fn position_changed(
    State(state): State<Arc<AppState>>,
    Json(req): Json<PositionRequestDto>,
) -> Result<Json<ApiResponse<PrefetchResponseDto>>, ApiError> {
    let command = PositionChangedCommand {
        book_id: req.book_id,
        chapter_ref: req.chapter_ref,
        paragraphs: req.paragraphs,
        params: req.params.into(),
        current_index: req.current_index,
    };

    let result = state.prefetch_handler.position_changed(command)?;
    Ok(Json(ApiResponse::success(result.into())))
}

/// 合成整章并写成一个文件，返回下载地址
pub async fn download_chapter(
    State(state): State<Arc<AppState>>,
    Json(req): Json<DownloadChapterRequest>,
) -> Result<Json<ApiResponse<DownloadChapterResponseDto>>, ApiError> {
    let stem = match req.filename.as_deref().map(str::trim) {
        Some(name) if !name.is_empty() => sanitize_filename(name),
        _ => "chapter".to_string(),
    };
    let command = DownloadChapterCommand {
        sentences: req.sentences,
        params: req.params.into(),
        stem,
    };

    let result = state.download_chapter_handler.handle(command).await?;

    Ok(Json(ApiResponse::success(DownloadChapterResponseDto {
        download_url: format!("/api/tts/download/{}", result.filename.replace(' ', "%20")),
        filename: result.filename,
        size_bytes: result.size_bytes,
        cached_sentences: result.cached_sentences,
    })))
}

/// 下载单章音频文件
pub async fn get_chapter_download(
    State(state): State<Arc<AppState>>,
    Path(filename): Path<String>,
) -> Result<Response, ApiError> {
    let download = state
        .get_chapter_download_handler
        .handle(GetChapterDownloadQuery {
            filename: filename.clone(),
        })
        .await?;

    let file = tokio::fs::File::open(&download.path)
        .await
        .map_err(|e| ApiError::Internal(format!("Failed to open chapter file: {}", e)))?;

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, download.content_type)
        .header(header::CONTENT_LENGTH, download.size_bytes)
        .header(header::CONTENT_DISPOSITION, content_disposition(&filename))
        .body(Body::from_stream(ReaderStream::new(file)))
        .map_err(|e| ApiError::Internal(format!("Failed to build response: {}", e)))
}
