//! Job HTTP Handlers - 整书渲染任务

use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, StatusCode},
    response::Response,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio_util::io::ReaderStream;

use crate::application::{
    CreateOrResumeJobCommand, DeleteJobCommand, GetJobDownloadQuery, GetJobQuery, ListJobsQuery,
};
use crate::domain::job::{Job, JobResult, OutputMode};
use crate::infrastructure::http::dto::{ApiResponse, JobIdRequest, VoiceParams};
use crate::infrastructure::http::error::ApiError;
use crate::infrastructure::http::state::AppState;

// ============================================================================
// DTOs
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct CreateJobRequest {
    pub book_id: String,
    #[serde(flatten)]
    pub params: VoiceParams,
    #[serde(default)]
    pub mode: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CreateJobResponse {
    pub job_id: String,
    pub resumed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resume_from_chapter: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct DeleteJobResponseDto {
    pub id: String,
    pub cancelled: bool,
}

/// 任务状态快照
#[derive(Debug, Serialize)]
pub struct JobResponse {
    pub id: String,
    pub book_id: String,
    pub book_title: String,
    pub voice: String,
    pub rate: f32,
    pub pitch: f32,
    pub mode: OutputMode,
    pub status: String,
    pub progress: u8,
    pub progress_text: String,
    pub total_chapters: usize,
    pub completed_chapters: usize,
    pub created_at: String,
    pub started_at: Option<String>,
    pub completed_at: Option<String>,
    pub result: Option<JobResult>,
    pub error: Option<String>,
}

impl From<Job> for JobResponse {
    fn from(job: Job) -> Self {
        Self {
            total_chapters: job.total_chapters(),
            completed_chapters: job.completed_chapters(),
            status: job.status.as_str().to_string(),
            created_at: job.created_at.to_rfc3339(),
            started_at: job.started_at.map(|t| t.to_rfc3339()),
            completed_at: job.completed_at.map(|t| t.to_rfc3339()),
            id: job.id,
            book_id: job.book_id,
            book_title: job.book_title,
            voice: job.params.voice,
            rate: job.params.rate,
            pitch: job.params.pitch,
            mode: job.mode,
            progress: job.progress,
            progress_text: job.progress_text,
            result: job.result,
            error: job.error,
        }
    }
}

/// 非 ASCII 字符替换为 `_`，保证 header 值合法
pub(super) fn content_disposition(filename: &str) -> String {
    let ascii: String = filename
        .chars()
        .map(|c| if (c.is_ascii_graphic() && c != '"') || c == ' ' { c } else { '_' })
        .collect();
    format!("attachment; filename=\"{}\"", ascii)
}

// ============================================================================
// Handlers
// ============================================================================

/// 创建任务；同一 (book, voice, rate, pitch, mode) 已有未完成任务时续传
pub async fn create_job(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateJobRequest>,
) -> Result<Json<ApiResponse<CreateJobResponse>>, ApiError> {
    let mode = match req.mode.as_deref() {
        None => OutputMode::default(),
        Some(s) => OutputMode::from_str(s)
            .ok_or_else(|| ApiError::BadRequest(format!("Invalid mode: {}", s)))?,
    };

    let command = CreateOrResumeJobCommand {
        book_id: req.book_id,
        params: req.params.into(),
        mode,
    };

    let result = state.create_job_handler.handle(command).await?;

    Ok(Json(ApiResponse::success(CreateJobResponse {
        job_id: result.job_id,
        resumed: result.resumed,
        resume_from_chapter: result.resume_from_chapter,
    })))
}

pub async fn list_jobs(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<Vec<JobResponse>>>, ApiError> {
    let jobs = state.list_jobs_handler.handle(ListJobsQuery).await?;
    let responses: Vec<JobResponse> = jobs.into_iter().map(JobResponse::from).collect();
    Ok(Json(ApiResponse::success(responses)))
}

pub async fn get_job(
    State(state): State<Arc<AppState>>,
    Json(req): Json<JobIdRequest>,
) -> Result<Json<ApiResponse<JobResponse>>, ApiError> {
    let job = state
        .get_job_handler
        .handle(GetJobQuery { job_id: req.id })
        .await?;
    Ok(Json(ApiResponse::success(job.into())))
}

/// 删除任务，运行中的任务在下一个章节边界停止
pub async fn delete_job(
    State(state): State<Arc<AppState>>,
    Json(req): Json<JobIdRequest>,
) -> Result<Json<ApiResponse<DeleteJobResponseDto>>, ApiError> {
    let result = state
        .delete_job_handler
        .handle(DeleteJobCommand { job_id: req.id })
        .await?;

    Ok(Json(ApiResponse::success(DeleteJobResponseDto {
        id: result.job_id,
        cancelled: result.cancelled,
    })))
}

/// 流式下载已完成任务的结果文件
pub async fn download_job(
    State(state): State<Arc<AppState>>,
    Path(job_id): Path<String>,
) -> Result<Response, ApiError> {
    let download = state
        .get_job_download_handler
        .handle(GetJobDownloadQuery { job_id })
        .await?;

    let file = tokio::fs::File::open(&download.path)
        .await
        .map_err(|e| ApiError::Internal(format!("Failed to open output file: {}", e)))?;

    let body = Body::from_stream(ReaderStream::new(file));

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, download.content_type)
        .header(header::CONTENT_LENGTH, download.size_bytes)
        .header(header::CONTENT_DISPOSITION, content_disposition(&download.filename))
        .body(body)
        .map_err(|e| ApiError::Internal(format!("Failed to build response: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_disposition_is_ascii() {
        assert_eq!(
            content_disposition("Moby Dick-1234abcd.mp3"),
            "attachment; filename=\"Moby Dick-1234abcd.mp3\""
        );
        assert_eq!(content_disposition("三体.zip"), "attachment; filename=\"__.zip\"");
    }
}
