//! Job Query Handlers

use std::sync::Arc;

use crate::application::error::ApplicationError;
use crate::application::ports::{JobStorePort, RenderStorePort};
use crate::application::queries::job_queries::*;
use crate::domain::job::{Job, JobStatus, OutputMode};

/// ListJobs Handler - 最新创建的在前
pub struct ListJobsHandler {
    store: Arc<dyn JobStorePort>,
}

impl ListJobsHandler {
    pub fn new(store: Arc<dyn JobStorePort>) -> Self {
        Self { store }
    }

    pub async fn handle(&self, _query: ListJobsQuery) -> Result<Vec<Job>, ApplicationError> {
        Ok(self.store.find_all().await?)
    }
}

pub struct GetJobHandler {
    store: Arc<dyn JobStorePort>,
}

impl GetJobHandler {
    pub fn new(store: Arc<dyn JobStorePort>) -> Self {
        Self { store }
    }

    pub async fn handle(&self, query: GetJobQuery) -> Result<Job, ApplicationError> {
        self.store
            .find_by_id(&query.job_id)
            .await?
            .ok_or_else(|| ApplicationError::JobNotFound(query.job_id.clone()))
    }
}

/// GetJobDownload Handler - 只有已完成任务可以下载
pub struct GetJobDownloadHandler {
    store: Arc<dyn JobStorePort>,
    render: Arc<dyn RenderStorePort>,
    audio_content_type: String,
}

impl GetJobDownloadHandler {
    pub fn new(
        store: Arc<dyn JobStorePort>,
        render: Arc<dyn RenderStorePort>,
        audio_content_type: impl Into<String>,
    ) -> Self {
        Self {
            store,
            render,
            audio_content_type: audio_content_type.into(),
        }
    }

    pub async fn handle(&self, query: GetJobDownloadQuery) -> Result<JobDownload, ApplicationError> {
        let job = self
            .store
            .find_by_id(&query.job_id)
            .await?
            .ok_or_else(|| ApplicationError::JobNotFound(query.job_id.clone()))?;

        let result = match (&job.status, &job.result) {
            (JobStatus::Completed, Some(result)) => result,
            _ => {
                return Err(ApplicationError::InvalidState(format!(
                    "Job {} is {}",
                    job.id, job.status
                )))
            }
        };

        let path = self.render.output_path(&result.filename);
        let size_bytes = tokio::fs::metadata(&path)
            .await
            .map(|m| m.len())
            .map_err(|_| ApplicationError::not_found("Job output", &result.filename))?;

        let content_type = match job.mode {
            OutputMode::Merged => self.audio_content_type.clone(),
            OutputMode::PerChapterArchive => "application/zip".to_string(),
        };

        Ok(JobDownload {
            path,
            filename: result.filename.clone(),
            size_bytes,
            content_type,
        })
    }
}
