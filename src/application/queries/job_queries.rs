//! Job Queries - 任务状态快照（轮询）

use std::path::PathBuf;

#[derive(Debug, Clone, Default)]
pub struct ListJobsQuery;

#[derive(Debug, Clone)]
pub struct GetJobQuery {
    pub job_id: String,
}

#[derive(Debug, Clone)]
pub struct GetJobDownloadQuery {
    pub job_id: String,
}

/// 已完成任务的结果文件
#[derive(Debug, Clone)]
pub struct JobDownload {
    pub path: PathBuf,
    pub filename: String,
    pub size_bytes: u64,
    pub content_type: String,
}
