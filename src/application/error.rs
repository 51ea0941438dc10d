//! 应用层错误定义
//!
//! 统一的命令/查询错误类型

use thiserror::Error;

use crate::application::ports::{
    BookSourceError, CacheError, JobQueueError, JobStoreError, RenderStoreError,
};
use crate::domain::job::JobError;

/// 应用层错误
///
/// Clone：等待同一指纹合成结果的调用方共享领先者的错误
#[derive(Debug, Clone, Error)]
pub enum ApplicationError {
    /// 永久错误，不重试
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Provider 瞬时错误，重试耗尽
    #[error("Provider error after {attempts} attempt(s): {message}")]
    Provider { attempts: u32, message: String },

    /// 产物不可读或损坏
    #[error("Cache IO error: {0}")]
    CacheIo(String),

    #[error("Job not found: {0}")]
    JobNotFound(String),

    /// 同一元组已有未完成任务（通过续传解决）
    #[error("Concurrent job conflict: {0}")]
    ConcurrentJobConflict(String),

    #[error("Book not found: {0}")]
    BookNotFound(String),

    /// 资源未找到
    #[error("{resource_type} not found: {id}")]
    NotFound {
        resource_type: &'static str,
        id: String,
    },

    /// 状态无效
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// 仓储错误
    #[error("Repository error: {0}")]
    RepositoryError(String),

    /// 存储错误
    #[error("Storage error: {0}")]
    StorageError(String),

    /// 内部错误
    #[error("Internal error: {0}")]
    InternalError(String),
}

impl ApplicationError {
    /// 创建 NotFound 错误
    pub fn not_found(resource_type: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            resource_type,
            id: id.into(),
        }
    }

    /// 创建请求无效错误
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest(message.into())
    }

    /// 创建存储错误
    pub fn storage(message: impl Into<String>) -> Self {
        Self::StorageError(message.into())
    }

    /// 创建内部错误
    pub fn internal(message: impl Into<String>) -> Self {
        Self::InternalError(message.into())
    }

    /// 调用方可以原样重试
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Provider { .. } | Self::CacheIo(_) | Self::StorageError(_))
    }
}

impl From<JobStoreError> for ApplicationError {
    fn from(err: JobStoreError) -> Self {
        match err {
            JobStoreError::Conflict(msg) => Self::ConcurrentJobConflict(msg),
            other => Self::RepositoryError(other.to_string()),
        }
    }
}

impl From<BookSourceError> for ApplicationError {
    fn from(err: BookSourceError) -> Self {
        match err {
            BookSourceError::BookNotFound(id) => Self::BookNotFound(id),
            BookSourceError::ChapterNotFound(chapter) => Self::not_found("Chapter", chapter),
            other => Self::StorageError(other.to_string()),
        }
    }
}

impl From<CacheError> for ApplicationError {
    fn from(err: CacheError) -> Self {
        Self::CacheIo(err.to_string())
    }
}

impl From<JobError> for ApplicationError {
    fn from(err: JobError) -> Self {
        match err {
            JobError::EmptyTableOfContents => Self::InvalidRequest(err.to_string()),
            other => Self::InvalidState(other.to_string()),
        }
    }
}

impl From<JobQueueError> for ApplicationError {
    fn from(err: JobQueueError) -> Self {
        Self::InternalError(err.to_string())
    }
}

impl From<RenderStoreError> for ApplicationError {
    fn from(err: RenderStoreError) -> Self {
        Self::StorageError(err.to_string())
    }
}
