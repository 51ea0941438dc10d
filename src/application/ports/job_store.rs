//! Job Store Port - 任务持久化
//!
//! 任务元数据（状态、逐章完成标记、时间戳、结果）必须在进程重启后保留

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::job::{Job, OutputMode};
use crate::domain::speech::SynthesisParams;

/// Job Store 错误
#[derive(Debug, Error)]
pub enum JobStoreError {
    #[error("Incomplete job already exists for this book and parameters: {0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

/// Job Store Port
#[async_trait]
pub trait JobStorePort: Send + Sync {
    /// 插入新任务；同一元组已有未完成任务时返回 Conflict
    async fn insert(&self, job: &Job) -> Result<(), JobStoreError>;

    /// 根据 ID 查找任务
    async fn find_by_id(&self, id: &str) -> Result<Option<Job>, JobStoreError>;

    /// 获取所有任务（按创建时间倒序）
    async fn find_all(&self) -> Result<Vec<Job>, JobStoreError>;

    /// 查找同一元组下的未完成任务
    async fn find_incomplete(
        &self,
        book_id: &str,
        params: &SynthesisParams,
        mode: OutputMode,
    ) -> Result<Option<Job>, JobStoreError>;

    /// 查找被中断的任务（pending 或 running）
    async fn find_interrupted(&self) -> Result<Vec<Job>, JobStoreError>;

    /// 保存任务的完整状态；任务已被删除时返回 false
    async fn save(&self, job: &Job) -> Result<bool, JobStoreError>;

    /// 删除任务，返回是否存在
    async fn delete(&self, id: &str) -> Result<bool, JobStoreError>;
}
