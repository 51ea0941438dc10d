//! Job Queue Port - 任务调度与协作式取消
//!
//! 运行中任务的取消标记只存在于内存，删除任务时触发

use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Job Queue 错误
#[derive(Debug, Error)]
pub enum JobQueueError {
    #[error("Job queue is full")]
    QueueFull,

    #[error("Job queue is closed")]
    QueueClosed,
}

/// Job Queue Port
pub trait JobQueuePort: Send + Sync {
    /// 将任务加入队列并登记取消标记；已在队列或运行中时返回 Ok(false)
    fn enqueue(&self, job_id: &str) -> Result<bool, JobQueueError>;

    /// 获取任务的取消标记
    fn cancellation_token(&self, job_id: &str) -> Option<CancellationToken>;

    /// 设置取消标记，返回任务是否处于活动状态
    fn cancel(&self, job_id: &str) -> bool;

    /// 任务是否在队列或运行中
    fn is_active(&self, job_id: &str) -> bool;

    /// worker 退出时注销任务
    fn finish(&self, job_id: &str);
}
