//! Worker Pool - 有界并发额度
//!
//! 任务主循环和后台预取各自持有一组许可；交互式 Speak 不占用许可

use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::application::error::ApplicationError;

pub struct WorkerPool {
    job_slots: Arc<Semaphore>,
    background_slots: Arc<Semaphore>,
}

impl WorkerPool {
    pub fn new(max_concurrent_jobs: usize, max_background_calls: usize) -> Self {
        Self {
            job_slots: Arc::new(Semaphore::new(max_concurrent_jobs.max(1))),
            background_slots: Arc::new(Semaphore::new(max_background_calls.max(1))),
        }
    }

    pub fn arc(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub async fn acquire_job_slot(&self) -> Result<OwnedSemaphorePermit, ApplicationError> {
        self.job_slots
            .clone()
            .acquire_owned()
            .await
            .map_err(|e| ApplicationError::internal(format!("Job pool closed: {}", e)))
    }

    pub async fn acquire_background_slot(&self) -> Result<OwnedSemaphorePermit, ApplicationError> {
        self.background_slots
            .clone()
            .acquire_owned()
            .await
            .map_err(|e| ApplicationError::internal(format!("Background pool closed: {}", e)))
    }

    pub fn available_job_slots(&self) -> usize {
        self.job_slots.available_permits()
    }

    pub fn available_background_slots(&self) -> usize {
        self.background_slots.available_permits()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_slots_are_bounded_and_released() {
        let pool = WorkerPool::new(2, 1);

        let first = pool.acquire_job_slot().await.unwrap();
        let _second = pool.acquire_job_slot().await.unwrap();
        assert_eq!(pool.available_job_slots(), 0);
        assert_eq!(pool.available_background_slots(), 1);

        drop(first);
        assert_eq!(pool.available_job_slots(), 1);
    }

    #[test]
    fn test_zero_is_clamped() {
        let pool = WorkerPool::new(0, 0);
        assert_eq!(pool.available_job_slots(), 1);
        assert_eq!(pool.available_background_slots(), 1);
    }
}
