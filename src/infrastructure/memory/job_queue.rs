//! In-Memory Job Queue Implementation

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_util::sync::CancellationToken;

use crate::application::ports::{JobQueueError, JobQueuePort};

/// 内存任务队列
///
/// 已入队且尚未结束的任务持有一个取消标记，删除任务时触发
pub struct InMemoryJobQueue {
    /// job_id -> 取消标记
    active: DashMap<String, CancellationToken>,
    /// 任务队列发送端
    queue_sender: mpsc::Sender<String>,
}

impl InMemoryJobQueue {
    pub fn new(queue_sender: mpsc::Sender<String>) -> Self {
        Self {
            active: DashMap::new(),
            queue_sender,
        }
    }

    /// 创建队列和对应的接收端
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<String>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (Self::new(sender), receiver)
    }

    pub fn arc(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }
}

impl JobQueuePort for InMemoryJobQueue {
    fn enqueue(&self, job_id: &str) -> Result<bool, JobQueueError> {
        match self.active.entry(job_id.to_string()) {
            Entry::Occupied(_) => {
                tracing::debug!(job_id = %job_id, "Job already queued");
                Ok(false)
            }
            Entry::Vacant(entry) => {
                match self.queue_sender.try_send(job_id.to_string()) {
                    Ok(()) => {}
                    Err(TrySendError::Full(_)) => {
                        tracing::warn!(job_id = %job_id, "Job queue is full");
                        return Err(JobQueueError::QueueFull);
                    }
                    Err(TrySendError::Closed(_)) => return Err(JobQueueError::QueueClosed),
                }
                entry.insert(CancellationToken::new());
                tracing::debug!(job_id = %job_id, "Job enqueued");
                Ok(true)
            }
        }
    }

    fn cancellation_token(&self, job_id: &str) -> Option<CancellationToken> {
        self.active.get(job_id).map(|token| token.clone())
    }

    fn cancel(&self, job_id: &str) -> bool {
        match self.active.remove(job_id) {
            Some((_, token)) => {
                token.cancel();
                tracing::info!(job_id = %job_id, "Job cancellation requested");
                true
            }
            None => false,
        }
    }

    fn is_active(&self, job_id: &str) -> bool {
        self.active.contains_key(job_id)
    }

    fn finish(&self, job_id: &str) {
        self.active.remove(job_id);
    }
}
