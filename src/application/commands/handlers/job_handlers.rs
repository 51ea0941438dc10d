//! Job Command Handlers

use std::sync::Arc;

use super::tts_handlers::check_params;
use crate::application::commands::job_commands::*;
use crate::application::error::ApplicationError;
use crate::application::ports::{
    BookSourcePort, JobQueueError, JobQueuePort, JobStoreError, JobStorePort, RenderStorePort,
};
use crate::domain::job::{Job, JobStatus};

/// CreateOrResumeJob Handler
///
/// 同一 (book, voice, rate, pitch, mode) 元组最多一个未完成任务；
/// 已有未完成任务时续传它而不是新建
pub struct CreateOrResumeJobHandler {
    store: Arc<dyn JobStorePort>,
    queue: Arc<dyn JobQueuePort>,
    books: Arc<dyn BookSourcePort>,
}

impl CreateOrResumeJobHandler {
    pub fn new(
        store: Arc<dyn JobStorePort>,
        queue: Arc<dyn JobQueuePort>,
        books: Arc<dyn BookSourcePort>,
    ) -> Self {
        Self { store, queue, books }
    }

    pub async fn handle(&self, cmd: CreateOrResumeJobCommand) -> Result<CreateOrResumeJobResponse, ApplicationError> {
        check_params(&cmd.params)?;
        if cmd.book_id.trim().is_empty() {
            return Err(ApplicationError::invalid_request("Book id is required"));
        }

        if let Some(existing) = self
            .store
            .find_incomplete(&cmd.book_id, &cmd.params, cmd.mode)
            .await?
        {
            return self.resume(existing).await;
        }

        // 章节列表在创建时固定
        let toc = self.books.table_of_contents(&cmd.book_id).await?;
        let title = self.books.book_title(&cmd.book_id).await?;
        let job = Job::new(&cmd.book_id, title, cmd.params.clone(), cmd.mode, toc)?;

        match self.store.insert(&job).await {
            Ok(()) => {}
            Err(JobStoreError::Conflict(reason)) => {
                // 并发创建：另一个请求先插入了
                tracing::info!(book_id = %cmd.book_id, reason = %reason, "Job created concurrently, resuming");
                return match self
                    .store
                    .find_incomplete(&cmd.book_id, &cmd.params, cmd.mode)
                    .await?
                {
                    Some(existing) => self.resume(existing).await,
                    None => Err(ApplicationError::ConcurrentJobConflict(reason)),
                };
            }
            Err(e) => return Err(e.into()),
        }

        self.enqueue(&job.id);

        tracing::info!(
            job_id = %job.id,
            book_id = %job.book_id,
            chapters = job.total_chapters(),
            mode = job.mode.as_str(),
            "Job created"
        );

        Ok(CreateOrResumeJobResponse {
            job_id: job.id,
            resumed: false,
            resume_from_chapter: None,
        })
    }

    async fn resume(&self, mut job: Job) -> Result<CreateOrResumeJobResponse, ApplicationError> {
        match job.status {
            JobStatus::Failed => {
                job.reset_for_resume()?;
                if !self.store.save(&job).await? {
                    return Err(ApplicationError::JobNotFound(job.id));
                }
                self.enqueue(&job.id);
            }
            JobStatus::Pending | JobStatus::Running => {
                // 进程重启后留下的任务不在队列里
                if !self.queue.is_active(&job.id) {
                    self.enqueue(&job.id);
                }
            }
            JobStatus::Completed => {}
        }

        let resume_from_chapter = job.resume_from_chapter();
        tracing::info!(
            job_id = %job.id,
            status = %job.status,
            resume_from_chapter = ?resume_from_chapter,
            "Resuming existing job"
        );

        Ok(CreateOrResumeJobResponse {
            job_id: job.id,
            resumed: true,
            resume_from_chapter,
        })
    }

    /// 入队失败时任务保持 pending，下一次请求或重启恢复时再入队
    fn enqueue(&self, job_id: &str) {
        match self.queue.enqueue(job_id) {
            Ok(_) => {}
            Err(JobQueueError::QueueFull) => {
                tracing::warn!(job_id = %job_id, "Job queue full, job left pending");
            }
            Err(e) => {
                tracing::error!(job_id = %job_id, error = %e, "Failed to enqueue job");
            }
        }
    }
}

/// DeleteJob Handler - 删除即取消
pub struct DeleteJobHandler {
    store: Arc<dyn JobStorePort>,
    queue: Arc<dyn JobQueuePort>,
    render: Arc<dyn RenderStorePort>,
}

impl DeleteJobHandler {
    pub fn new(
        store: Arc<dyn JobStorePort>,
        queue: Arc<dyn JobQueuePort>,
        render: Arc<dyn RenderStorePort>,
    ) -> Self {
        Self { store, queue, render }
    }

    pub async fn handle(&self, cmd: DeleteJobCommand) -> Result<DeleteJobResponse, ApplicationError> {
        // 取消信号先于任何数据库访问发出，运行中的 worker 在下一个章节边界停止
        let cancelled = self.queue.cancel(&cmd.job_id);

        let job = self
            .store
            .find_by_id(&cmd.job_id)
            .await?
            .ok_or_else(|| ApplicationError::JobNotFound(cmd.job_id.clone()))?;

        // worker 的下一次保存会发现记录已不存在
        self.store.delete(&job.id).await?;

        if !cancelled {
            if let Err(e) = self.render.remove_parts(&job.id).await {
                tracing::warn!(job_id = %job.id, error = %e, "Failed to remove job parts");
            }
        }
        if let Some(result) = &job.result {
            if let Err(e) = self.render.remove_output(&result.filename).await {
                tracing::warn!(job_id = %job.id, error = %e, "Failed to remove job output");
            }
        }

        tracing::info!(job_id = %job.id, cancelled = cancelled, "Job deleted");

        Ok(DeleteJobResponse {
            job_id: job.id,
            cancelled,
        })
    }
}
