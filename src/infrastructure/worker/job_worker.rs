//! Job Worker - 整书渲染后台处理器
//!
//! 从队列消费任务 ID，按目录顺序逐章渲染：
//! 章节段落经合成网关取得产物（命中缓存则不调用 provider），
//! 拼接为章节分片写入工作目录，全部完成后合并或打包为最终产物。
//! 取消只在章节边界检查。

use std::sync::Arc;

use futures_util::{stream, StreamExt, TryStreamExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::application::error::ApplicationError;
use crate::application::ports::{BookSourcePort, JobQueuePort, JobStorePort, RenderStorePort};
use crate::application::services::{SynthesisGateway, SynthesisRequest, WorkerPool};
use crate::domain::job::{ChapterProgress, Job, JobResult, JobStatus, OutputMode};
use crate::domain::speech::ParagraphPosition;
use crate::infrastructure::adapters::storage::sanitize_filename;

/// Worker 配置
#[derive(Debug, Clone)]
pub struct JobWorkerConfig {
    /// 单章内并发合成的段落数
    pub paragraph_concurrency: usize,
    /// 输出音频扩展名（不含点）
    pub audio_extension: String,
}

impl Default for JobWorkerConfig {
    fn default() -> Self {
        Self {
            paragraph_concurrency: 4,
            audio_extension: "mp3".to_string(),
        }
    }
}

/// 单个任务的处理结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Completed,
    Failed(String),
    /// 任务被删除或取消
    Cancelled,
    /// 已完成或状态不允许运行
    Skipped,
}

/// 章节内待合成的段落：段落下标（标题为 None）与文本
type ChapterItem = (Option<u32>, String);

/// 任务执行器
///
/// 持有全部协作方，可克隆后在多个 tokio 任务间共享
#[derive(Clone)]
pub struct JobRunner {
    config: JobWorkerConfig,
    store: Arc<dyn JobStorePort>,
    queue: Arc<dyn JobQueuePort>,
    books: Arc<dyn BookSourcePort>,
    gateway: Arc<SynthesisGateway>,
    render: Arc<dyn RenderStorePort>,
}

impl JobRunner {
    pub fn new(
        config: JobWorkerConfig,
        store: Arc<dyn JobStorePort>,
        queue: Arc<dyn JobQueuePort>,
        books: Arc<dyn BookSourcePort>,
        gateway: Arc<SynthesisGateway>,
        render: Arc<dyn RenderStorePort>,
    ) -> Self {
        Self {
            config,
            store,
            queue,
            books,
            gateway,
            render,
        }
    }

    /// 重新入队进程上次退出时仍处于 pending/running 的任务
    pub async fn recover(&self) -> Result<usize, ApplicationError> {
        let jobs = self.store.find_interrupted().await?;
        let mut enqueued = 0;
        for job in &jobs {
            match self.queue.enqueue(&job.id) {
                Ok(true) => enqueued += 1,
                Ok(false) => {}
                Err(e) => {
                    tracing::warn!(job_id = %job.id, error = %e, "Failed to re-enqueue interrupted job");
                }
            }
        }
        if enqueued > 0 {
            tracing::info!(count = enqueued, "Interrupted jobs re-enqueued");
        }
        Ok(enqueued)
    }

    /// 处理单个任务，结束时总是注销队列登记
    pub async fn process(&self, job_id: &str) -> JobOutcome {
        let outcome = match self.run_job(job_id).await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!(job_id = %job_id, error = %e, "Job worker error");
                JobOutcome::Failed(e.to_string())
            }
        };

        if outcome == JobOutcome::Cancelled {
            if let Err(e) = self.render.remove_parts(job_id).await {
                tracing::warn!(job_id = %job_id, error = %e, "Failed to remove parts of cancelled job");
            }
        }

        self.queue.finish(job_id);
        outcome
    }

    async fn run_job(&self, job_id: &str) -> Result<JobOutcome, ApplicationError> {
        let Some(mut job) = self.store.find_by_id(job_id).await? else {
            tracing::info!(job_id = %job_id, "Job deleted before start, skipping");
            return Ok(JobOutcome::Cancelled);
        };

        let token = self
            .queue
            .cancellation_token(job_id)
            .unwrap_or_else(CancellationToken::new);
        if token.is_cancelled() {
            return Ok(JobOutcome::Cancelled);
        }

        match job.status {
            JobStatus::Pending => {}
            // 上一个进程在运行中退出
            JobStatus::Running => job.reset_for_resume()?,
            JobStatus::Completed | JobStatus::Failed => {
                tracing::debug!(job_id = %job_id, status = %job.status, "Job not runnable, skipping");
                return Ok(JobOutcome::Skipped);
            }
        }

        job.start()?;
        if !self.store.save(&job).await? {
            return Ok(JobOutcome::Cancelled);
        }

        tracing::info!(
            job_id = %job.id,
            book_id = %job.book_id,
            chapters = job.total_chapters(),
            resume_from_chapter = ?job.resume_from_chapter(),
            "Job started"
        );

        let chapters: Vec<ChapterProgress> = job
            .chapters
            .iter()
            .filter(|c| !c.completed)
            .cloned()
            .collect();

        for chapter in chapters {
            if token.is_cancelled() {
                tracing::info!(job_id = %job.id, chapter = chapter.order + 1, "Job cancelled at chapter boundary");
                return Ok(JobOutcome::Cancelled);
            }

            if let Err(e) = self.render_chapter(&job, &chapter).await {
                if token.is_cancelled() {
                    return Ok(JobOutcome::Cancelled);
                }
                let message = format!(
                    "Chapter {} ({}) failed: {}",
                    chapter.order + 1,
                    chapter.title,
                    e
                );
                return self.fail_job(&mut job, message).await;
            }

            job.complete_chapter(chapter.order)?;
            if !self.store.save(&job).await? {
                return Ok(JobOutcome::Cancelled);
            }

            tracing::info!(
                job_id = %job.id,
                chapter = chapter.order + 1,
                progress = job.progress,
                "Chapter completed"
            );
        }

        if token.is_cancelled() {
            return Ok(JobOutcome::Cancelled);
        }

        let result = match self.finalize(&job).await {
            Ok(result) => result,
            Err(e) => return self.fail_job(&mut job, e.to_string()).await,
        };

        let filename = result.filename.clone();
        job.complete(result)?;
        if !self.store.save(&job).await? {
            // 合并期间任务被删除
            if let Err(e) = self.render.remove_output(&filename).await {
                tracing::warn!(job_id = %job.id, error = %e, "Failed to remove orphaned output");
            }
            return Ok(JobOutcome::Cancelled);
        }

        if let Err(e) = self.render.remove_parts(&job.id).await {
            tracing::warn!(job_id = %job.id, error = %e, "Failed to remove job parts");
        }

        tracing::info!(
            job_id = %job.id,
            filename = %filename,
            mode = job.mode.as_str(),
            "Job completed"
        );
        Ok(JobOutcome::Completed)
    }

    async fn fail_job(&self, job: &mut Job, message: String) -> Result<JobOutcome, ApplicationError> {
        tracing::error!(job_id = %job.id, error = %message, "Job failed");
        job.fail(message.clone())?;
        if !self.store.save(job).await? {
            return Ok(JobOutcome::Cancelled);
        }
        Ok(JobOutcome::Failed(message))
    }

    /// 章节标题作为第一段朗读，空白段落被跳过
    async fn chapter_items(&self, book_id: &str, chapter: &ChapterProgress) -> Result<Vec<ChapterItem>, ApplicationError> {
        let paragraphs = self
            .books
            .chapter_paragraphs(book_id, &chapter.chapter_ref)
            .await?;

        let mut items = Vec::with_capacity(paragraphs.len() + 1);
        if !chapter.title.trim().is_empty() {
            items.push((None, chapter.title.clone()));
        }
        items.extend(
            paragraphs
                .into_iter()
                .enumerate()
                .filter(|(_, text)| !text.trim().is_empty())
                .map(|(index, text)| (Some(index as u32), text)),
        );
        Ok(items)
    }

    /// 合成一个章节并写入分片；空章节不产生分片
    async fn render_chapter(&self, job: &Job, chapter: &ChapterProgress) -> Result<(), ApplicationError> {
        let items = self.chapter_items(&job.book_id, chapter).await?;
        if items.is_empty() {
            tracing::debug!(job_id = %job.id, chapter = chapter.order + 1, "Empty chapter");
            return Ok(());
        }

        let outcomes: Vec<_> = stream::iter(items)
            .map(|(index, text)| {
                let gateway = self.gateway.clone();
                let mut request = SynthesisRequest::new(text, job.params.clone());
                if let Some(index) = index {
                    request = request.at(ParagraphPosition::new(
                        job.book_id.clone(),
                        chapter.chapter_ref.clone(),
                        index,
                    ));
                }
                async move { gateway.synthesize(request).await }
            })
            .buffered(self.config.paragraph_concurrency.max(1))
            .try_collect()
            .await?;

        let cached = outcomes.iter().filter(|o| o.cached).count();
        let audio: Vec<u8> = outcomes
            .iter()
            .flat_map(|o| o.artifact.audio().iter().copied())
            .collect();

        tracing::debug!(
            job_id = %job.id,
            chapter = chapter.order + 1,
            paragraphs = outcomes.len(),
            cached = cached,
            size_bytes = audio.len(),
            "Chapter synthesized"
        );

        if audio.is_empty() {
            return Ok(());
        }
        self.render.write_part(&job.id, chapter.order, &audio).await?;
        Ok(())
    }

    /// 收集章节分片并生成最终产物
    async fn finalize(&self, job: &Job) -> Result<JobResult, ApplicationError> {
        let mut orders = Vec::with_capacity(job.chapters.len());
        for chapter in &job.chapters {
            if !self.render.has_part(&job.id, chapter.order).await {
                // 分片丢失（如工作目录被清理）时从缓存重建
                self.render_chapter(job, chapter).await?;
            }
            if self.render.has_part(&job.id, chapter.order).await {
                orders.push(chapter.order);
            }
        }

        if orders.is_empty() {
            return Err(ApplicationError::InvalidState("No audio generated".to_string()));
        }

        let stem = format!(
            "{}-{}",
            sanitize_filename(&job.book_title),
            job.id.chars().take(8).collect::<String>()
        );
        let extension = &self.config.audio_extension;

        let (filename, size_bytes) = match job.mode {
            OutputMode::Merged => {
                let filename = format!("{}.{}", stem, extension);
                let size = self.render.write_merged(&job.id, &orders, &filename).await?;
                (filename, size)
            }
            OutputMode::PerChapterArchive => {
                let filename = format!("{}.zip", stem);
                let entries = job
                    .chapters
                    .iter()
                    .filter(|c| orders.contains(&c.order))
                    .map(|c| {
                        let name = format!(
                            "{:03} - {}.{}",
                            c.order + 1,
                            sanitize_filename(&c.title),
                            extension
                        );
                        (c.order, name)
                    })
                    .collect();
                let size = self.render.write_archive(&job.id, entries, &filename).await?;
                (filename, size)
            }
        };

        Ok(JobResult {
            download_url: format!("/api/job/download/{}", job.id),
            filename,
            size_bytes,
            total_chapters: job.total_chapters() as u32,
        })
    }
}

/// 任务 Worker
///
/// 每个任务持有一个任务额度直到结束
pub struct JobWorker {
    queue_receiver: mpsc::Receiver<String>,
    runner: JobRunner,
    pool: Arc<WorkerPool>,
}

impl JobWorker {
    pub fn new(queue_receiver: mpsc::Receiver<String>, runner: JobRunner, pool: Arc<WorkerPool>) -> Self {
        Self {
            queue_receiver,
            runner,
            pool,
        }
    }

    /// 启动 Worker，队列关闭时返回
    pub async fn run(mut self) {
        tracing::info!(
            job_slots = self.pool.available_job_slots(),
            "JobWorker started"
        );

        while let Some(job_id) = self.queue_receiver.recv().await {
            let permit = match self.pool.acquire_job_slot().await {
                Ok(permit) => permit,
                Err(e) => {
                    tracing::error!(job_id = %job_id, error = %e, "Failed to acquire job slot");
                    self.runner.queue.finish(&job_id);
                    continue;
                }
            };

            let runner = self.runner.clone();
            tokio::spawn(async move {
                let _permit = permit;
                let outcome = runner.process(&job_id).await;
                tracing::debug!(job_id = %job_id, outcome = ?outcome, "Job finished");
            });
        }

        tracing::info!("JobWorker stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::commands::handlers::{CreateOrResumeJobHandler, DeleteJobHandler};
    use crate::application::commands::{CreateOrResumeJobCommand, DeleteJobCommand};
    use crate::application::ports::ProviderError;
    use crate::application::services::RetryPolicy;
    use crate::domain::speech::SynthesisParams;
    use crate::infrastructure::adapters::book::{InMemoryBook, InMemoryBookSource};
    use crate::infrastructure::adapters::storage::RenderStorage;
    use crate::infrastructure::adapters::tts::FakeSpeechProvider;
    use crate::infrastructure::memory::InMemoryJobQueue;
    use crate::infrastructure::persistence::sqlite::{create_pool, run_migrations, DatabaseConfig};
    use crate::infrastructure::persistence::{SledArtifactCache, SqliteJobStore};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tempfile::{tempdir, TempDir};

    struct Fixture {
        _dir: TempDir,
        provider: Arc<FakeSpeechProvider>,
        store: Arc<SqliteJobStore>,
        queue: Arc<InMemoryJobQueue>,
        receiver: mpsc::Receiver<String>,
        render: Arc<RenderStorage>,
        gateway: Arc<SynthesisGateway>,
        create: CreateOrResumeJobHandler,
        delete: DeleteJobHandler,
        runner: JobRunner,
    }

    async fn fixture(books: InMemoryBookSource) -> Fixture {
        let dir = tempdir().unwrap();
        let pool = create_pool(&DatabaseConfig::in_memory()).await.unwrap();
        run_migrations(&pool).await.unwrap();
        let store = Arc::new(SqliteJobStore::new(pool));
        let (queue, receiver) = InMemoryJobQueue::channel(16);
        let queue = queue.arc();
        let books = Arc::new(books);

        let provider = FakeSpeechProvider::default().arc();
        let cache = Arc::new(SledArtifactCache::open(dir.path().join("cache.sled")).unwrap());
        let policy = RetryPolicy {
            max_retries: 1,
            call_timeout: Duration::from_secs(5),
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
        };
        let gateway = Arc::new(SynthesisGateway::new(provider.clone(), cache, policy));
        let render = Arc::new(
            RenderStorage::new(dir.path().join("work"), dir.path().join("output"))
                .await
                .unwrap(),
        );

        let runner = JobRunner::new(
            JobWorkerConfig::default(),
            store.clone(),
            queue.clone(),
            books.clone(),
            gateway.clone(),
            render.clone(),
        );

        Fixture {
            create: CreateOrResumeJobHandler::new(store.clone(), queue.clone(), books),
            delete: DeleteJobHandler::new(store.clone(), queue.clone(), render.clone()),
            _dir: dir,
            provider,
            store,
            queue,
            receiver,
            render,
            gateway,
            runner,
        }
    }

    fn three_chapters() -> InMemoryBookSource {
        let books = InMemoryBookSource::new();
        books.insert(
            "book-1",
            InMemoryBook::new("Sample Book")
                .chapter("ch1.xhtml", "Chapter 1", ["Alpha one.", "Alpha two."])
                .chapter("ch2.xhtml", "Chapter 2", ["Beta one."])
                .chapter("ch3.xhtml", "Chapter 3", ["Gamma one."]),
        );
        books
    }

    fn params() -> SynthesisParams {
        SynthesisParams::new("en-US-AriaNeural", 1.0, 1.0)
    }

    async fn create_job(f: &mut Fixture, mode: OutputMode) -> String {
        let created = f
            .create
            .handle(CreateOrResumeJobCommand {
                book_id: "book-1".to_string(),
                params: params(),
                mode,
            })
            .await
            .unwrap();
        assert_eq!(f.receiver.recv().await.as_deref(), Some(created.job_id.as_str()));
        created.job_id
    }

    #[tokio::test]
    async fn test_merged_job_keeps_chapter_order() {
        let mut f = fixture(three_chapters()).await;
        let job_id = create_job(&mut f, OutputMode::Merged).await;

        assert_eq!(f.runner.process(&job_id).await, JobOutcome::Completed);

        let job = f.store.find_by_id(&job_id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.progress, 100);
        let result = job.result.unwrap();
        assert!(result.filename.ends_with(".mp3"));
        assert_eq!(result.download_url, format!("/api/job/download/{}", job_id));
        assert_eq!(result.total_chapters, 3);

        let merged = std::fs::read(f.render.output_path(&result.filename)).unwrap();
        assert_eq!(result.size_bytes, merged.len() as u64);
        let merged = String::from_utf8(merged).unwrap();
        let expected = [
            "Chapter 1", "Alpha one.", "Alpha two.", "Chapter 2", "Beta one.", "Chapter 3", "Gamma one.",
        ];
        let positions: Vec<usize> = expected
            .iter()
            .map(|needle| merged.find(needle).unwrap())
            .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));

        // 分片在完成后清理，队列登记已注销
        assert!(!f.render.has_part(&job_id, 0).await);
        assert!(!f.queue.is_active(&job_id));
    }

    #[tokio::test]
    async fn test_archive_has_one_entry_per_chapter() {
        let mut f = fixture(three_chapters()).await;
        let job_id = create_job(&mut f, OutputMode::PerChapterArchive).await;

        assert_eq!(f.runner.process(&job_id).await, JobOutcome::Completed);

        let job = f.store.find_by_id(&job_id).await.unwrap().unwrap();
        let result = job.result.unwrap();
        assert!(result.filename.ends_with(".zip"));

        let file = std::fs::File::open(f.render.output_path(&result.filename)).unwrap();
        let mut archive = zip::ZipArchive::new(file).unwrap();
        assert_eq!(archive.len(), 3);
        assert_eq!(archive.by_index(0).unwrap().name(), "001 - Chapter 1.mp3");
        assert_eq!(archive.by_index(1).unwrap().name(), "002 - Chapter 2.mp3");
        assert_eq!(archive.by_index(2).unwrap().name(), "003 - Chapter 3.mp3");
    }

    #[tokio::test]
    async fn test_resume_skips_completed_chapters() {
        let mut f = fixture(three_chapters()).await;
        let job_id = create_job(&mut f, OutputMode::Merged).await;

        f.provider.fail_when(|req| {
            req.text
                .contains("Beta")
                .then(|| ProviderError::InvalidRequest("rejected".to_string()))
        });
        let outcome = f.runner.process(&job_id).await;
        assert!(matches!(outcome, JobOutcome::Failed(ref m) if m.contains("Chapter 2")));

        let failed = f.store.find_by_id(&job_id).await.unwrap().unwrap();
        assert_eq!(failed.status, JobStatus::Failed);
        assert_eq!(failed.completed_chapters(), 1);
        assert!(failed.error.unwrap().contains("Chapter 2"));

        // 第一章不得再次合成
        let replayed = Arc::new(AtomicUsize::new(0));
        let counter = replayed.clone();
        f.provider.fail_when(move |req| {
            if req.text.contains("Alpha") || req.text == "Chapter 1" {
                counter.fetch_add(1, Ordering::SeqCst);
            }
            None
        });

        let resumed = f
            .create
            .handle(CreateOrResumeJobCommand {
                book_id: "book-1".to_string(),
                params: params(),
                mode: OutputMode::Merged,
            })
            .await
            .unwrap();
        assert!(resumed.resumed);
        assert_eq!(resumed.job_id, job_id);
        assert_eq!(resumed.resume_from_chapter, Some(2));
        assert_eq!(f.receiver.recv().await.as_deref(), Some(job_id.as_str()));

        assert_eq!(f.runner.process(&job_id).await, JobOutcome::Completed);
        assert_eq!(replayed.load(Ordering::SeqCst), 0);

        let job = f.store.find_by_id(&job_id).await.unwrap().unwrap();
        let merged = std::fs::read(f.render.output_path(&job.result.unwrap().filename)).unwrap();
        let merged = String::from_utf8(merged).unwrap();
        assert!(merged.find("Alpha one.").unwrap() < merged.find("Beta one.").unwrap());
    }

    #[tokio::test]
    async fn test_cancel_halts_at_chapter_boundary() {
        let mut f = fixture(three_chapters()).await;
        let job_id = create_job(&mut f, OutputMode::Merged).await;
        let token = f.queue.cancellation_token(&job_id).unwrap();

        let gamma_calls = Arc::new(AtomicUsize::new(0));
        let counter = gamma_calls.clone();
        f.provider.fail_when(move |req| {
            if req.text.contains("Beta") {
                token.cancel();
            }
            if req.text.contains("Gamma") || req.text == "Chapter 3" {
                counter.fetch_add(1, Ordering::SeqCst);
            }
            None
        });

        assert_eq!(f.runner.process(&job_id).await, JobOutcome::Cancelled);
        assert_eq!(gamma_calls.load(Ordering::SeqCst), 0);

        // 进度未被破坏，已合成的段落仍在缓存中
        let job = f.store.find_by_id(&job_id).await.unwrap().unwrap();
        assert_eq!(job.completed_chapters(), 2);
        assert!(f.gateway.is_cached(&SynthesisRequest::new("Alpha one.", params())).await);
        assert!(f.gateway.is_cached(&SynthesisRequest::new("Beta one.", params())).await);
        assert!(!f.render.has_part(&job_id, 0).await);
    }

    #[tokio::test]
    async fn test_delete_during_run_stops_before_next_chapter() {
        let mut f = fixture(three_chapters()).await;
        let job_id = create_job(&mut f, OutputMode::Merged).await;

        let beta_done = Arc::new(tokio::sync::Notify::new());
        let gamma_calls = Arc::new(AtomicUsize::new(0));
        let (signal, counter) = (beta_done.clone(), gamma_calls.clone());
        f.provider.fail_when(move |req| {
            if req.text.contains("Beta") {
                signal.notify_one();
            }
            if req.text.contains("Gamma") || req.text == "Chapter 3" {
                counter.fetch_add(1, Ordering::SeqCst);
            }
            None
        });

        let runner = f.runner.clone();
        let id = job_id.clone();
        let running = tokio::spawn(async move { runner.process(&id).await });

        beta_done.notified().await;
        let deleted = f
            .delete
            .handle(DeleteJobCommand {
                job_id: job_id.clone(),
            })
            .await
            .unwrap();
        assert!(deleted.cancelled);

        assert_eq!(running.await.unwrap(), JobOutcome::Cancelled);
        assert_eq!(gamma_calls.load(Ordering::SeqCst), 0);
        assert!(f.store.find_by_id(&job_id).await.unwrap().is_none());
        assert!(f.gateway.is_cached(&SynthesisRequest::new("Alpha one.", params())).await);
        assert!(!f.render.has_part(&job_id, 0).await);
    }

    #[tokio::test]
    async fn test_deleted_job_is_not_rendered() {
        let mut f = fixture(three_chapters()).await;
        let job_id = create_job(&mut f, OutputMode::Merged).await;

        f.delete
            .handle(DeleteJobCommand {
                job_id: job_id.clone(),
            })
            .await
            .unwrap();

        assert_eq!(f.runner.process(&job_id).await, JobOutcome::Cancelled);
        assert_eq!(f.provider.call_count(), 0);
    }

    #[tokio::test]
    async fn test_empty_chapter_has_no_archive_entry() {
        let books = InMemoryBookSource::new();
        books.insert(
            "book-1",
            InMemoryBook::new("Gaps")
                .chapter("ch1.xhtml", "One", ["First."])
                .chapter("ch2.xhtml", "", ["   "])
                .chapter("ch3.xhtml", "Three", ["Third."]),
        );
        let mut f = fixture(books).await;
        let job_id = create_job(&mut f, OutputMode::PerChapterArchive).await;

        assert_eq!(f.runner.process(&job_id).await, JobOutcome::Completed);

        let job = f.store.find_by_id(&job_id).await.unwrap().unwrap();
        assert_eq!(job.completed_chapters(), 3);
        let file = std::fs::File::open(f.render.output_path(&job.result.unwrap().filename)).unwrap();
        let mut archive = zip::ZipArchive::new(file).unwrap();
        assert_eq!(archive.len(), 2);
        assert_eq!(archive.by_index(0).unwrap().name(), "001 - One.mp3");
        assert_eq!(archive.by_index(1).unwrap().name(), "003 - Three.mp3");
    }

    #[tokio::test]
    async fn test_book_without_audio_fails() {
        let books = InMemoryBookSource::new();
        books.insert(
            "book-1",
            InMemoryBook::new("Silent").chapter("ch1.xhtml", "", Vec::<String>::new()),
        );
        let mut f = fixture(books).await;
        let job_id = create_job(&mut f, OutputMode::Merged).await;

        let outcome = f.runner.process(&job_id).await;
        assert!(matches!(outcome, JobOutcome::Failed(ref m) if m.contains("No audio generated")));
        let job = f.store.find_by_id(&job_id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Failed);
    }

    #[tokio::test]
    async fn test_recover_requeues_interrupted_job() {
        let mut f = fixture(three_chapters()).await;
        let job_id = create_job(&mut f, OutputMode::Merged).await;

        // 模拟进程在第一章完成后退出
        let mut job = f.store.find_by_id(&job_id).await.unwrap().unwrap();
        job.start().unwrap();
        job.complete_chapter(0).unwrap();
        f.store.save(&job).await.unwrap();
        f.queue.finish(&job_id);

        assert_eq!(f.runner.recover().await.unwrap(), 1);
        assert_eq!(f.receiver.recv().await.as_deref(), Some(job_id.as_str()));

        // 第一章没有分片，收尾时重新渲染
        assert_eq!(f.runner.process(&job_id).await, JobOutcome::Completed);
        let job = f.store.find_by_id(&job_id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        let merged = std::fs::read(f.render.output_path(&job.result.unwrap().filename)).unwrap();
        assert!(String::from_utf8(merged).unwrap().starts_with("en-US-AriaNeural|1.000|1.000|Chapter 1"));
    }
}
