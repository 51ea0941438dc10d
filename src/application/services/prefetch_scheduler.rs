//! Prefetch Scheduler - 播放位置驱动的缓存预热
//!
//! 尽力而为：失败只记录日志；调用方从不等待预热结果。
//! 每个播放流（书籍 + 合成参数）只保留最新窗口，旧窗口中尚未开始的段落会被跳过。

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use tokio::task::{JoinHandle, JoinSet};

use super::synthesis_gateway::{SynthesisGateway, SynthesisRequest};
use super::worker_pool::WorkerPool;
use crate::domain::speech::{ParagraphPosition, SynthesisParams};
use crate::domain::{PrefetchWindow, WindowConfig};

/// 一个章节内的预取请求
#[derive(Debug, Clone)]
pub struct PrefetchRequest {
    pub book_id: String,
    pub chapter_ref: String,
    pub paragraphs: Vec<String>,
    pub params: SynthesisParams,
}

impl PrefetchRequest {
    fn stream_key(&self) -> String {
        format!("{}|{}", self.book_id, self.params.key())
    }
}

/// 一次预热的统计
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrefetchReport {
    pub warmed: usize,
    pub already_cached: usize,
    pub failed: usize,
    /// 因更新的窗口而跳过
    pub superseded: usize,
}

pub struct PrefetchTicket {
    pub window: PrefetchWindow,
    /// 窗口内的非空段落数
    pub scheduled: usize,
    pub handle: JoinHandle<PrefetchReport>,
}

pub struct PrefetchScheduler {
    gateway: Arc<SynthesisGateway>,
    pool: Arc<WorkerPool>,
    config: WindowConfig,
    enabled: bool,
    next_generation: AtomicU64,
    generations: Arc<DashMap<String, u64>>,
}

impl PrefetchScheduler {
    pub fn new(
        gateway: Arc<SynthesisGateway>,
        pool: Arc<WorkerPool>,
        config: WindowConfig,
        enabled: bool,
    ) -> Self {
        Self {
            gateway,
            pool,
            config,
            enabled,
            next_generation: AtomicU64::new(1),
            generations: Arc::new(DashMap::new()),
        }
    }

    pub fn window_config(&self) -> WindowConfig {
        self.config
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// 播放位置变化：计算窗口并预热
    pub fn on_position_changed(&self, request: PrefetchRequest, current_index: usize) -> PrefetchTicket {
        let window = self.config.window_for(current_index, request.paragraphs.len());
        self.schedule(request, window)
    }

    /// 预热给定窗口，立即返回
    pub fn schedule(&self, request: PrefetchRequest, window: PrefetchWindow) -> PrefetchTicket {
        let window = PrefetchWindow::new(window.start, window.end, request.paragraphs.len());

        if !self.enabled || window.is_empty() {
            return PrefetchTicket {
                window,
                scheduled: 0,
                handle: tokio::spawn(async { PrefetchReport::default() }),
            };
        }

        let key = request.stream_key();
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        self.generations.insert(key.clone(), generation);

        let scheduled = window
            .indices()
            .filter(|&i| !request.paragraphs[i].trim().is_empty())
            .count();

        tracing::debug!(
            book_id = %request.book_id,
            chapter_ref = %request.chapter_ref,
            window_start = window.start,
            window_end = window.end,
            generation = generation,
            "Prefetch window scheduled"
        );

        let handle = tokio::spawn(warm_window(
            self.gateway.clone(),
            self.pool.clone(),
            self.generations.clone(),
            key,
            generation,
            request,
            window,
        ));

        PrefetchTicket {
            window,
            scheduled,
            handle,
        }
    }
}

async fn warm_window(
    gateway: Arc<SynthesisGateway>,
    pool: Arc<WorkerPool>,
    generations: Arc<DashMap<String, u64>>,
    key: String,
    generation: u64,
    request: PrefetchRequest,
    window: PrefetchWindow,
) -> PrefetchReport {
    let is_current = || generations.get(&key).map(|g| *g == generation).unwrap_or(false);

    let mut report = PrefetchReport::default();
    let mut tasks = JoinSet::new();
    let candidates: Vec<usize> = window
        .indices()
        .filter(|&i| !request.paragraphs[i].trim().is_empty())
        .collect();

    for (n, index) in candidates.iter().copied().enumerate() {
        if !is_current() {
            report.superseded += candidates.len() - n;
            break;
        }

        let synthesis = SynthesisRequest::new(request.paragraphs[index].clone(), request.params.clone()).at(
            ParagraphPosition::new(request.book_id.clone(), request.chapter_ref.clone(), index as u32),
        );

        // 命中时经网关记录位置索引，不调用 provider
        if gateway.is_cached(&synthesis).await {
            match gateway.synthesize(synthesis).await {
                Ok(_) => report.already_cached += 1,
                Err(e) => {
                    report.failed += 1;
                    tracing::warn!(paragraph_index = index, error = %e, "Prefetch failed");
                }
            }
            continue;
        }

        let permit = match pool.acquire_background_slot().await {
            Ok(permit) => permit,
            Err(e) => {
                tracing::warn!(error = %e, "Prefetch aborted");
                report.failed += candidates.len() - n;
                break;
            }
        };

        // 等待许可期间可能出现了更新的窗口
        if !is_current() {
            report.superseded += candidates.len() - n;
            break;
        }

        let gateway = gateway.clone();
        tasks.spawn(async move {
            let _permit = permit;
            (index, gateway.synthesize(synthesis).await)
        });
    }

    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((_, Ok(outcome))) if outcome.cached => report.already_cached += 1,
            Ok((_, Ok(_))) => report.warmed += 1,
            Ok((index, Err(e))) => {
                report.failed += 1;
                tracing::warn!(
                    book_id = %request.book_id,
                    chapter_ref = %request.chapter_ref,
                    paragraph_index = index,
                    error = %e,
                    "Prefetch failed"
                );
            }
            Err(e) => {
                report.failed += 1;
                tracing::warn!(error = %e, "Prefetch task panicked");
            }
        }
    }

    // 仍是最新窗口时注销该播放流
    generations.remove_if(&key, |_, current| *current == generation);

    tracing::debug!(
        book_id = %request.book_id,
        warmed = report.warmed,
        already_cached = report.already_cached,
        failed = report.failed,
        superseded = report.superseded,
        "Prefetch window finished"
    );

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::ProviderError;
    use crate::application::services::RetryPolicy;
    use crate::infrastructure::adapters::tts::FakeSpeechProvider;
    use crate::infrastructure::persistence::SledArtifactCache;
    use std::time::Duration;
    use tempfile::{tempdir, TempDir};

    fn fast_retry() -> RetryPolicy {
        RetryPolicy {
            max_retries: 1,
            call_timeout: Duration::from_secs(5),
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
        }
    }

    fn setup(provider: Arc<FakeSpeechProvider>, behind: usize, ahead: usize) -> (TempDir, Arc<SynthesisGateway>, PrefetchScheduler) {
        let dir = tempdir().unwrap();
        let cache = Arc::new(SledArtifactCache::open(dir.path().join("cache.sled")).unwrap());
        let gateway = Arc::new(SynthesisGateway::new(provider, cache, fast_retry()));
        let scheduler = PrefetchScheduler::new(
            gateway.clone(),
            WorkerPool::new(1, 2).arc(),
            WindowConfig::new(behind, ahead),
            true,
        );
        (dir, gateway, scheduler)
    }

    fn request(paragraphs: &[&str]) -> PrefetchRequest {
        PrefetchRequest {
            book_id: "book".to_string(),
            chapter_ref: "ch1".to_string(),
            paragraphs: paragraphs.iter().map(|p| p.to_string()).collect(),
            params: SynthesisParams::new("en-US-AriaNeural", 1.0, 1.0),
        }
    }

    #[tokio::test]
    async fn test_window_is_warmed_and_indexed() {
        let provider = FakeSpeechProvider::default().arc();
        let (_dir, gateway, scheduler) = setup(provider.clone(), 1, 2);

        let ticket = scheduler.on_position_changed(request(&["p0", "p1", "p2", "p3", "p4", "p5"]), 2);
        assert_eq!(ticket.window, PrefetchWindow { start: 1, end: 5 });
        assert_eq!(ticket.scheduled, 4);

        let report = ticket.handle.await.unwrap();
        assert_eq!(report.warmed, 4);
        assert_eq!(provider.call_count(), 4);

        let positions = gateway
            .cache()
            .list_positions("book", "ch1", &SynthesisParams::new("en-US-AriaNeural", 1.0, 1.0))
            .await
            .unwrap();
        let indices: Vec<u32> = positions.iter().map(|(i, _)| *i).collect();
        assert_eq!(indices, vec![1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn test_cached_and_blank_paragraphs_skipped() {
        let provider = FakeSpeechProvider::default().arc();
        let (_dir, _gateway, scheduler) = setup(provider.clone(), 0, 3);

        let first = scheduler.schedule(request(&["a", "  ", "b"]), PrefetchWindow::new(0, 3, 3));
        assert_eq!(first.scheduled, 2);
        assert_eq!(first.handle.await.unwrap().warmed, 2);

        let second = scheduler.schedule(request(&["a", "  ", "b"]), PrefetchWindow::new(0, 3, 3));
        let report = second.handle.await.unwrap();
        assert_eq!(report.already_cached, 2);
        assert_eq!(report.warmed, 0);
        assert_eq!(provider.call_count(), 2);
    }

    #[tokio::test]
    async fn test_newer_position_supersedes_window() {
        let provider = FakeSpeechProvider::with_latency(Duration::from_millis(50)).arc();
        let (_dir, _gateway, scheduler) = setup(provider.clone(), 0, 10);

        let paragraphs: Vec<String> = (0..12).map(|i| format!("paragraph {}", i)).collect();
        let refs: Vec<&str> = paragraphs.iter().map(String::as_str).collect();

        let stale = scheduler.on_position_changed(request(&refs), 0);
        tokio::time::sleep(Duration::from_millis(10)).await;
        let fresh = scheduler.on_position_changed(request(&refs), 11);

        let stale_report = stale.handle.await.unwrap();
        assert!(stale_report.superseded > 0);
        assert!(stale_report.warmed < 11);
        fresh.handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_prefetch_outage_does_not_affect_speak() {
        let latency = Duration::from_millis(20);
        let provider = FakeSpeechProvider::with_latency(latency).arc();
        provider.fail_when(|req| {
            req.text
                .starts_with("ahead")
                .then(|| ProviderError::ServiceError("outage".to_string()))
        });
        let (_dir, gateway, scheduler) = setup(provider.clone(), 0, 8);

        let ahead: Vec<String> = (0..8).map(|i| format!("ahead {}", i)).collect();
        let refs: Vec<&str> = ahead.iter().map(String::as_str).collect();
        let ticket = scheduler.on_position_changed(request(&refs), 0);

        let started = std::time::Instant::now();
        let spoken = gateway
            .synthesize(SynthesisRequest::new(
                "currently playing",
                SynthesisParams::new("en-US-AriaNeural", 1.0, 1.0),
            ))
            .await
            .unwrap();
        let elapsed = started.elapsed();
        assert!(!spoken.cached);
        // 两个后台许可、每段两次尝试，预热至少需要 8 * 2 * 20ms / 2
        assert!(elapsed < latency * 5, "speak took {:?}", elapsed);
        assert!(!ticket.handle.is_finished());

        let report = ticket.handle.await.unwrap();
        assert_eq!(report.failed, 8);
        assert_eq!(report.warmed, 0);
    }

    #[tokio::test]
    async fn test_cached_paragraph_gets_position_index() {
        let provider = FakeSpeechProvider::default().arc();
        let (_dir, gateway, scheduler) = setup(provider.clone(), 0, 3);
        let params = SynthesisParams::new("en-US-AriaNeural", 1.0, 1.0);

        // 交互式合成不带位置
        gateway
            .synthesize(SynthesisRequest::new("p1", params.clone()))
            .await
            .unwrap();

        let ticket = scheduler.schedule(request(&["p0", "p1"]), PrefetchWindow::new(0, 2, 2));
        let report = ticket.handle.await.unwrap();
        assert_eq!(report.warmed, 1);
        assert_eq!(report.already_cached, 1);
        assert_eq!(provider.call_count(), 2);

        let positions = gateway.cache().list_positions("book", "ch1", &params).await.unwrap();
        let indices: Vec<u32> = positions.iter().map(|(i, _)| *i).collect();
        assert_eq!(indices, vec![0, 1]);
    }

    #[tokio::test]
    async fn test_finished_stream_is_forgotten() {
        let provider = FakeSpeechProvider::default().arc();
        let (_dir, _gateway, scheduler) = setup(provider, 1, 2);

        let first = scheduler.on_position_changed(request(&["a", "b", "c"]), 0);
        first.handle.await.unwrap();
        let other_chapter = PrefetchRequest {
            chapter_ref: "ch2".to_string(),
            ..request(&["d", "e"])
        };
        scheduler.on_position_changed(other_chapter, 1).handle.await.unwrap();

        assert!(scheduler.generations.is_empty());
    }

    #[tokio::test]
    async fn test_disabled_scheduler_does_nothing() {
        let provider = FakeSpeechProvider::default().arc();
        let dir = tempdir().unwrap();
        let cache = Arc::new(SledArtifactCache::open(dir.path().join("cache.sled")).unwrap());
        let gateway = Arc::new(SynthesisGateway::new(provider.clone(), cache, fast_retry()));
        let scheduler = PrefetchScheduler::new(gateway, WorkerPool::new(1, 1).arc(), WindowConfig::default(), false);

        let ticket = scheduler.on_position_changed(request(&["a", "b"]), 0);
        assert_eq!(ticket.scheduled, 0);
        assert_eq!(ticket.handle.await.unwrap(), PrefetchReport::default());
        assert_eq!(provider.call_count(), 0);
    }
}
