//! Synthesis Gateway - 合成网关
//!
//! 在 provider 调用外层包裹缓存查询、单飞去重和退避重试：
//! - 缓存命中直接返回，不调用 provider
//! - 同一指纹同时只存在一个 provider 调用，其余调用方等待领先者的结果
//! - 产物先写入缓存，再释放 in-flight 标记

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::sync::broadcast;

use crate::application::error::ApplicationError;
use crate::application::ports::{
    ArtifactCachePort, ProviderError, ProviderRequest, ProviderResponse, SpeechProviderPort,
};
use crate::application::services::word_timing::align_word_timings;
use crate::domain::speech::{normalize_text, Artifact, Fingerprint, ParagraphPosition, SynthesisParams};

type SharedOutcome = Result<Arc<Artifact>, ApplicationError>;

/// 重试策略
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// 首次调用之后的最大重试次数
    pub max_retries: u32,
    pub call_timeout: Duration,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            call_timeout: Duration::from_secs(60),
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_millis(8000),
        }
    }
}

impl RetryPolicy {
    /// 第 attempt 次失败后的等待时间（attempt 从 1 开始）
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt.saturating_sub(1)).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

/// 单段合成请求
#[derive(Debug, Clone)]
pub struct SynthesisRequest {
    pub text: String,
    pub params: SynthesisParams,
    /// 结构化位置，用于按位置索引缓存
    pub position: Option<ParagraphPosition>,
}

impl SynthesisRequest {
    pub fn new(text: impl Into<String>, params: SynthesisParams) -> Self {
        Self {
            text: text.into(),
            params,
            position: None,
        }
    }

    pub fn at(mut self, position: ParagraphPosition) -> Self {
        self.position = Some(position);
        self
    }
}

/// 合成结果
#[derive(Debug, Clone)]
pub struct SynthesisOutcome {
    pub artifact: Arc<Artifact>,
    pub cached: bool,
}

enum Role {
    Leader,
    Follower(broadcast::Receiver<SharedOutcome>),
}

/// 领先者持有的 in-flight 标记
///
/// 正常完成时先发布结果再移除；被提前丢弃时只移除，等待方会重新竞争
struct InflightGuard<'a> {
    inflight: &'a DashMap<String, broadcast::Sender<SharedOutcome>>,
    hash: &'a str,
    armed: bool,
}

impl InflightGuard<'_> {
    fn complete(mut self, outcome: SharedOutcome) {
        self.armed = false;
        if let Some((_, sender)) = self.inflight.remove(self.hash) {
            // 没有等待方时 send 返回 Err，可以忽略
            let _ = sender.send(outcome);
        }
    }
}

impl Drop for InflightGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.inflight.remove(self.hash);
        }
    }
}

pub struct SynthesisGateway {
    provider: Arc<dyn SpeechProviderPort>,
    cache: Arc<dyn ArtifactCachePort>,
    policy: RetryPolicy,
    inflight: DashMap<String, broadcast::Sender<SharedOutcome>>,
    provider_calls: AtomicU64,
}

impl SynthesisGateway {
    pub fn new(
        provider: Arc<dyn SpeechProviderPort>,
        cache: Arc<dyn ArtifactCachePort>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            provider,
            cache,
            policy,
            inflight: DashMap::new(),
            provider_calls: AtomicU64::new(0),
        }
    }

    pub fn cache(&self) -> &Arc<dyn ArtifactCachePort> {
        &self.cache
    }

    pub fn provider(&self) -> &Arc<dyn SpeechProviderPort> {
        &self.provider
    }

    /// 已发出的 provider 调用次数（含重试）
    pub fn provider_calls(&self) -> u64 {
        self.provider_calls.load(Ordering::Relaxed)
    }

    /// 当前正在合成的指纹数量
    pub fn inflight_count(&self) -> usize {
        self.inflight.len()
    }

    /// 计算请求的指纹，文本为空或音色为空时返回 InvalidRequest
    pub fn fingerprint(&self, request: &SynthesisRequest) -> Result<Fingerprint, ApplicationError> {
        let normalized = normalize_text(&request.text);
        if normalized.is_empty() {
            return Err(ApplicationError::invalid_request("Text is empty"));
        }
        if request.params.voice.trim().is_empty() {
            return Err(ApplicationError::invalid_request("Voice is empty"));
        }
        let fingerprint = Fingerprint::compute(&normalized, &request.params);
        Ok(match &request.position {
            Some(position) => fingerprint.with_context(position.clone()),
            None => fingerprint,
        })
    }

    /// 指纹对应的产物是否已在缓存中，读取失败视为未命中
    pub async fn is_cached(&self, request: &SynthesisRequest) -> bool {
        match self.fingerprint(request) {
            Ok(fp) => self.cache.contains(fp.hash()).await.unwrap_or(false),
            Err(_) => false,
        }
    }

    pub async fn synthesize(&self, request: SynthesisRequest) -> Result<SynthesisOutcome, ApplicationError> {
        let fingerprint = self.fingerprint(&request)?;
        let hash = fingerprint.hash().to_string();

        loop {
            if let Some(artifact) = self.cached(&hash).await {
                self.index(&fingerprint, &request.params).await;
                return Ok(SynthesisOutcome {
                    artifact: Arc::new(artifact),
                    cached: true,
                });
            }

            let role = match self.inflight.entry(hash.clone()) {
                Entry::Occupied(entry) => Role::Follower(entry.get().subscribe()),
                Entry::Vacant(entry) => {
                    let (sender, _) = broadcast::channel(1);
                    entry.insert(sender);
                    Role::Leader
                }
            };

            match role {
                Role::Follower(mut receiver) => match receiver.recv().await {
                    Ok(outcome) => {
                        let artifact = outcome?;
                        tracing::debug!(fingerprint = %hash, "Joined in-flight synthesis");
                        self.index(&fingerprint, &request.params).await;
                        return Ok(SynthesisOutcome { artifact, cached: true });
                    }
                    // 领先者未完成即被丢弃
                    Err(_) => continue,
                },
                Role::Leader => {
                    let guard = InflightGuard {
                        inflight: &self.inflight,
                        hash: &hash,
                        armed: true,
                    };
                    let result = self.lead(&request, &hash).await;
                    guard.complete(result.clone().map(|(artifact, _)| artifact));
                    let (artifact, cached) = result?;
                    self.index(&fingerprint, &request.params).await;
                    return Ok(SynthesisOutcome { artifact, cached });
                }
            }
        }
    }

    async fn cached(&self, hash: &str) -> Option<Artifact> {
        match self.cache.get(hash).await {
            Ok(found) => found,
            Err(e) => {
                tracing::warn!(fingerprint = %hash, error = %e, "Cache read failed, treating as miss");
                None
            }
        }
    }

    /// 记录位置到指纹的映射，失败只影响按位置列举
    async fn index(&self, fingerprint: &Fingerprint, params: &SynthesisParams) {
        let Some(position) = fingerprint.context() else {
            return;
        };
        if let Err(e) = self.cache.index_position(position, params, fingerprint.hash()).await {
            tracing::warn!(
                fingerprint = %fingerprint,
                book_id = %position.book_id,
                chapter_ref = %position.chapter_ref,
                paragraph_index = position.paragraph_index,
                error = %e,
                "Failed to index artifact position"
            );
        }
    }

    /// 领先者路径：再次检查缓存，调用 provider，发布产物
    async fn lead(
        &self,
        request: &SynthesisRequest,
        hash: &str,
    ) -> Result<(Arc<Artifact>, bool), ApplicationError> {
        // 上一个领先者可能刚刚发布完
        if let Some(artifact) = self.cached(hash).await {
            return Ok((Arc::new(artifact), true));
        }

        let normalized = normalize_text(&request.text);
        let provider_request = ProviderRequest {
            text: normalized.clone(),
            voice: request.params.voice.clone(),
            rate: request.params.rate,
            pitch: request.params.pitch,
        };

        let response = self.call_with_retry(provider_request, hash).await?;
        let timings = align_word_timings(&normalized, &response.boundaries);
        let artifact = Artifact::new(hash.to_string(), response.audio, timings, response.content_type);

        if let Err(e) = self.cache.put(&artifact).await {
            tracing::warn!(fingerprint = %hash, error = %e, "Failed to publish artifact to cache");
        }

        tracing::info!(
            fingerprint = %hash,
            size_bytes = artifact.size_bytes(),
            words = artifact.word_timings().len(),
            "Artifact synthesized"
        );

        Ok((Arc::new(artifact), false))
    }

    async fn call_with_retry(
        &self,
        request: ProviderRequest,
        hash: &str,
    ) -> Result<ProviderResponse, ApplicationError> {
        let max_attempts = self.policy.max_retries + 1;
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            self.provider_calls.fetch_add(1, Ordering::Relaxed);

            let result = match tokio::time::timeout(
                self.policy.call_timeout,
                self.provider.synthesize(request.clone()),
            )
            .await
            {
                Ok(Ok(response)) if response.audio.is_empty() => {
                    Err(ProviderError::InvalidResponse("Empty audio".to_string()))
                }
                Ok(result) => result,
                Err(_) => Err(ProviderError::Timeout),
            };

            match result {
                Ok(response) => return Ok(response),
                Err(e) if !e.is_transient() => {
                    tracing::warn!(fingerprint = %hash, error = %e, "Provider rejected request");
                    return Err(ApplicationError::InvalidRequest(e.to_string()));
                }
                Err(e) if attempt >= max_attempts => {
                    tracing::error!(
                        fingerprint = %hash,
                        attempts = attempt,
                        error = %e,
                        "Provider retries exhausted"
                    );
                    return Err(ApplicationError::Provider {
                        attempts: attempt,
                        message: e.to_string(),
                    });
                }
                Err(e) => {
                    let delay = self.policy.backoff(attempt);
                    tracing::warn!(
                        fingerprint = %hash,
                        attempt = attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Provider call failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::adapters::tts::FakeSpeechProvider;
    use crate::infrastructure::persistence::SledArtifactCache;
    use futures_util::future::join_all;
    use std::sync::atomic::AtomicU32;
    use tempfile::{tempdir, TempDir};

    fn fast_retry(max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            call_timeout: Duration::from_secs(5),
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(4),
        }
    }

    fn gateway_with(provider: Arc<FakeSpeechProvider>, policy: RetryPolicy) -> (TempDir, SynthesisGateway) {
        let dir = tempdir().unwrap();
        let cache = Arc::new(SledArtifactCache::open(dir.path().join("cache.sled")).unwrap());
        (dir, SynthesisGateway::new(provider, cache, policy))
    }

    fn params() -> SynthesisParams {
        SynthesisParams::new("en-US-AriaNeural", 1.0, 1.0)
    }

    #[test]
    fn test_backoff_is_exponential_and_capped() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff(1), Duration::from_millis(500));
        assert_eq!(policy.backoff(2), Duration::from_millis(1000));
        assert_eq!(policy.backoff(3), Duration::from_millis(2000));
        assert_eq!(policy.backoff(10), Duration::from_millis(8000));
        assert_eq!(policy.backoff(64), Duration::from_millis(8000));
    }

    #[tokio::test]
    async fn test_second_call_is_cache_hit() {
        let provider = FakeSpeechProvider::default().arc();
        let (_dir, gateway) = gateway_with(provider.clone(), fast_retry(3));

        let first = gateway
            .synthesize(SynthesisRequest::new("Call me Ishmael.", params()))
            .await
            .unwrap();
        let second = gateway
            .synthesize(SynthesisRequest::new("  Call me   Ishmael. ", params()))
            .await
            .unwrap();

        assert!(!first.cached);
        assert!(second.cached);
        assert_eq!(first.artifact.audio(), second.artifact.audio());
        assert_eq!(first.artifact.fingerprint(), second.artifact.fingerprint());
        assert_eq!(provider.call_count(), 1);
        assert_eq!(second.artifact.word_timings().len(), 3);
        assert_eq!(second.artifact.word_timings()[2].offset_ms, 500);
    }

    #[tokio::test]
    async fn test_concurrent_calls_share_one_provider_call() {
        let provider = FakeSpeechProvider::with_latency(Duration::from_millis(50)).arc();
        let (_dir, gateway) = gateway_with(provider.clone(), fast_retry(3));

        let calls = (0..8).map(|_| gateway.synthesize(SynthesisRequest::new("same text", params())));
        let outcomes = join_all(calls).await;

        assert_eq!(provider.call_count(), 1);
        let fresh = outcomes.iter().filter(|o| !o.as_ref().unwrap().cached).count();
        assert_eq!(fresh, 1);
        let audio = outcomes[0].as_ref().unwrap().artifact.audio().to_vec();
        assert!(outcomes.iter().all(|o| o.as_ref().unwrap().artifact.audio() == audio.as_slice()));
        assert_eq!(gateway.inflight_count(), 0);
    }

    #[tokio::test]
    async fn test_different_params_are_separate_artifacts() {
        let provider = FakeSpeechProvider::default().arc();
        let (_dir, gateway) = gateway_with(provider.clone(), fast_retry(3));

        let normal = gateway
            .synthesize(SynthesisRequest::new("hello", params()))
            .await
            .unwrap();
        let fast = gateway
            .synthesize(SynthesisRequest::new("hello", SynthesisParams::new("en-US-AriaNeural", 1.5, 1.0)))
            .await
            .unwrap();

        assert!(!fast.cached);
        assert_ne!(normal.artifact.fingerprint(), fast.artifact.fingerprint());
        assert_eq!(provider.call_count(), 2);
    }

    #[tokio::test]
    async fn test_invalid_request_never_reaches_provider() {
        let provider = FakeSpeechProvider::default().arc();
        let (_dir, gateway) = gateway_with(provider.clone(), fast_retry(3));

        let empty = gateway.synthesize(SynthesisRequest::new("   ", params())).await;
        assert!(matches!(empty, Err(ApplicationError::InvalidRequest(_))));

        let no_voice = gateway
            .synthesize(SynthesisRequest::new("text", SynthesisParams::new("", 1.0, 1.0)))
            .await;
        assert!(matches!(no_voice, Err(ApplicationError::InvalidRequest(_))));
        assert_eq!(provider.call_count(), 0);
    }

    #[tokio::test]
    async fn test_permanent_provider_error_not_retried() {
        let provider = FakeSpeechProvider::default().arc();
        provider.fail_when(|req| Some(ProviderError::UnknownVoice(req.voice.clone())));
        let (_dir, gateway) = gateway_with(provider.clone(), fast_retry(3));

        let result = gateway.synthesize(SynthesisRequest::new("text", params())).await;
        assert!(matches!(result, Err(ApplicationError::InvalidRequest(_))));
        assert_eq!(provider.call_count(), 1);
    }

    #[tokio::test]
    async fn test_transient_errors_retried_until_exhausted() {
        let provider = FakeSpeechProvider::default().arc();
        provider.set_outage(true);
        let (_dir, gateway) = gateway_with(provider.clone(), fast_retry(2));

        let result = gateway.synthesize(SynthesisRequest::new("text", params())).await;
        match result {
            Err(ApplicationError::Provider { attempts, .. }) => assert_eq!(attempts, 3),
            other => panic!("unexpected result: {:?}", other.map(|o| o.cached)),
        }
        assert_eq!(provider.call_count(), 3);
        assert!(!gateway.cache().contains(
            Fingerprint::compute("text", &params()).hash()
        ).await.unwrap());

        // 失败不会留下副作用，恢复后正常合成
        provider.set_outage(false);
        let recovered = gateway.synthesize(SynthesisRequest::new("text", params())).await.unwrap();
        assert!(!recovered.cached);
    }

    #[tokio::test]
    async fn test_transient_error_then_success() {
        let provider = FakeSpeechProvider::default().arc();
        let failures = Arc::new(AtomicU32::new(0));
        let counter = failures.clone();
        provider.fail_when(move |_| {
            (counter.fetch_add(1, Ordering::SeqCst) < 2).then(|| ProviderError::RateLimited("slow down".into()))
        });
        let (_dir, gateway) = gateway_with(provider.clone(), fast_retry(3));

        let outcome = gateway.synthesize(SynthesisRequest::new("text", params())).await.unwrap();
        assert!(!outcome.cached);
        assert_eq!(provider.call_count(), 3);
        assert_eq!(gateway.provider_calls(), 3);
    }

    #[tokio::test]
    async fn test_timeout_is_transient() {
        let provider = FakeSpeechProvider::with_latency(Duration::from_millis(200)).arc();
        let policy = RetryPolicy {
            max_retries: 1,
            call_timeout: Duration::from_millis(20),
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(1),
        };
        let (_dir, gateway) = gateway_with(provider.clone(), policy);

        let result = gateway.synthesize(SynthesisRequest::new("text", params())).await;
        assert!(matches!(result, Err(ApplicationError::Provider { attempts: 2, .. })));
    }

    #[tokio::test]
    async fn test_followers_share_leader_failure() {
        let provider = FakeSpeechProvider::with_latency(Duration::from_millis(30)).arc();
        provider.fail_when(|_| Some(ProviderError::InvalidRequest("rejected".into())));
        let (_dir, gateway) = gateway_with(provider.clone(), fast_retry(3));

        let calls = (0..4).map(|_| gateway.synthesize(SynthesisRequest::new("text", params())));
        let outcomes = join_all(calls).await;

        assert!(outcomes
            .iter()
            .all(|o| matches!(o, Err(ApplicationError::InvalidRequest(_)))));
        assert_eq!(provider.call_count(), 1);
    }

    #[tokio::test]
    async fn test_position_is_indexed_on_hit_and_miss() {
        let provider = FakeSpeechProvider::default().arc();
        let (_dir, gateway) = gateway_with(provider.clone(), fast_retry(3));

        gateway
            .synthesize(SynthesisRequest::new("shared", params()).at(ParagraphPosition::new("book", "ch1", 0)))
            .await
            .unwrap();
        let hit = gateway
            .synthesize(SynthesisRequest::new("shared", params()).at(ParagraphPosition::new("book", "ch1", 7)))
            .await
            .unwrap();
        assert!(hit.cached);

        let positions = gateway.cache().list_positions("book", "ch1", &params()).await.unwrap();
        assert_eq!(positions.len(), 2);
        assert_eq!(positions[0].1, positions[1].1);
        assert_eq!(positions[1].0, 7);
    }
}
