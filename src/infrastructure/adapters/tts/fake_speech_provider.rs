//! Fake Speech Provider - 用于测试和本地运行的语音合成服务
//!
//! 音频内容由请求参数确定性生成，不实际调用外部服务

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use crate::application::ports::{
    ProviderError, ProviderRequest, ProviderResponse, SpeechProviderPort, VoiceInfo, WordBoundary,
    TICKS_PER_MS,
};

type FailurePredicate = dyn Fn(&ProviderRequest) -> Option<ProviderError> + Send + Sync;

/// Fake provider 配置
#[derive(Debug, Clone)]
pub struct FakeSpeechProviderConfig {
    /// 模拟合成延迟
    pub latency: Duration,
    /// 每个词的模拟时长（毫秒）
    pub word_duration_ms: u64,
    pub content_type: String,
}

impl Default for FakeSpeechProviderConfig {
    fn default() -> Self {
        Self {
            latency: Duration::from_millis(0),
            word_duration_ms: 250,
            content_type: "audio/mpeg".to_string(),
        }
    }
}

/// Fake Speech Provider
///
/// 音频字节为 `{voice}|{rate}|{pitch}|{text}`，相同输入总是得到相同字节
pub struct FakeSpeechProvider {
    config: FakeSpeechProviderConfig,
    calls: AtomicU64,
    outage: AtomicBool,
    failure: RwLock<Option<Arc<FailurePredicate>>>,
}

impl FakeSpeechProvider {
    pub fn new(config: FakeSpeechProviderConfig) -> Self {
        Self {
            config,
            calls: AtomicU64::new(0),
            outage: AtomicBool::new(false),
            failure: RwLock::new(None),
        }
    }

    pub fn with_latency(latency: Duration) -> Self {
        Self::new(FakeSpeechProviderConfig {
            latency,
            ..Default::default()
        })
    }

    pub fn arc(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// 到目前为止收到的合成调用次数
    pub fn call_count(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }

    /// 模拟服务整体不可用
    pub fn set_outage(&self, down: bool) {
        self.outage.store(down, Ordering::SeqCst);
    }

    /// 按请求注入失败，返回 None 表示正常合成
    pub fn fail_when<F>(&self, predicate: F)
    where
        F: Fn(&ProviderRequest) -> Option<ProviderError> + Send + Sync + 'static,
    {
        if let Ok(mut slot) = self.failure.write() {
            *slot = Some(Arc::new(predicate));
        }
    }

    pub fn clear_failures(&self) {
        if let Ok(mut slot) = self.failure.write() {
            *slot = None;
        }
    }

    /// 给定请求对应的音频字节
    pub fn render(request: &ProviderRequest) -> Vec<u8> {
        format!(
            "{}|{:.3}|{:.3}|{}",
            request.voice, request.rate, request.pitch, request.text
        )
        .into_bytes()
    }

    fn injected_failure(&self, request: &ProviderRequest) -> Option<ProviderError> {
        if self.outage.load(Ordering::SeqCst) {
            return Some(ProviderError::ServiceError("simulated outage".to_string()));
        }
        let predicate = self.failure.read().ok()?.clone()?;
        predicate(request)
    }
}

impl Default for FakeSpeechProvider {
    fn default() -> Self {
        Self::new(FakeSpeechProviderConfig::default())
    }
}

#[async_trait]
impl SpeechProviderPort for FakeSpeechProvider {
    async fn synthesize(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        tracing::debug!(
            text_len = request.text.len(),
            voice = %request.voice,
            "FakeSpeechProvider: rendering deterministic audio"
        );

        if !self.config.latency.is_zero() {
            tokio::time::sleep(self.config.latency).await;
        }

        if let Some(error) = self.injected_failure(&request) {
            return Err(error);
        }

        let step = self.config.word_duration_ms * TICKS_PER_MS;
        let boundaries = request
            .text
            .split_whitespace()
            .enumerate()
            .map(|(i, word)| WordBoundary {
                text: word.to_string(),
                offset_ticks: i as u64 * step,
                duration_ticks: step,
            })
            .collect();

        Ok(ProviderResponse {
            audio: Self::render(&request),
            content_type: self.config.content_type.clone(),
            boundaries,
        })
    }

    async fn list_voices(&self) -> Result<Vec<VoiceInfo>, ProviderError> {
        Ok(vec![
            VoiceInfo {
                name: "en-US-AriaNeural".to_string(),
                gender: "Female".to_string(),
                locale: "en-US".to_string(),
            },
            VoiceInfo {
                name: "en-GB-RyanNeural".to_string(),
                gender: "Male".to_string(),
                locale: "en-GB".to_string(),
            },
            VoiceInfo {
                name: "zh-CN-XiaoxiaoNeural".to_string(),
                gender: "Female".to_string(),
                locale: "zh-CN".to_string(),
            },
        ])
    }

    async fn health_check(&self) -> bool {
        !self.outage.load(Ordering::SeqCst)
    }
}
