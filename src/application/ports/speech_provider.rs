//! Speech Provider Port - 外部语音合成服务抽象
//!
//! 核心把 provider 当作不可靠的远程依赖

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Provider 错误
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Request timeout")]
    Timeout,

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("Service error: {0}")]
    ServiceError(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Voice not found: {0}")]
    UnknownVoice(String),
}

impl ProviderError {
    /// 是否为可重试的瞬时错误
    pub fn is_transient(&self) -> bool {
        !matches!(
            self,
            ProviderError::InvalidRequest(_) | ProviderError::UnknownVoice(_)
        )
    }
}

/// 合成请求
#[derive(Debug, Clone)]
pub struct ProviderRequest {
    pub text: String,
    pub voice: String,
    pub rate: f32,
    pub pitch: f32,
}

/// Provider 上报的词边界事件
///
/// 时间单位为 100 纳秒 tick（edge-tts 约定）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WordBoundary {
    pub text: String,
    pub offset_ticks: u64,
    pub duration_ticks: u64,
}

/// 每毫秒的 tick 数
pub const TICKS_PER_MS: u64 = 10_000;

/// 合成响应
#[derive(Debug, Clone)]
pub struct ProviderResponse {
    pub audio: Vec<u8>,
    pub content_type: String,
    pub boundaries: Vec<WordBoundary>,
}

/// 可用音色
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoiceInfo {
    pub name: String,
    pub gender: String,
    pub locale: String,
}

/// Speech Provider Port
#[async_trait]
pub trait SpeechProviderPort: Send + Sync {
    /// 执行一次合成调用
    async fn synthesize(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError>;

    /// 列出可用音色
    async fn list_voices(&self) -> Result<Vec<VoiceInfo>, ProviderError>;

    /// 检查 provider 是否可用
    async fn health_check(&self) -> bool {
        true
    }
}
