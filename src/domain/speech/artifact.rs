//! Speech Context - Artifact

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 逐词时间信息（毫秒）
///
/// `char_start` 为该词在规范化文本中的字符下标，未能定位时为 None
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WordTiming {
    pub text: String,
    pub offset_ms: u64,
    pub duration_ms: u64,
    pub char_start: Option<usize>,
    pub char_len: usize,
}

/// 音频产物
///
/// 不变量:
/// - 由 Synthesis Gateway 创建一次，之后不再修改
/// - 以指纹哈希为键存储
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artifact {
    fingerprint: String,
    audio: Vec<u8>,
    word_timings: Vec<WordTiming>,
    content_type: String,
    created_at: DateTime<Utc>,
}

impl Artifact {
    pub fn new(
        fingerprint: impl Into<String>,
        audio: Vec<u8>,
        word_timings: Vec<WordTiming>,
        content_type: impl Into<String>,
    ) -> Self {
        Self {
            fingerprint: fingerprint.into(),
            audio,
            word_timings,
            content_type: content_type.into(),
            created_at: Utc::now(),
        }
    }

    /// 从存储恢复
    pub fn restore(
        fingerprint: String,
        audio: Vec<u8>,
        word_timings: Vec<WordTiming>,
        content_type: String,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            fingerprint,
            audio,
            word_timings,
            content_type,
            created_at,
        }
    }

    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    pub fn audio(&self) -> &[u8] {
        &self.audio
    }

    pub fn word_timings(&self) -> &[WordTiming] {
        &self.word_timings
    }

    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn size_bytes(&self) -> u64 {
        self.audio.len() as u64
    }

    /// 音频总时长估计：最后一个词的结束时间
    pub fn spoken_duration_ms(&self) -> u64 {
        self.word_timings
            .iter()
            .map(|w| w.offset_ms + w.duration_ms)
            .max()
            .unwrap_or(0)
    }
}
