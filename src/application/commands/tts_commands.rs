//! TTS Commands - 交互式合成与预取命令

use std::sync::Arc;

use crate::domain::speech::{Artifact, SynthesisParams, WordTiming};

/// 单段合成命令（交互式播放）
#[derive(Debug, Clone)]
pub struct SpeakCommand {
    pub text: String,
    pub params: SynthesisParams,
}

/// 合成响应
#[derive(Debug, Clone)]
pub struct SpeakResponse {
    pub fingerprint: String,
    pub cached: bool,
    pub artifact: Arc<Artifact>,
}

impl SpeakResponse {
    pub fn word_timings(&self) -> &[WordTiming] {
        self.artifact.word_timings()
    }
}

/// 预热显式区间 [start_index, end_index)
#[derive(Debug, Clone)]
pub struct PrefetchCommand {
    pub book_id: String,
    pub chapter_ref: String,
    pub paragraphs: Vec<String>,
    pub params: SynthesisParams,
    pub start_index: usize,
    pub end_index: usize,
}

/// 播放位置变化
#[derive(Debug, Clone)]
pub struct PositionChangedCommand {
    pub book_id: String,
    pub chapter_ref: String,
    pub paragraphs: Vec<String>,
    pub params: SynthesisParams,
    pub current_index: usize,
}

/// 预取被接受，实际预热在后台进行
#[derive(Debug, Clone)]
pub struct PrefetchResponse {
    pub accepted: bool,
    pub window_start: usize,
    pub window_end: usize,
    pub scheduled: usize,
}

/// 单章下载：按顺序合成每句并拼接为一个文件
#[derive(Debug, Clone)]
pub struct DownloadChapterCommand {
    pub sentences: Vec<String>,
    pub params: SynthesisParams,
    /// 已清洗的文件名主干（不含扩展名）
    pub stem: String,
}

#[derive(Debug, Clone)]
pub struct DownloadChapterResponse {
    pub filename: String,
    pub size_bytes: u64,
    pub cached_sentences: usize,
}
