//! TTS Queries

use std::path::PathBuf;

/// 按指纹获取音频
#[derive(Debug, Clone)]
pub struct GetArtifactAudioQuery {
    pub fingerprint: String,
}

#[derive(Debug, Clone)]
pub struct GetArtifactAudioResponse {
    pub audio_data: Vec<u8>,
    pub content_type: String,
}

/// 可用音色，`lang` 为 locale 前缀（如 "en" 或 "zh-CN"）
#[derive(Debug, Clone, Default)]
pub struct ListVoicesQuery {
    pub lang: Option<String>,
}

/// 单章下载生成的文件
#[derive(Debug, Clone)]
pub struct GetChapterDownloadQuery {
    pub filename: String,
}

#[derive(Debug, Clone)]
pub struct ChapterDownload {
    pub path: PathBuf,
    pub size_bytes: u64,
    pub content_type: String,
}
