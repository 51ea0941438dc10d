//! Job Context - Value Objects

use serde::{Deserialize, Serialize};

/// 任务状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(JobStatus::Pending),
            "running" => Some(JobStatus::Running),
            "completed" => Some(JobStatus::Completed),
            "failed" => Some(JobStatus::Failed),
            _ => None,
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 输出模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputMode {
    /// 所有章节拼接为一个音频文件
    #[default]
    Merged,
    /// 每章一个归档条目
    PerChapterArchive,
}

impl OutputMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputMode::Merged => "merged",
            OutputMode::PerChapterArchive => "per_chapter_archive",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "merged" => Some(OutputMode::Merged),
            "per_chapter_archive" | "per-chapter-archive" => Some(OutputMode::PerChapterArchive),
            _ => None,
        }
    }
}

/// 目录条目（已按目录顺序展开）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TocEntry {
    pub chapter_ref: String,
    pub title: String,
}

impl TocEntry {
    pub fn new(chapter_ref: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            chapter_ref: chapter_ref.into(),
            title: title.into(),
        }
    }
}

/// 单章进度
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChapterProgress {
    /// 目录顺序（从 0 开始）
    pub order: u32,
    pub chapter_ref: String,
    pub title: String,
    pub completed: bool,
}

/// 任务结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobResult {
    pub filename: String,
    pub download_url: String,
    pub size_bytes: u64,
    pub total_chapters: u32,
}
