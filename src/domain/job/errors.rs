//! Job Context - Errors

use thiserror::Error;

use super::JobStatus;

#[derive(Debug, Error)]
pub enum JobError {
    #[error("无效的状态转换: {from} -> {to}")]
    InvalidTransition { from: JobStatus, to: JobStatus },

    #[error("章节不存在: {0}")]
    UnknownChapter(u32),

    #[error("书籍没有章节")]
    EmptyTableOfContents,
}
