//! Book Source Port - 文档解析协作方
//!
//! 核心只通过目录和章节段落两个函数访问书籍内容

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::job::TocEntry;

/// Book Source 错误
#[derive(Debug, Error)]
pub enum BookSourceError {
    #[error("Book not found: {0}")]
    BookNotFound(String),

    #[error("Chapter not found: {0}")]
    ChapterNotFound(String),

    #[error("IO error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),
}

/// Book Source Port
#[async_trait]
pub trait BookSourcePort: Send + Sync {
    /// 获取书名
    async fn book_title(&self, book_id: &str) -> Result<String, BookSourceError>;

    /// 获取按目录顺序展开的章节列表
    async fn table_of_contents(&self, book_id: &str) -> Result<Vec<TocEntry>, BookSourceError>;

    /// 获取章节的有序段落文本
    async fn chapter_paragraphs(
        &self,
        book_id: &str,
        chapter_ref: &str,
    ) -> Result<Vec<String>, BookSourceError>;
}
