//! JSON Book Source
//!
//! 目录结构: `{books_dir}/{book_id}/book.json`
//!
//! ```json
//! {
//!   "title": "Moby Dick",
//!   "toc": [{"href": "ch1.xhtml", "label": "Chapter 1", "subitems": []}],
//!   "chapters": {"ch1.xhtml": ["Call me Ishmael.", "..."]}
//! }
//! ```

use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::fs;

use crate::application::ports::{BookSourceError, BookSourcePort};
use crate::domain::job::TocEntry;

#[derive(Debug, Deserialize)]
struct BookFile {
    #[serde(default)]
    title: String,
    #[serde(default)]
    toc: Vec<TocNode>,
    #[serde(default)]
    chapters: HashMap<String, Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct TocNode {
    href: String,
    #[serde(default, alias = "title")]
    label: String,
    #[serde(default)]
    subitems: Vec<TocNode>,
}

/// 深度优先展开嵌套目录
fn flatten(nodes: &[TocNode], out: &mut Vec<TocEntry>) {
    for node in nodes {
        out.push(TocEntry::new(node.href.clone(), node.label.trim()));
        flatten(&node.subitems, out);
    }
}

pub struct JsonBookSource {
    books_dir: PathBuf,
}

impl JsonBookSource {
    pub fn new(books_dir: impl AsRef<Path>) -> Self {
        Self {
            books_dir: books_dir.as_ref().to_path_buf(),
        }
    }

    fn book_path(&self, book_id: &str) -> Result<PathBuf, BookSourceError> {
        // 书籍 id 作为目录名，不允许跳出 books_dir
        if book_id.is_empty() || book_id.contains(['/', '\\']) || book_id.starts_with('.') {
            return Err(BookSourceError::BookNotFound(book_id.to_string()));
        }
        Ok(self.books_dir.join(book_id).join("book.json"))
    }

    async fn load(&self, book_id: &str) -> Result<BookFile, BookSourceError> {
        let path = self.book_path(book_id)?;
        let content = match fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(BookSourceError::BookNotFound(book_id.to_string()))
            }
            Err(e) => return Err(BookSourceError::IoError(e.to_string())),
        };

        serde_json::from_str(&content).map_err(|e| {
            BookSourceError::ParseError(format!("{}: {}", path.display(), e))
        })
    }
}

#[async_trait]
impl BookSourcePort for JsonBookSource {
    async fn book_title(&self, book_id: &str) -> Result<String, BookSourceError> {
        let book = self.load(book_id).await?;
        Ok(if book.title.trim().is_empty() {
            book_id.to_string()
        } else {
            book.title
        })
    }

    async fn table_of_contents(&self, book_id: &str) -> Result<Vec<TocEntry>, BookSourceError> {
        let book = self.load(book_id).await?;
        let mut entries = Vec::new();
        flatten(&book.toc, &mut entries);
        Ok(entries)
    }

    async fn chapter_paragraphs(
        &self,
        book_id: &str,
        chapter_ref: &str,
    ) -> Result<Vec<String>, BookSourceError> {
        let mut book = self.load(book_id).await?;

        if let Some(paragraphs) = book.chapters.remove(chapter_ref) {
            return Ok(paragraphs);
        }

        // "ch1.xhtml#sec2" 回退到所在文件
        let base = chapter_ref.split('#').next().unwrap_or(chapter_ref);
        book.chapters
            .remove(base)
            .ok_or_else(|| BookSourceError::ChapterNotFound(chapter_ref.to_string()))
    }
}
