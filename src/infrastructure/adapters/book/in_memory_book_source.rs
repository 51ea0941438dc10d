//! In-Memory Book Source

use async_trait::async_trait;
use dashmap::DashMap;

use crate::application::ports::{BookSourceError, BookSourcePort};
use crate::domain::job::TocEntry;

/// 内存中的一本书，章节按目录顺序排列
#[derive(Debug, Clone, Default)]
pub struct InMemoryBook {
    pub title: String,
    pub chapters: Vec<(TocEntry, Vec<String>)>,
}

impl InMemoryBook {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            chapters: Vec::new(),
        }
    }

    pub fn chapter<I, S>(mut self, chapter_ref: &str, title: &str, paragraphs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.chapters.push((
            TocEntry::new(chapter_ref, title),
            paragraphs.into_iter().map(Into::into).collect(),
        ));
        self
    }
}

#[derive(Default)]
pub struct InMemoryBookSource {
    books: DashMap<String, InMemoryBook>,
}

impl InMemoryBookSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, book_id: impl Into<String>, book: InMemoryBook) {
        self.books.insert(book_id.into(), book);
    }
}

#[async_trait]
impl BookSourcePort for InMemoryBookSource {
    async fn book_title(&self, book_id: &str) -> Result<String, BookSourceError> {
        self.books
            .get(book_id)
            .map(|b| b.title.clone())
            .ok_or_else(|| BookSourceError::BookNotFound(book_id.to_string()))
    }

    async fn table_of_contents(&self, book_id: &str) -> Result<Vec<TocEntry>, BookSourceError> {
        self.books
            .get(book_id)
            .map(|b| b.chapters.iter().map(|(entry, _)| entry.clone()).collect())
            .ok_or_else(|| BookSourceError::BookNotFound(book_id.to_string()))
    }

    async fn chapter_paragraphs(
        &self,
        book_id: &str,
        chapter_ref: &str,
    ) -> Result<Vec<String>, BookSourceError> {
        let book = self
            .books
            .get(book_id)
            .ok_or_else(|| BookSourceError::BookNotFound(book_id.to_string()))?;
        book.chapters
            .iter()
            .find(|(entry, _)| entry.chapter_ref == chapter_ref)
            .map(|(_, paragraphs)| paragraphs.clone())
            .ok_or_else(|| BookSourceError::ChapterNotFound(chapter_ref.to_string()))
    }
}
