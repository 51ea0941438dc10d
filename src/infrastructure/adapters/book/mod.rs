//! Book Adapter - 书籍内容来源
//!
//! 文档解析在系统之外完成，这里只读取解析好的目录与段落

mod in_memory_book_source;
mod json_book_source;

pub use in_memory_book_source::{InMemoryBook, InMemoryBookSource};
pub use json_book_source::JsonBookSource;
