//! Storage Adapter - 渲染任务的文件存储

mod render_storage;

pub use render_storage::{sanitize_filename, RenderStorage};
