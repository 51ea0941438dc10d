//! Render Store Port - 整书渲染的中间文件与最终产物
//!
//! 章节中间文件是续传检查点的一部分：已完成章节的音频在任务失败或进程重启后仍可复用

use async_trait::async_trait;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RenderStoreError {
    #[error("IO error: {0}")]
    IoError(String),

    #[error("Archive error: {0}")]
    ArchiveError(String),
}

impl From<std::io::Error> for RenderStoreError {
    fn from(e: std::io::Error) -> Self {
        Self::IoError(e.to_string())
    }
}

#[async_trait]
pub trait RenderStorePort: Send + Sync {
    /// 原子写入一章的拼接音频
    async fn write_part(&self, job_id: &str, order: u32, data: &[u8]) -> Result<(), RenderStoreError>;

    /// 章节中间文件不存在时返回 None
    async fn read_part(&self, job_id: &str, order: u32) -> Result<Option<Vec<u8>>, RenderStoreError>;

    async fn has_part(&self, job_id: &str, order: u32) -> bool;

    /// 删除任务的全部中间文件，不存在时不报错
    async fn remove_parts(&self, job_id: &str) -> Result<(), RenderStoreError>;

    /// 按给定顺序拼接为一个文件，返回字节数
    async fn write_merged(&self, job_id: &str, orders: &[u32], filename: &str) -> Result<u64, RenderStoreError>;

    /// 每章一个归档条目，条目顺序即给定顺序，返回归档字节数
    async fn write_archive(
        &self,
        job_id: &str,
        entries: Vec<(u32, String)>,
        filename: &str,
    ) -> Result<u64, RenderStoreError>;

    /// 原子写入一个独立的输出文件（单章下载），返回字节数
    async fn write_output(&self, filename: &str, data: &[u8]) -> Result<u64, RenderStoreError>;

    async fn remove_output(&self, filename: &str) -> Result<(), RenderStoreError>;

    fn output_path(&self, filename: &str) -> PathBuf;
}
