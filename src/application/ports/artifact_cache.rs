//! Artifact Cache Port - 音频产物缓存
//!
//! 内容寻址：键为指纹哈希，值为不可变的 Artifact
//! 核心只追加不淘汰，淘汰由外部清理策略负责

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::speech::{Artifact, ParagraphPosition, SynthesisParams};

/// Artifact Cache 错误
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("IO error: {0}")]
    IoError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}

/// 缓存统计信息
#[derive(Debug, Clone, Default)]
pub struct CacheStats {
    pub total_entries: usize,
    pub total_size_bytes: u64,
    pub hit_count: u64,
    pub miss_count: u64,
}

/// Artifact Cache Port
///
/// 实现必须保证原子发布：读者永远看不到写了一半的产物
#[async_trait]
pub trait ArtifactCachePort: Send + Sync {
    /// 根据指纹哈希获取产物，损坏的条目视为未命中
    async fn get(&self, hash: &str) -> Result<Option<Artifact>, CacheError>;

    /// 发布产物（单次原子写入）
    async fn put(&self, artifact: &Artifact) -> Result<(), CacheError>;

    /// 检查产物是否存在（不计入命中统计）
    async fn contains(&self, hash: &str) -> Result<bool, CacheError>;

    /// 记录段落位置到指纹哈希的映射
    async fn index_position(
        &self,
        position: &ParagraphPosition,
        params: &SynthesisParams,
        hash: &str,
    ) -> Result<(), CacheError>;

    /// 按位置列出某章节已缓存的段落：(段落下标, 指纹哈希)，按下标升序
    async fn list_positions(
        &self,
        book_id: &str,
        chapter_ref: &str,
        params: &SynthesisParams,
    ) -> Result<Vec<(u32, String)>, CacheError>;

    /// 获取缓存统计信息
    async fn stats(&self) -> CacheStats;

    /// 清空缓存，返回删除的产物数量
    async fn clear(&self) -> Result<usize, CacheError>;
}
