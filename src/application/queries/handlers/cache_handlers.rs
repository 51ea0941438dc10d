//! Cache Query Handlers

use std::sync::Arc;

use crate::application::error::ApplicationError;
use crate::application::ports::{ArtifactCachePort, CacheStats};
use crate::application::queries::cache_queries::*;

pub struct GetCacheStatsHandler {
    cache: Arc<dyn ArtifactCachePort>,
}

impl GetCacheStatsHandler {
    pub fn new(cache: Arc<dyn ArtifactCachePort>) -> Self {
        Self { cache }
    }

    pub async fn handle(&self, _query: GetCacheStatsQuery) -> Result<CacheStats, ApplicationError> {
        Ok(self.cache.stats().await)
    }
}

/// ListCachedPositions Handler - 按结构化位置列出已缓存段落
pub struct ListCachedPositionsHandler {
    cache: Arc<dyn ArtifactCachePort>,
}

impl ListCachedPositionsHandler {
    pub fn new(cache: Arc<dyn ArtifactCachePort>) -> Self {
        Self { cache }
    }

    pub async fn handle(&self, query: ListCachedPositionsQuery) -> Result<Vec<CachedPosition>, ApplicationError> {
        let positions = self
            .cache
            .list_positions(&query.book_id, &query.chapter_ref, &query.params)
            .await?;

        let mut cached = Vec::with_capacity(positions.len());
        for (paragraph_index, fingerprint) in positions {
            // 缓存被外部清理后索引可能过期
            if self.cache.contains(&fingerprint).await? {
                cached.push(CachedPosition {
                    paragraph_index,
                    fingerprint,
                });
            }
        }
        Ok(cached)
    }
}
