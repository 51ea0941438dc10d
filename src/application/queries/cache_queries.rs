//! Cache Queries

use crate::domain::speech::SynthesisParams;

#[derive(Debug, Clone, Default)]
pub struct GetCacheStatsQuery;

/// 列出某章已缓存的段落
#[derive(Debug, Clone)]
pub struct ListCachedPositionsQuery {
    pub book_id: String,
    pub chapter_ref: String,
    pub params: SynthesisParams,
}

#[derive(Debug, Clone)]
pub struct CachedPosition {
    pub paragraph_index: u32,
    pub fingerprint: String,
}
