//! Cache Commands

/// 清空产物缓存
#[derive(Debug, Clone, Default)]
pub struct ClearCacheCommand;

#[derive(Debug, Clone)]
pub struct ClearCacheResponse {
    pub removed: usize,
}
