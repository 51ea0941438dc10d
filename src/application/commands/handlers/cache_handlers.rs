//! Cache Command Handlers

use std::sync::Arc;

use crate::application::commands::cache_commands::*;
use crate::application::error::ApplicationError;
use crate::application::ports::ArtifactCachePort;

/// ClearCache Handler - 外部清理入口，核心本身从不淘汰
pub struct ClearCacheHandler {
    cache: Arc<dyn ArtifactCachePort>,
}

impl ClearCacheHandler {
    pub fn new(cache: Arc<dyn ArtifactCachePort>) -> Self {
        Self { cache }
    }

    pub async fn handle(&self, _cmd: ClearCacheCommand) -> Result<ClearCacheResponse, ApplicationError> {
        let removed = self.cache.clear().await?;
        tracing::info!(removed = removed, "Cache cleared on request");
        Ok(ClearCacheResponse { removed })
    }
}
