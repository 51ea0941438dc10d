//! Application Ports - 出站端口定义
//!
//! 定义应用层与基础设施层的抽象接口

mod artifact_cache;
mod book_source;
mod job_queue;
mod job_store;
mod render_store;
mod speech_provider;

pub use artifact_cache::{ArtifactCachePort, CacheError, CacheStats};
pub use book_source::{BookSourceError, BookSourcePort};
pub use job_queue::{JobQueueError, JobQueuePort};
pub use job_store::{JobStoreError, JobStorePort};
pub use render_store::{RenderStoreError, RenderStorePort};
pub use speech_provider::{
    ProviderError, ProviderRequest, ProviderResponse, SpeechProviderPort, VoiceInfo,
    WordBoundary, TICKS_PER_MS,
};
