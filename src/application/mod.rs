//! 应用层 - 用例编排
//!
//! 包含：
//! - ports: 六边形架构端口定义（ArtifactCache、SpeechProvider、JobStore、JobQueue、BookSource、RenderStore）
//! - services: 合成网关、预取调度、并发额度
//! - commands: CQRS 命令及处理器
//! - queries: CQRS 查询及处理器
//! - error: 应用层错误定义

pub mod commands;
pub mod error;
pub mod ports;
pub mod queries;
pub mod services;

// Re-exports
pub use commands::{
    // TTS commands
    DownloadChapterCommand,
    DownloadChapterResponse,
    PositionChangedCommand,
    PrefetchCommand,
    PrefetchResponse,
    SpeakCommand,
    SpeakResponse,
    // Job commands
    CreateOrResumeJobCommand,
    CreateOrResumeJobResponse,
    DeleteJobCommand,
    DeleteJobResponse,
    // Cache commands
    ClearCacheCommand,
    ClearCacheResponse,
    // Handlers
    handlers::{
        ClearCacheHandler, CreateOrResumeJobHandler, DeleteJobHandler, DownloadChapterHandler,
        PrefetchHandler, SpeakHandler,
    },
};

pub use error::ApplicationError;

pub use ports::{
    ArtifactCachePort, BookSourceError, BookSourcePort, CacheError, CacheStats, JobQueueError,
    JobQueuePort, JobStoreError, JobStorePort, ProviderError, ProviderRequest, ProviderResponse,
    RenderStoreError, RenderStorePort, SpeechProviderPort, VoiceInfo, WordBoundary,
};

pub use queries::{
    // Job queries
    GetJobDownloadQuery,
    GetJobQuery,
    JobDownload,
    ListJobsQuery,
    // TTS queries
    ChapterDownload,
    GetArtifactAudioQuery,
    GetArtifactAudioResponse,
    GetChapterDownloadQuery,
    ListVoicesQuery,
    // Cache queries
    CachedPosition,
    GetCacheStatsQuery,
    ListCachedPositionsQuery,
    // Handlers
    handlers::{
        GetArtifactAudioHandler, GetCacheStatsHandler, GetChapterDownloadHandler,
        GetJobDownloadHandler, GetJobHandler, ListCachedPositionsHandler, ListJobsHandler,
        ListVoicesHandler,
    },
};

pub use services::{
    PrefetchScheduler, RetryPolicy, SynthesisGateway, SynthesisOutcome, SynthesisRequest,
    WorkerPool,
};
