//! Application State
//!
//! 包含所有 Command/Query Handlers 的应用状态

use std::sync::Arc;

use crate::application::{
    // Command handlers
    ClearCacheHandler, CreateOrResumeJobHandler, DeleteJobHandler, DownloadChapterHandler,
    PrefetchHandler, SpeakHandler,
    // Query handlers
    GetArtifactAudioHandler, GetCacheStatsHandler, GetChapterDownloadHandler,
    GetJobDownloadHandler, GetJobHandler, ListCachedPositionsHandler, ListJobsHandler,
    ListVoicesHandler,
    // Ports & services
    ArtifactCachePort, BookSourcePort, JobQueuePort, JobStorePort, PrefetchScheduler,
    RenderStorePort, SpeechProviderPort, SynthesisGateway,
};

/// 构建 AppState 所需的协作方
pub struct AppDependencies {
    pub gateway: Arc<SynthesisGateway>,
    pub scheduler: Arc<PrefetchScheduler>,
    pub cache: Arc<dyn ArtifactCachePort>,
    pub provider: Arc<dyn SpeechProviderPort>,
    pub store: Arc<dyn JobStorePort>,
    pub queue: Arc<dyn JobQueuePort>,
    pub books: Arc<dyn BookSourcePort>,
    pub render: Arc<dyn RenderStorePort>,
    /// 合并输出的音频类型
    pub audio_content_type: String,
    /// 合并输出的扩展名（不含点）
    pub audio_extension: String,
}

/// 应用状态
pub struct AppState {
    // ========== Ports ==========
    pub provider: Arc<dyn SpeechProviderPort>,

    // ========== Command Handlers ==========
    pub speak_handler: SpeakHandler,
    pub prefetch_handler: PrefetchHandler,
    pub download_chapter_handler: DownloadChapterHandler,
    pub create_job_handler: CreateOrResumeJobHandler,
    pub delete_job_handler: DeleteJobHandler,
    pub clear_cache_handler: ClearCacheHandler,

    // ========== Query Handlers ==========
    pub list_jobs_handler: ListJobsHandler,
    pub get_job_handler: GetJobHandler,
    pub get_job_download_handler: GetJobDownloadHandler,
    pub get_artifact_audio_handler: GetArtifactAudioHandler,
    pub get_chapter_download_handler: GetChapterDownloadHandler,
    pub list_voices_handler: ListVoicesHandler,
    pub cache_stats_handler: GetCacheStatsHandler,
    pub cached_positions_handler: ListCachedPositionsHandler,
}

impl AppState {
    /// 创建应用状态
    pub fn new(deps: AppDependencies) -> Self {
        let AppDependencies {
            gateway,
            scheduler,
            cache,
            provider,
            store,
            queue,
            books,
            render,
            audio_content_type,
            audio_extension,
        } = deps;

        Self {
            provider: provider.clone(),

            // Command handlers
            speak_handler: SpeakHandler::new(gateway.clone()),
            prefetch_handler: PrefetchHandler::new(scheduler),
            download_chapter_handler: DownloadChapterHandler::new(
                gateway,
                render.clone(),
                audio_extension.clone(),
            ),
            create_job_handler: CreateOrResumeJobHandler::new(store.clone(), queue.clone(), books),
            delete_job_handler: DeleteJobHandler::new(store.clone(), queue, render.clone()),
            clear_cache_handler: ClearCacheHandler::new(cache.clone()),

            // Query handlers
            list_jobs_handler: ListJobsHandler::new(store.clone()),
            get_job_handler: GetJobHandler::new(store.clone()),
            get_job_download_handler: GetJobDownloadHandler::new(
                store,
                render.clone(),
                audio_content_type.clone(),
            ),
            get_artifact_audio_handler: GetArtifactAudioHandler::new(cache.clone()),
            get_chapter_download_handler: GetChapterDownloadHandler::new(
                render,
                audio_extension,
                audio_content_type,
            ),
            list_voices_handler: ListVoicesHandler::new(provider),
            cache_stats_handler: GetCacheStatsHandler::new(cache.clone()),
            cached_positions_handler: ListCachedPositionsHandler::new(cache),
        }
    }
}
