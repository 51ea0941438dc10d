//! Bookvoice - 有声书语音合成网关
//!
//! 启动流程：配置 → 日志 → 存储 → 合成网关 → 后台 worker → HTTP 服务

use std::sync::Arc;

use bookvoice::application::{
    PrefetchScheduler, SpeechProviderPort, SynthesisGateway, WorkerPool,
};
use bookvoice::config::{load_config, print_config, AppConfig, ProviderKind};
use bookvoice::infrastructure::adapters::{
    FakeSpeechProvider, FakeSpeechProviderConfig, HttpSpeechProvider, HttpSpeechProviderConfig,
    JsonBookSource, RenderStorage,
};
use bookvoice::infrastructure::http::{AppDependencies, AppState, HttpServer};
use bookvoice::infrastructure::memory::InMemoryJobQueue;
use bookvoice::infrastructure::persistence::sled::SledArtifactCache;
use bookvoice::infrastructure::persistence::sqlite::{
    create_pool, run_migrations, DatabaseConfig, SqliteJobStore,
};
use bookvoice::infrastructure::worker::{JobRunner, JobWorker, JobWorkerConfig};

fn init_tracing(config: &AppConfig) {
    let log_filter = format!(
        "{},bookvoice={},tower_http=debug",
        config.log.level, config.log.level
    );
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_filter));

    if config.log.json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

fn build_provider(config: &AppConfig) -> anyhow::Result<Arc<dyn SpeechProviderPort>> {
    let provider: Arc<dyn SpeechProviderPort> = match config.tts.provider {
        ProviderKind::Http => {
            let mut provider_config = HttpSpeechProviderConfig::new(&config.tts.url)
                .with_timeout(config.tts.timeout_secs);
            if let Some(key) = &config.tts.api_key {
                provider_config = provider_config.with_api_key(key);
            }
            provider_config.default_content_type = config.audio.content_type.clone();
            Arc::new(HttpSpeechProvider::new(provider_config)?)
        }
        ProviderKind::Fake => {
            tracing::warn!("Using fake speech provider, audio is synthetic");
            Arc::new(FakeSpeechProvider::new(FakeSpeechProviderConfig {
                content_type: config.audio.content_type.clone(),
                ..Default::default()
            }))
        }
    };
    Ok(provider)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 加载配置（优先级：环境变量 > 配置文件 > 默认值）
    let config = load_config().map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))?;

    init_tracing(&config);

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "Bookvoice starting");
    print_config(&config);

    // 确保数据目录存在
    tokio::fs::create_dir_all(&config.storage.cache_dir).await?;
    tokio::fs::create_dir_all(&config.storage.books_dir).await?;
    if let Some(parent) = std::path::Path::new(&config.database.path).parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    // 任务元数据
    let db_config = DatabaseConfig {
        database_url: config.database.database_url(),
        max_connections: config.database.max_connections,
    };
    let pool = create_pool(&db_config).await?;
    run_migrations(&pool).await?;
    let store = Arc::new(SqliteJobStore::new(pool));

    // 合成网关
    let provider = build_provider(&config)?;
    let cache = Arc::new(SledArtifactCache::open(config.storage.cache_db_path())?);
    let gateway = Arc::new(SynthesisGateway::new(
        provider.clone(),
        cache.clone(),
        config.tts.retry_policy(),
    ));

    let worker_pool =
        WorkerPool::new(config.worker.max_concurrent_jobs, config.prefetch.max_concurrent).arc();
    let scheduler = Arc::new(PrefetchScheduler::new(
        gateway.clone(),
        worker_pool.clone(),
        config.prefetch.window(),
        config.prefetch.enabled,
    ));

    let (queue, queue_receiver) = InMemoryJobQueue::channel(config.worker.queue_capacity);
    let queue = queue.arc();
    let books = Arc::new(JsonBookSource::new(&config.storage.books_dir));
    let render = Arc::new(
        RenderStorage::new(&config.storage.work_dir, &config.storage.output_dir).await?,
    );

    // 后台渲染
    let runner = JobRunner::new(
        JobWorkerConfig {
            paragraph_concurrency: config.worker.paragraph_concurrency,
            audio_extension: config.audio.extension.clone(),
        },
        store.clone(),
        queue.clone(),
        books.clone(),
        gateway.clone(),
        render.clone(),
    );

    if config.worker.resume_on_startup {
        if let Err(e) = runner.recover().await {
            tracing::error!(error = %e, "Failed to resume interrupted jobs");
        }
    }

    let worker = JobWorker::new(queue_receiver, runner, worker_pool);
    tokio::spawn(worker.run());

    // HTTP 服务
    let state = AppState::new(AppDependencies {
        gateway,
        scheduler,
        cache,
        provider,
        store,
        queue,
        books,
        render,
        audio_content_type: config.audio.content_type.clone(),
        audio_extension: config.audio.extension.clone(),
    });

    let server = HttpServer::new(&config.server, state);

    server
        .run_with_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for ctrl-c");
                std::future::pending::<()>().await;
            }
            tracing::info!("Received shutdown signal");
        })
        .await?;

    tracing::info!("Server shutdown complete");

    Ok(())
}
