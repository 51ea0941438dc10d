//! Bookvoice - 有声书语音合成网关
//!
//! 架构设计: DDD + CQRS + Hexagonal Architecture
//!
//! 领域层 (domain/):
//! - Speech Context: 合成指纹、音频产物
//! - Job Context: 整书渲染任务及章节进度
//! - Prefetch: 播放位置附近的预取窗口
//!
//! 应用层 (application/):
//! - Ports: ArtifactCache, SpeechProvider, JobStore, JobQueue, BookSource, RenderStore
//! - Services: SynthesisGateway（去重合成）、PrefetchScheduler、WorkerPool
//! - Commands / Queries: CQRS 处理器
//!
//! 基础设施层 (infrastructure/):
//! - HTTP: RESTful API
//! - Memory: 任务队列与取消标记
//! - Worker: JobWorker 后台渲染
//! - Persistence: SQLite + Sled 存储
//! - Adapters: Speech Provider, Book Source, Render Storage

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use config::{load_config, AppConfig};
