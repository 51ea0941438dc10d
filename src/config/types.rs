//! Configuration Types
//!
//! 定义所有配置结构体

use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use crate::application::RetryPolicy;
use crate::domain::WindowConfig;

/// 应用主配置
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    /// 服务器配置
    #[serde(default)]
    pub server: ServerConfig,

    /// 语音合成服务配置
    #[serde(default)]
    pub tts: TtsConfig,

    /// 存储目录配置
    #[serde(default)]
    pub storage: StorageConfig,

    /// 数据库配置
    #[serde(default)]
    pub database: DatabaseConfig,

    /// 整书渲染 worker 配置
    #[serde(default)]
    pub worker: WorkerConfig,

    /// 预取配置
    #[serde(default)]
    pub prefetch: PrefetchConfig,

    /// 输出音频配置
    #[serde(default)]
    pub audio: AudioConfig,

    /// 日志配置
    #[serde(default)]
    pub log: LogConfig,
}

/// 服务器配置
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// 监听地址
    #[serde(default = "default_host")]
    pub host: String,

    /// 监听端口
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5070
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl ServerConfig {
    /// 获取服务器地址
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Provider 类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// 通过 HTTP 调用外部合成服务
    #[default]
    Http,
    /// 本地确定性音频，不访问网络
    Fake,
}

/// 语音合成服务配置
#[derive(Debug, Clone, Deserialize)]
pub struct TtsConfig {
    #[serde(default)]
    pub provider: ProviderKind,

    /// 合成服务基础 URL
    #[serde(default = "default_tts_url")]
    pub url: String,

    #[serde(default)]
    pub api_key: Option<String>,

    /// 单次调用超时时间（秒）
    #[serde(default = "default_tts_timeout")]
    pub timeout_secs: u64,

    /// 瞬时错误的最大重试次数
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_retry_base_delay")]
    pub retry_base_delay_ms: u64,

    #[serde(default = "default_retry_max_delay")]
    pub retry_max_delay_ms: u64,
}

fn default_tts_url() -> String {
    "http://localhost:5050".to_string()
}

fn default_tts_timeout() -> u64 {
    60
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_base_delay() -> u64 {
    500
}

fn default_retry_max_delay() -> u64 {
    8000
}

impl Default for TtsConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::default(),
            url: default_tts_url(),
            api_key: None,
            timeout_secs: default_tts_timeout(),
            max_retries: default_max_retries(),
            retry_base_delay_ms: default_retry_base_delay(),
            retry_max_delay_ms: default_retry_max_delay(),
        }
    }
}

impl TtsConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            call_timeout: Duration::from_secs(self.timeout_secs),
            base_delay: Duration::from_millis(self.retry_base_delay_ms),
            max_delay: Duration::from_millis(self.retry_max_delay_ms),
        }
    }
}

/// 存储目录配置
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// 产物缓存（sled）目录
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,

    /// 任务最终产物目录
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// 章节分片工作目录
    #[serde(default = "default_work_dir")]
    pub work_dir: PathBuf,

    /// 书籍目录，每本书一个 `{book_id}/book.json`
    #[serde(default = "default_books_dir")]
    pub books_dir: PathBuf,
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from("data/cache")
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("data/output")
}

fn default_work_dir() -> PathBuf {
    PathBuf::from("data/work")
}

fn default_books_dir() -> PathBuf {
    PathBuf::from("data/books")
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            cache_dir: default_cache_dir(),
            output_dir: default_output_dir(),
            work_dir: default_work_dir(),
            books_dir: default_books_dir(),
        }
    }
}

impl StorageConfig {
    pub fn cache_db_path(&self) -> PathBuf {
        self.cache_dir.join("artifacts.sled")
    }
}

/// 数据库配置
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// 数据库文件路径
    #[serde(default = "default_db_path")]
    pub path: String,

    /// 最大连接数
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_db_path() -> String {
    "data/bookvoice.db".to_string()
}

fn default_max_connections() -> u32 {
    5
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            max_connections: default_max_connections(),
        }
    }
}

impl DatabaseConfig {
    /// 获取数据库 URL
    pub fn database_url(&self) -> String {
        format!("sqlite:{}?mode=rwc", self.path)
    }
}

/// 整书渲染 worker 配置
#[derive(Debug, Clone, Deserialize)]
pub struct WorkerConfig {
    /// 同时运行的任务数
    #[serde(default = "default_max_concurrent_jobs")]
    pub max_concurrent_jobs: usize,

    /// 单章内并发合成的段落数
    #[serde(default = "default_paragraph_concurrency")]
    pub paragraph_concurrency: usize,

    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// 启动时重新入队未完成的任务
    #[serde(default = "default_true")]
    pub resume_on_startup: bool,
}

fn default_max_concurrent_jobs() -> usize {
    2
}

fn default_paragraph_concurrency() -> usize {
    4
}

fn default_queue_capacity() -> usize {
    256
}

fn default_true() -> bool {
    true
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: default_max_concurrent_jobs(),
            paragraph_concurrency: default_paragraph_concurrency(),
            queue_capacity: default_queue_capacity(),
            resume_on_startup: true,
        }
    }
}

/// 预取配置
#[derive(Debug, Clone, Deserialize)]
pub struct PrefetchConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// 当前位置之前的段数
    #[serde(default = "default_behind")]
    pub behind: usize,

    /// 当前位置之后的段数
    #[serde(default = "default_ahead")]
    pub ahead: usize,

    /// 后台预热同时进行的 provider 调用数
    #[serde(default = "default_prefetch_concurrency")]
    pub max_concurrent: usize,
}

fn default_behind() -> usize {
    1
}

fn default_ahead() -> usize {
    3
}

fn default_prefetch_concurrency() -> usize {
    2
}

impl Default for PrefetchConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            behind: default_behind(),
            ahead: default_ahead(),
            max_concurrent: default_prefetch_concurrency(),
        }
    }
}

impl PrefetchConfig {
    pub fn window(&self) -> WindowConfig {
        WindowConfig::new(self.behind, self.ahead)
    }
}

/// 输出音频配置
///
/// provider 返回的音频按字节拼接，扩展名和类型需与 provider 输出一致
#[derive(Debug, Clone, Deserialize)]
pub struct AudioConfig {
    #[serde(default = "default_extension")]
    pub extension: String,

    #[serde(default = "default_content_type")]
    pub content_type: String,
}

fn default_extension() -> String {
    "mp3".to_string()
}

fn default_content_type() -> String {
    "audio/mpeg".to_string()
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            extension: default_extension(),
            content_type: default_content_type(),
        }
    }
}

/// 日志配置
#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    /// 日志级别
    #[serde(default = "default_log_level")]
    pub level: String,

    /// 是否启用 JSON 格式
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}
