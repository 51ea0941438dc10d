//! Configuration Loader
//!
//! 实现多源配置加载与合并逻辑
//!
//! 优先级（从高到低）：
//! 1. 环境变量
//! 2. 配置文件（config.toml）
//! 3. 默认值

use config::{Config, ConfigError as ConfigCrateError, Environment, File};
use std::path::Path;
use thiserror::Error;

use super::types::{AppConfig, ProviderKind};

/// 配置加载错误
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadError(String),

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

impl From<ConfigCrateError> for ConfigError {
    fn from(err: ConfigCrateError) -> Self {
        ConfigError::LoadError(err.to_string())
    }
}

/// 配置文件搜索路径
const CONFIG_FILE_NAMES: &[&str] = &["config", "config.local"];

/// 环境变量前缀
const ENV_PREFIX: &str = "BOOKVOICE";

/// 加载应用配置
///
/// # 环境变量示例
/// - `BOOKVOICE_SERVER__PORT=8080`
/// - `BOOKVOICE_TTS__URL=http://tts-server:5050`
/// - `BOOKVOICE_TTS__PROVIDER=fake`
/// - `BOOKVOICE_WORKER__MAX_CONCURRENT_JOBS=4`
pub fn load_config() -> Result<AppConfig, ConfigError> {
    load_config_from_path(None)
}

/// 从指定路径加载配置，None 时搜索默认配置文件
pub fn load_config_from_path(config_path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    let mut builder = Config::builder();

    if let Some(path) = config_path {
        builder = builder.add_source(File::from(path).required(true));
    } else {
        for name in CONFIG_FILE_NAMES {
            builder = builder.add_source(File::with_name(name).required(false));
        }
    }

    // 层级分隔符为双下划线，例如 BOOKVOICE_PREFETCH__AHEAD=5
    builder = builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true),
    );

    // 缺省字段由各结构体的 serde default 补齐
    let config = builder.build()?;
    let app_config: AppConfig = config.try_deserialize().map_err(|e| {
        ConfigError::ParseError(format!("Failed to deserialize config: {}", e))
    })?;

    validate_config(&app_config)?;

    Ok(app_config)
}

/// 验证配置有效性
fn validate_config(config: &AppConfig) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "Server port cannot be 0".to_string(),
        ));
    }

    if config.tts.provider == ProviderKind::Http && config.tts.url.is_empty() {
        return Err(ConfigError::ValidationError(
            "TTS URL cannot be empty".to_string(),
        ));
    }

    if config.tts.timeout_secs == 0 {
        return Err(ConfigError::ValidationError(
            "TTS timeout cannot be 0".to_string(),
        ));
    }

    if config.tts.retry_base_delay_ms > config.tts.retry_max_delay_ms {
        return Err(ConfigError::ValidationError(
            "Retry base delay cannot exceed max delay".to_string(),
        ));
    }

    if config.database.path.is_empty() {
        return Err(ConfigError::ValidationError(
            "Database path cannot be empty".to_string(),
        ));
    }

    let worker = &config.worker;
    if worker.max_concurrent_jobs == 0 || worker.paragraph_concurrency == 0 || worker.queue_capacity == 0 {
        return Err(ConfigError::ValidationError(
            "Worker concurrency and queue capacity must be positive".to_string(),
        ));
    }

    if config.prefetch.enabled && config.prefetch.max_concurrent == 0 {
        return Err(ConfigError::ValidationError(
            "Prefetch concurrency cannot be 0 when prefetch is enabled".to_string(),
        ));
    }

    if config.audio.extension.is_empty() || config.audio.extension.contains(['.', '/']) {
        return Err(ConfigError::ValidationError(format!(
            "Invalid audio extension: {:?}",
            config.audio.extension
        )));
    }

    Ok(())
}

/// 打印配置信息（用于启动时日志）
pub fn print_config(config: &AppConfig) {
    tracing::info!(
        addr = %config.server.addr(),
        "Server"
    );
    tracing::info!(
        provider = ?config.tts.provider,
        url = %config.tts.url,
        timeout_secs = config.tts.timeout_secs,
        max_retries = config.tts.max_retries,
        "Speech provider"
    );
    tracing::info!(
        cache_dir = %config.storage.cache_dir.display(),
        output_dir = %config.storage.output_dir.display(),
        work_dir = %config.storage.work_dir.display(),
        books_dir = %config.storage.books_dir.display(),
        database = %config.database.path,
        "Storage"
    );
    tracing::info!(
        max_concurrent_jobs = config.worker.max_concurrent_jobs,
        paragraph_concurrency = config.worker.paragraph_concurrency,
        resume_on_startup = config.worker.resume_on_startup,
        "Job worker"
    );
    tracing::info!(
        enabled = config.prefetch.enabled,
        behind = config.prefetch.behind,
        ahead = config.prefetch.ahead,
        max_concurrent = config.prefetch.max_concurrent,
        "Prefetch"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_validation_passes_for_valid_config() {
        let config = AppConfig::default();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_validation_error_for_zero_port() {
        let mut config = AppConfig::default();
        config.server.port = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_empty_url_allowed_for_fake_provider() {
        let mut config = AppConfig::default();
        config.tts.url = String::new();
        assert!(validate_config(&config).is_err());
        config.tts.provider = ProviderKind::Fake;
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_validation_error_for_zero_concurrency() {
        let mut config = AppConfig::default();
        config.worker.paragraph_concurrency = 0;
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn test_validation_error_for_bad_extension() {
        let mut config = AppConfig::default();
        config.audio.extension = ".mp3".to_string();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_load_from_file_fills_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "[tts]\nprovider = \"fake\"\n\n[prefetch]\nahead = 5\n\n[worker]\nmax_concurrent_jobs = 1"
        )
        .unwrap();

        let config = load_config_from_path(Some(file.path())).unwrap();
        assert_eq!(config.tts.provider, ProviderKind::Fake);
        assert_eq!(config.prefetch.ahead, 5);
        assert_eq!(config.prefetch.behind, 1);
        assert_eq!(config.worker.max_concurrent_jobs, 1);
        assert_eq!(config.worker.paragraph_concurrency, 4);
        assert_eq!(config.server.port, 5070);
    }
}
