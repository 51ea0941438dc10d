//! SQLite Database - 数据库连接和迁移

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Pool, Sqlite};

/// 数据库配置
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// 连接 URL，例如 `sqlite:data/bookvoice.db?mode=rwc`
    pub database_url: String,
    pub max_connections: u32,
}

impl DatabaseConfig {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            database_url: format!("sqlite:{}?mode=rwc", path.as_ref().display()),
            max_connections: 5,
        }
    }

    /// 单连接内存库，连接关闭即丢失
    pub fn in_memory() -> Self {
        Self {
            database_url: "sqlite::memory:".to_string(),
            max_connections: 1,
        }
    }

    fn is_in_memory(&self) -> bool {
        self.database_url.contains(":memory:")
    }
}

/// 数据库连接池
pub type DbPool = Pool<Sqlite>;

/// 创建数据库连接池
///
/// 每个连接：WAL（内存库除外）、busy_timeout=5s、synchronous=NORMAL
pub async fn create_pool(config: &DatabaseConfig) -> Result<DbPool, sqlx::Error> {
    let mut options = SqliteConnectOptions::from_str(&config.database_url)?
        .busy_timeout(Duration::from_secs(5))
        .synchronous(SqliteSynchronous::Normal);
    if !config.is_in_memory() {
        options = options.journal_mode(SqliteJournalMode::Wal);
    }

    let pool = SqlitePoolOptions::new()
        .max_connections(config.max_connections.max(1))
        .connect_with(options)
        .await?;

    tracing::info!(
        database_url = %config.database_url,
        max_connections = config.max_connections,
        "SQLite pool created"
    );

    Ok(pool)
}

/// 运行数据库迁移
pub async fn run_migrations(pool: &DbPool) -> Result<(), sqlx::Error> {
    // 创建 jobs 表
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS jobs (
            id TEXT PRIMARY KEY,
            book_id TEXT NOT NULL,
            book_title TEXT NOT NULL,
            voice TEXT NOT NULL,
            rate REAL NOT NULL,
            pitch REAL NOT NULL,
            mode TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'pending',
            progress INTEGER NOT NULL DEFAULT 0,
            progress_text TEXT NOT NULL DEFAULT '',
            created_at TEXT NOT NULL,
            started_at TEXT,
            completed_at TEXT,
            result_json TEXT,
            error_message TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    // 创建 job_chapters 表（断点续传检查点）
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS job_chapters (
            job_id TEXT NOT NULL,
            chapter_order INTEGER NOT NULL,
            chapter_ref TEXT NOT NULL,
            title TEXT NOT NULL,
            completed INTEGER NOT NULL DEFAULT 0,
            PRIMARY KEY (job_id, chapter_order),
            FOREIGN KEY (job_id) REFERENCES jobs(id) ON DELETE CASCADE
        )
        "#,
    )
    .execute(pool)
    .await?;

    // 同一元组最多一个未完成任务
    sqlx::query(
        r#"
        CREATE UNIQUE INDEX IF NOT EXISTS idx_jobs_incomplete_tuple
        ON jobs(book_id, voice, rate, pitch, mode)
        WHERE status != 'completed'
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_jobs_status
        ON jobs(status)
        "#,
    )
    .execute(pool)
    .await?;

    tracing::info!("Database migrations completed");
    Ok(())
}
