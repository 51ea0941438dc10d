//! Persistence Layer - 数据持久化
//!
//! SQLite 保存任务元数据，Sled 保存音频产物

pub mod sled;
pub mod sqlite;

pub use self::sled::SledArtifactCache;
pub use self::sqlite::SqliteJobStore;
