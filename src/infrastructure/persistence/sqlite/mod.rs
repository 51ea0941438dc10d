//! SQLite Persistence - 任务元数据持久化

mod database;
mod job_store;

pub use database::*;
pub use job_store::SqliteJobStore;
