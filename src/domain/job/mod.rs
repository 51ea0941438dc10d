//! Job Context - 整书渲染任务限界上下文
//!
//! 职责:
//! - 任务状态机 pending → running → {completed, failed}
//! - 逐章完成标记（断点续传检查点）
//! - 进度计算

mod aggregate;
mod errors;
mod value_objects;

pub use aggregate::Job;
pub use errors::JobError;
pub use value_objects::{ChapterProgress, JobResult, JobStatus, OutputMode, TocEntry};
