//! Worker Layer - 后台任务处理
//!
//! 实现 JobWorker，执行整书渲染任务

mod job_worker;

pub use job_worker::{JobOutcome, JobRunner, JobWorker, JobWorkerConfig};
