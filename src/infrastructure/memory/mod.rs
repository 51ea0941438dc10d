//! Memory Layer - In-Memory State Management
//!
//! 运行中任务的调度队列与取消标记

mod job_queue;

pub use job_queue::InMemoryJobQueue;
