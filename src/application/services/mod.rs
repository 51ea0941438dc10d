//! 应用服务
//!
//! 命令处理器和后台 worker 共享的合成网关、预取调度与并发额度

mod prefetch_scheduler;
mod synthesis_gateway;
mod word_timing;
mod worker_pool;

pub use prefetch_scheduler::{PrefetchReport, PrefetchRequest, PrefetchScheduler, PrefetchTicket};
pub use synthesis_gateway::{RetryPolicy, SynthesisGateway, SynthesisOutcome, SynthesisRequest};
pub use word_timing::align_word_timings;
pub use worker_pool::WorkerPool;
