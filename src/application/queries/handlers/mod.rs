//! Query Handlers 实现
//!
//! 所有 QueryHandler 的具体实现

mod cache_handlers;
mod job_handlers;
mod tts_handlers;

pub use cache_handlers::*;
pub use job_handlers::*;
pub use tts_handlers::*;
