//! Domain Layer - 领域层
//!
//! 包含两个限界上下文:
//! - Speech Context: 合成指纹与音频产物
//! - Job Context: 整书渲染任务
//!
//! 以及播放期间的预取窗口计算

pub mod job;
pub mod speech;

mod prefetch;

pub use prefetch::{PrefetchWindow, WindowConfig};
