//! Speech Context - 语音产物限界上下文
//!
//! 职责:
//! - 合成参数与指纹计算
//! - 不可变音频产物（音频 + 逐词时间轴）

mod artifact;
mod fingerprint;

pub use artifact::{Artifact, WordTiming};
pub use fingerprint::{normalize_text, Fingerprint, ParagraphPosition, SynthesisParams};
