//! HTTP Handlers

mod cache;
mod job;
mod ping;
mod tts;

pub use cache::*;
pub use job::*;
pub use ping::*;
pub use tts::*;
