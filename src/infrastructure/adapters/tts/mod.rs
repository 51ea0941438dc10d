//! TTS Adapter - 语音合成服务实现

mod fake_speech_provider;
mod http_speech_provider;

pub use fake_speech_provider::{FakeSpeechProvider, FakeSpeechProviderConfig};
pub use http_speech_provider::{format_pitch, format_rate, HttpSpeechProvider, HttpSpeechProviderConfig};
