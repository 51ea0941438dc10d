//! TTS Command Handlers

use std::sync::Arc;

use futures_util::stream::{self, StreamExt, TryStreamExt};

use crate::application::commands::tts_commands::*;
use crate::application::error::ApplicationError;
use crate::application::ports::RenderStorePort;
use crate::application::services::{PrefetchRequest, PrefetchScheduler, SynthesisGateway, SynthesisRequest};
use crate::domain::speech::SynthesisParams;
use crate::domain::PrefetchWindow;

/// 语速和音高必须是正的有限倍率
pub(crate) fn check_params(params: &SynthesisParams) -> Result<(), ApplicationError> {
    if params.voice.trim().is_empty() {
        return Err(ApplicationError::invalid_request("Voice is required"));
    }
    for (name, value) in [("rate", params.rate), ("pitch", params.pitch)] {
        if !value.is_finite() || value <= 0.0 {
            return Err(ApplicationError::invalid_request(format!(
                "Invalid {}: {}",
                name, value
            )));
        }
    }
    Ok(())
}

/// Speak Handler - 交互式单段合成
///
/// 每次调用都是无状态的；不占用后台并发额度
pub struct SpeakHandler {
    gateway: Arc<SynthesisGateway>,
}

impl SpeakHandler {
    pub fn new(gateway: Arc<SynthesisGateway>) -> Self {
        Self { gateway }
    }

    pub async fn handle(&self, cmd: SpeakCommand) -> Result<SpeakResponse, ApplicationError> {
        check_params(&cmd.params)?;

        let outcome = self
            .gateway
            .synthesize(SynthesisRequest::new(cmd.text, cmd.params))
            .await?;

        tracing::debug!(
            fingerprint = %outcome.artifact.fingerprint(),
            cached = outcome.cached,
            "Speak completed"
        );

        Ok(SpeakResponse {
            fingerprint: outcome.artifact.fingerprint().to_string(),
            cached: outcome.cached,
            artifact: outcome.artifact,
        })
    }
}

/// Prefetch Handler - 预取请求立即返回
pub struct PrefetchHandler {
    scheduler: Arc<PrefetchScheduler>,
}

impl PrefetchHandler {
    pub fn new(scheduler: Arc<PrefetchScheduler>) -> Self {
        Self { scheduler }
    }

    pub fn prefetch(&self, cmd: PrefetchCommand) -> Result<PrefetchResponse, ApplicationError> {
        check_params(&cmd.params)?;
        if cmd.start_index > cmd.end_index {
            return Err(ApplicationError::invalid_request(format!(
                "Invalid range: {}..{}",
                cmd.start_index, cmd.end_index
            )));
        }

        let window = PrefetchWindow::new(cmd.start_index, cmd.end_index, cmd.paragraphs.len());
        let ticket = self.scheduler.schedule(
            PrefetchRequest {
                book_id: cmd.book_id,
                chapter_ref: cmd.chapter_ref,
                paragraphs: cmd.paragraphs,
                params: cmd.params,
            },
            window,
        );

        Ok(PrefetchResponse {
            accepted: self.scheduler.is_enabled(),
            window_start: ticket.window.start,
            window_end: ticket.window.end,
            scheduled: ticket.scheduled,
        })
    }

    pub fn position_changed(&self, cmd: PositionChangedCommand) -> Result<PrefetchResponse, ApplicationError> {
        check_params(&cmd.params)?;

        let ticket = self.scheduler.on_position_changed(
            PrefetchRequest {
                book_id: cmd.book_id,
                chapter_ref: cmd.chapter_ref,
                paragraphs: cmd.paragraphs,
                params: cmd.params,
            },
            cmd.current_index,
        );

        Ok(PrefetchResponse {
            accepted: self.scheduler.is_enabled(),
            window_start: ticket.window.start,
            window_end: ticket.window.end,
            scheduled: ticket.scheduled,
        })
    }
}

/// 同时在途的句子合成数
const DOWNLOAD_CONCURRENCY: usize = 4;

/// DownloadChapter Handler - 单章音频文件
///
/// 每句经网关合成，已缓存的句子不调用 provider；文件名带随机后缀，重复下载互不覆盖
pub struct DownloadChapterHandler {
    gateway: Arc<SynthesisGateway>,
    render: Arc<dyn RenderStorePort>,
    extension: String,
}

impl DownloadChapterHandler {
    pub fn new(
        gateway: Arc<SynthesisGateway>,
        render: Arc<dyn RenderStorePort>,
        extension: impl Into<String>,
    ) -> Self {
        Self {
            gateway,
            render,
            extension: extension.into(),
        }
    }

    pub async fn handle(&self, cmd: DownloadChapterCommand) -> Result<DownloadChapterResponse, ApplicationError> {
        if cmd.sentences.is_empty() {
            return Err(ApplicationError::invalid_request("No sentences provided"));
        }
        let sentences: Vec<String> = cmd
            .sentences
            .into_iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        if sentences.is_empty() {
            return Err(ApplicationError::invalid_request("All sentences are empty"));
        }
        check_params(&cmd.params)?;
        if cmd.stem.is_empty() || cmd.stem.contains(['/', '\\']) || cmd.stem.starts_with('.') {
            return Err(ApplicationError::invalid_request(format!(
                "Invalid filename: {:?}",
                cmd.stem
            )));
        }

        let params = cmd.params;
        let outcomes: Vec<_> = stream::iter(sentences)
            .map(|text| {
                let gateway = self.gateway.clone();
                let request = SynthesisRequest::new(text, params.clone());
                async move { gateway.synthesize(request).await }
            })
            .buffered(DOWNLOAD_CONCURRENCY)
            .try_collect()
            .await?;

        let cached_sentences = outcomes.iter().filter(|o| o.cached).count();
        let audio: Vec<u8> = outcomes
            .iter()
            .flat_map(|o| o.artifact.audio().iter().copied())
            .collect();

        let suffix = uuid::Uuid::new_v4().simple().to_string();
        let filename = format!("{}-{}.{}", cmd.stem, &suffix[..8], self.extension);
        let size_bytes = self.render.write_output(&filename, &audio).await?;

        tracing::info!(
            filename = %filename,
            sentences = outcomes.len(),
            cached = cached_sentences,
            size_bytes = size_bytes,
            "Chapter download rendered"
        );

        Ok(DownloadChapterResponse {
            filename,
            size_bytes,
            cached_sentences,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::services::{RetryPolicy, WorkerPool};
    use crate::domain::WindowConfig;
    use crate::infrastructure::adapters::storage::RenderStorage;
    use crate::infrastructure::adapters::tts::FakeSpeechProvider;
    use crate::infrastructure::persistence::SledArtifactCache;
    use tempfile::tempdir;

    #[test]
    fn test_check_params() {
        assert!(check_params(&SynthesisParams::new("v", 1.0, 1.0)).is_ok());
        assert!(check_params(&SynthesisParams::new(" ", 1.0, 1.0)).is_err());
        assert!(check_params(&SynthesisParams::new("v", 0.0, 1.0)).is_err());
        assert!(check_params(&SynthesisParams::new("v", 1.0, f32::NAN)).is_err());
    }

    #[tokio::test]
    async fn test_speak_then_prefetch_same_paragraph() {
        let dir = tempdir().unwrap();
        let provider = FakeSpeechProvider::default().arc();
        let cache = Arc::new(SledArtifactCache::open(dir.path().join("cache.sled")).unwrap());
        let gateway = Arc::new(SynthesisGateway::new(provider.clone(), cache, RetryPolicy::default()));
        let scheduler = Arc::new(PrefetchScheduler::new(
            gateway.clone(),
            WorkerPool::new(1, 1).arc(),
            WindowConfig::new(0, 1),
            true,
        ));

        let speak = SpeakHandler::new(gateway);
        let params = SynthesisParams::new("en-US-AriaNeural", 1.0, 1.0);
        let spoken = speak
            .handle(SpeakCommand {
                text: "First paragraph.".to_string(),
                params: params.clone(),
            })
            .await
            .unwrap();
        assert!(!spoken.cached);
        assert_eq!(spoken.word_timings().len(), 2);

        let prefetch = PrefetchHandler::new(scheduler);
        let response = prefetch
            .prefetch(PrefetchCommand {
                book_id: "book".to_string(),
                chapter_ref: "ch1".to_string(),
                paragraphs: vec!["First paragraph.".to_string(), "Second.".to_string()],
                params,
                start_index: 0,
                end_index: 10,
            })
            .unwrap();
        assert!(response.accepted);
        assert_eq!((response.window_start, response.window_end), (0, 2));
        assert_eq!(response.scheduled, 2);
    }

    #[tokio::test]
    async fn test_download_chapter_keeps_sentence_order() {
        let dir = tempdir().unwrap();
        let provider = FakeSpeechProvider::default().arc();
        let cache = Arc::new(SledArtifactCache::open(dir.path().join("cache.sled")).unwrap());
        let gateway = Arc::new(SynthesisGateway::new(provider.clone(), cache, RetryPolicy::default()));
        let render = Arc::new(
            RenderStorage::new(dir.path().join("work"), dir.path().join("output"))
                .await
                .unwrap(),
        );
        let params = SynthesisParams::new("en-US-AriaNeural", 1.0, 1.0);

        SpeakHandler::new(gateway.clone())
            .handle(SpeakCommand {
                text: "Second.".to_string(),
                params: params.clone(),
            })
            .await
            .unwrap();
        assert_eq!(provider.call_count(), 1);

        let download = DownloadChapterHandler::new(gateway, render.clone(), "mp3");
        let result = download
            .handle(DownloadChapterCommand {
                sentences: vec![
                    "First.".to_string(),
                    "  ".to_string(),
                    " Second. ".to_string(),
                    "Third.".to_string(),
                ],
                params: params.clone(),
                stem: "Chapter 1".to_string(),
            })
            .await
            .unwrap();

        // 已缓存的句子不再调用 provider
        assert_eq!(provider.call_count(), 3);
        assert_eq!(result.cached_sentences, 1);
        assert!(result.filename.starts_with("Chapter 1-"));
        assert!(result.filename.ends_with(".mp3"));

        let audio = tokio::fs::read(render.output_path(&result.filename)).await.unwrap();
        let expected = [
            "en-US-AriaNeural|1.000|1.000|First.",
            "en-US-AriaNeural|1.000|1.000|Second.",
            "en-US-AriaNeural|1.000|1.000|Third.",
        ]
        .concat();
        assert_eq!(audio, expected.as_bytes());
        assert_eq!(result.size_bytes, expected.len() as u64);

        let empty = download
            .handle(DownloadChapterCommand {
                sentences: vec![" ".to_string(), String::new()],
                params,
                stem: "Chapter 1".to_string(),
            })
            .await;
        assert!(matches!(empty, Err(ApplicationError::InvalidRequest(_))));
        assert_eq!(provider.call_count(), 3);
    }
}
