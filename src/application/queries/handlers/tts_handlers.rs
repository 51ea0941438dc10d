//! TTS Query Handlers

use std::sync::Arc;

use crate::application::error::ApplicationError;
use crate::application::ports::{ArtifactCachePort, RenderStorePort, SpeechProviderPort, VoiceInfo};
use crate::application::queries::tts_queries::*;

/// GetArtifactAudio Handler - 指纹对应的音频字节
pub struct GetArtifactAudioHandler {
    cache: Arc<dyn ArtifactCachePort>,
}

impl GetArtifactAudioHandler {
    pub fn new(cache: Arc<dyn ArtifactCachePort>) -> Self {
        Self { cache }
    }

    pub async fn handle(&self, query: GetArtifactAudioQuery) -> Result<GetArtifactAudioResponse, ApplicationError> {
        let artifact = self
            .cache
            .get(&query.fingerprint)
            .await?
            .ok_or_else(|| ApplicationError::not_found("Audio", &query.fingerprint))?;

        Ok(GetArtifactAudioResponse {
            content_type: artifact.content_type().to_string(),
            audio_data: artifact.audio().to_vec(),
        })
    }
}

/// ListVoices Handler
pub struct ListVoicesHandler {
    provider: Arc<dyn SpeechProviderPort>,
}

impl ListVoicesHandler {
    pub fn new(provider: Arc<dyn SpeechProviderPort>) -> Self {
        Self { provider }
    }

    pub async fn handle(&self, query: ListVoicesQuery) -> Result<Vec<VoiceInfo>, ApplicationError> {
        let voices = self
            .provider
            .list_voices()
            .await
            .map_err(|e| ApplicationError::Provider {
                attempts: 1,
                message: e.to_string(),
            })?;

        let Some(lang) = query.lang.filter(|l| !l.trim().is_empty()) else {
            return Ok(voices);
        };
        let lang = lang.trim().to_lowercase();

        Ok(voices
            .into_iter()
            .filter(|v| v.locale.to_lowercase().starts_with(&lang))
            .collect())
    }
}

/// GetChapterDownload Handler - 只提供输出目录下的单章音频文件
pub struct GetChapterDownloadHandler {
    render: Arc<dyn RenderStorePort>,
    extension: String,
    content_type: String,
}

impl GetChapterDownloadHandler {
    pub fn new(
        render: Arc<dyn RenderStorePort>,
        extension: impl Into<String>,
        content_type: impl Into<String>,
    ) -> Self {
        Self {
            render,
            extension: extension.into(),
            content_type: content_type.into(),
        }
    }

    fn is_servable(&self, filename: &str) -> bool {
        !filename.starts_with('.')
            && !filename.contains(['/', '\\'])
            && filename
                .strip_suffix(self.extension.as_str())
                .and_then(|stem| stem.strip_suffix('.'))
                .is_some_and(|stem| !stem.is_empty())
    }

    pub async fn handle(&self, query: GetChapterDownloadQuery) -> Result<ChapterDownload, ApplicationError> {
        if !self.is_servable(&query.filename) {
            return Err(ApplicationError::not_found("Chapter download", &query.filename));
        }

        let path = self.render.output_path(&query.filename);
        let size_bytes = tokio::fs::metadata(&path)
            .await
            .map(|m| m.len())
            .map_err(|_| ApplicationError::not_found("Chapter download", &query.filename))?;

        Ok(ChapterDownload {
            path,
            size_bytes,
            content_type: self.content_type.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::adapters::storage::RenderStorage;
    use crate::infrastructure::adapters::tts::FakeSpeechProvider;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_chapter_download_rejects_paths_outside_output() {
        let dir = tempdir().unwrap();
        let render = Arc::new(
            RenderStorage::new(dir.path().join("work"), dir.path().join("output"))
                .await
                .unwrap(),
        );
        render.write_output("Chapter 1-0123abcd.mp3", b"audio").await.unwrap();
        let handler = GetChapterDownloadHandler::new(render, "mp3", "audio/mpeg");

        let found = handler
            .handle(GetChapterDownloadQuery {
                filename: "Chapter 1-0123abcd.mp3".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(found.size_bytes, 5);
        assert_eq!(found.content_type, "audio/mpeg");

        for filename in ["../cache.sled", "..", ".mp3", "a/b.mp3", "book.zip", "missing.mp3"] {
            let result = handler
                .handle(GetChapterDownloadQuery {
                    filename: filename.to_string(),
                })
                .await;
            assert!(
                matches!(result, Err(ApplicationError::NotFound { .. })),
                "{filename} should not be served"
            );
        }
    }

    #[tokio::test]
    async fn test_voices_filtered_by_locale_prefix() {
        let handler = ListVoicesHandler::new(FakeSpeechProvider::default().arc());

        let all = handler.handle(ListVoicesQuery::default()).await.unwrap();
        let english = handler
            .handle(ListVoicesQuery {
                lang: Some("EN".to_string()),
            })
            .await
            .unwrap();
        let chinese = handler
            .handle(ListVoicesQuery {
                lang: Some("zh-CN".to_string()),
            })
            .await
            .unwrap();

        assert_eq!(all.len(), 3);
        assert_eq!(english.len(), 2);
        assert_eq!(chinese.len(), 1);
        assert_eq!(chinese[0].name, "zh-CN-XiaoxiaoNeural");
    }
}
