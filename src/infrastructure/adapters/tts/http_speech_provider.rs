//! HTTP Speech Provider - 调用外部语音合成 HTTP 服务
//!
//! 外部 API:
//! POST {base_url}/api/synthesize
//! Request: {"text": "...", "voice": "en-US-AriaNeural", "rate": "+0%", "pitch": "+0Hz"}
//! Response: {"audio": "<base64>", "content_type": "audio/mpeg",
//!            "boundaries": [{"text": "...", "offset": 1000000, "duration": 2500000}]}
//! GET {base_url}/api/voices
//! Response: [{"name": "...", "gender": "...", "locale": "..."}]

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::application::ports::{
    ProviderError, ProviderRequest, ProviderResponse, SpeechProviderPort, VoiceInfo, WordBoundary,
};

/// 合成请求体 (JSON)
#[derive(Debug, Serialize)]
struct SynthesizeHttpRequest<'a> {
    text: &'a str,
    voice: &'a str,
    /// 相对语速，如 "+25%"
    rate: String,
    /// 相对音高，如 "-10Hz"
    pitch: String,
}

#[derive(Debug, Deserialize)]
struct SynthesizeHttpResponse {
    audio: String,
    #[serde(default)]
    content_type: Option<String>,
    #[serde(default)]
    boundaries: Vec<BoundaryHttpEvent>,
}

/// 词边界事件，偏移单位为 100ns tick
#[derive(Debug, Deserialize)]
struct BoundaryHttpEvent {
    text: String,
    offset: u64,
    duration: u64,
}

#[derive(Debug, Deserialize)]
struct VoiceHttpEntry {
    #[serde(alias = "ShortName")]
    name: String,
    #[serde(default, alias = "Gender")]
    gender: String,
    #[serde(default, alias = "Locale")]
    locale: String,
}

/// 倍率 1.0 → "+0%"，1.5 → "+50%"
pub fn format_rate(rate: f32) -> String {
    let pct = ((rate - 1.0) * 100.0).round() as i32;
    format!("{:+}%", pct)
}

/// 倍率 1.0 → "+0Hz"，1.2 → "+10Hz"
pub fn format_pitch(pitch: f32) -> String {
    let hz = ((pitch - 1.0) * 50.0).round() as i32;
    format!("{:+}Hz", hz)
}

/// HTTP 语音服务配置
#[derive(Debug, Clone)]
pub struct HttpSpeechProviderConfig {
    /// 服务基础 URL
    pub base_url: String,
    pub api_key: Option<String>,
    /// 请求超时时间（秒）
    pub timeout_secs: u64,
    /// 未返回 content_type 时使用的默认值
    pub default_content_type: String,
}

impl Default for HttpSpeechProviderConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5050".to_string(),
            api_key: None,
            timeout_secs: 60,
            default_content_type: "audio/mpeg".to_string(),
        }
    }
}

impl HttpSpeechProviderConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }
}

pub struct HttpSpeechProvider {
    client: Client,
    config: HttpSpeechProviderConfig,
}

impl HttpSpeechProvider {
    pub fn new(config: HttpSpeechProviderConfig) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ProviderError::NetworkError(e.to_string()))?;

        Ok(Self { client, config })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    fn authorize(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.config.api_key {
            Some(key) if !key.is_empty() => builder.bearer_auth(key),
            _ => builder,
        }
    }

    fn map_send_error(e: reqwest::Error) -> ProviderError {
        if e.is_timeout() {
            ProviderError::Timeout
        } else if e.is_connect() {
            ProviderError::NetworkError(format!("Cannot connect to speech service: {}", e))
        } else {
            ProviderError::NetworkError(e.to_string())
        }
    }

    fn map_status(status: StatusCode, body: String, voice: &str) -> ProviderError {
        match status {
            StatusCode::TOO_MANY_REQUESTS => ProviderError::RateLimited(body),
            StatusCode::NOT_FOUND => ProviderError::UnknownVoice(voice.to_string()),
            StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
                ProviderError::InvalidRequest(body)
            }
            StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => ProviderError::Timeout,
            _ => ProviderError::ServiceError(format!("HTTP {}: {}", status, body)),
        }
    }
}

#[async_trait]
impl SpeechProviderPort for HttpSpeechProvider {
    async fn synthesize(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let body = SynthesizeHttpRequest {
            text: &request.text,
            voice: &request.voice,
            rate: format_rate(request.rate),
            pitch: format_pitch(request.pitch),
        };

        tracing::debug!(
            url = %self.url("/api/synthesize"),
            text_len = request.text.len(),
            voice = %request.voice,
            rate = %body.rate,
            pitch = %body.pitch,
            "Sending synthesize request"
        );

        let response = self
            .authorize(self.client.post(self.url("/api/synthesize")))
            .json(&body)
            .send()
            .await
            .map_err(Self::map_send_error)?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(Self::map_status(status, error_text, &request.voice));
        }

        let payload: SynthesizeHttpResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(format!("Failed to decode response: {}", e)))?;

        let audio = BASE64
            .decode(payload.audio.as_bytes())
            .map_err(|e| ProviderError::InvalidResponse(format!("Invalid audio encoding: {}", e)))?;

        let boundaries = payload
            .boundaries
            .into_iter()
            .map(|b| WordBoundary {
                text: b.text,
                offset_ticks: b.offset,
                duration_ticks: b.duration,
            })
            .collect::<Vec<_>>();

        tracing::info!(
            voice = %request.voice,
            audio_size = audio.len(),
            boundaries = boundaries.len(),
            "Speech synthesis completed"
        );

        Ok(ProviderResponse {
            audio,
            content_type: payload
                .content_type
                .unwrap_or_else(|| self.config.default_content_type.clone()),
            boundaries,
        })
    }

    async fn list_voices(&self) -> Result<Vec<VoiceInfo>, ProviderError> {
        let response = self
            .authorize(self.client.get(self.url("/api/voices")))
            .send()
            .await
            .map_err(Self::map_send_error)?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(ProviderError::ServiceError(format!("HTTP {}: {}", status, error_text)));
        }

        let entries: Vec<VoiceHttpEntry> = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;

        Ok(entries
            .into_iter()
            .map(|v| VoiceInfo {
                name: v.name,
                gender: v.gender,
                locale: v.locale,
            })
            .collect())
    }

    async fn health_check(&self) -> bool {
        match self
            .client
            .get(self.url("/health"))
            .timeout(Duration::from_secs(5))
            .send()
            .await
        {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_builder() {
        let config = HttpSpeechProviderConfig::new("http://example.com:9000")
            .with_timeout(30)
            .with_api_key("secret");
        assert_eq!(config.base_url, "http://example.com:9000");
        assert_eq!(config.timeout_secs, 30);
        assert_eq!(config.api_key.as_deref(), Some("secret"));
    }

    #[test]
    fn test_rate_and_pitch_strings() {
        assert_eq!(format_rate(1.0), "+0%");
        assert_eq!(format_rate(1.5), "+50%");
        assert_eq!(format_rate(0.75), "-25%");
        assert_eq!(format_pitch(1.0), "+0Hz");
        assert_eq!(format_pitch(1.2), "+10Hz");
        assert_eq!(format_pitch(0.8), "-10Hz");
    }

    #[test]
    fn test_status_mapping() {
        let err = HttpSpeechProvider::map_status(StatusCode::TOO_MANY_REQUESTS, String::new(), "v");
        assert!(matches!(err, ProviderError::RateLimited(_)));
        assert!(err.is_transient());

        let err = HttpSpeechProvider::map_status(StatusCode::NOT_FOUND, String::new(), "xx-XX");
        assert!(matches!(err, ProviderError::UnknownVoice(ref v) if v == "xx-XX"));
        assert!(!err.is_transient());

        let err = HttpSpeechProvider::map_status(StatusCode::BAD_GATEWAY, "down".into(), "v");
        assert!(matches!(err, ProviderError::ServiceError(_)));
    }

    #[test]
    fn test_response_decoding() {
        let json = r#"{"audio":"AQID","boundaries":[{"text":"Hi","offset":0,"duration":10000}]}"#;
        let payload: SynthesizeHttpResponse = serde_json::from_str(json).unwrap();
        assert_eq!(BASE64.decode(payload.audio.as_bytes()).unwrap(), vec![1, 2, 3]);
        assert!(payload.content_type.is_none());
        assert_eq!(payload.boundaries[0].duration, 10000);
    }
}
