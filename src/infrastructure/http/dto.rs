//! Data Transfer Objects

use serde::{Deserialize, Serialize};

use crate::domain::speech::SynthesisParams;

// ============================================================================
// 统一响应结构
// ============================================================================

/// 统一 API 响应格式
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub errno: i32,
    pub error: String,
    pub data: Option<T>,
}

impl<T: Serialize> ApiResponse<T> {
    /// 成功响应
    pub fn success(data: T) -> Self {
        Self {
            errno: 0,
            error: String::new(),
            data: Some(data),
        }
    }
}

// ============================================================================
// 公共请求字段
// ============================================================================

fn default_ratio() -> f32 {
    1.0
}

/// 合成参数；rate 和 pitch 为倍率，缺省 1.0
#[derive(Debug, Clone, Deserialize)]
pub struct VoiceParams {
    pub voice: String,
    #[serde(default = "default_ratio")]
    pub rate: f32,
    #[serde(default = "default_ratio")]
    pub pitch: f32,
}

impl From<VoiceParams> for SynthesisParams {
    fn from(p: VoiceParams) -> Self {
        SynthesisParams::new(p.voice, p.rate, p.pitch)
    }
}

/// 按 ID 操作任务
#[derive(Debug, Deserialize)]
pub struct JobIdRequest {
    pub id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_voice_params_defaults() {
        let params: VoiceParams = serde_json::from_str(r#"{"voice":"en-US-AriaNeural"}"#).unwrap();
        assert_eq!(params.rate, 1.0);
        assert_eq!(params.pitch, 1.0);

        let params: SynthesisParams =
            serde_json::from_str::<VoiceParams>(r#"{"voice":"v","rate":1.5}"#).unwrap().into();
        assert_eq!(params.key(), "v|1.500|1.000");
    }

    #[test]
    fn test_envelope_shape() {
        let json = serde_json::to_value(ApiResponse::success(42)).unwrap();
        assert_eq!(json["errno"], 0);
        assert_eq!(json["error"], "");
        assert_eq!(json["data"], 42);
    }
}
