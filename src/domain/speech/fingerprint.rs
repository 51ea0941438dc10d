//! Speech Context - Fingerprint
//!
//! 指纹 = md5(规范化文本 | voice | rate | pitch)
//! 结构化上下文（书籍/章节/段落）只用于按位置查找，不参与哈希计算

use serde::{Deserialize, Serialize};

/// 合成参数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SynthesisParams {
    pub voice: String,
    pub rate: f32,
    pub pitch: f32,
}

impl SynthesisParams {
    pub fn new(voice: impl Into<String>, rate: f32, pitch: f32) -> Self {
        Self {
            voice: voice.into(),
            rate,
            pitch,
        }
    }

    /// 参数的稳定字符串表示（rate/pitch 固定 3 位小数）
    pub fn key(&self) -> String {
        format!("{}|{:.3}|{:.3}", self.voice, self.rate, self.pitch)
    }
}

/// 段落在书中的位置
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ParagraphPosition {
    pub book_id: String,
    pub chapter_ref: String,
    pub paragraph_index: u32,
}

impl ParagraphPosition {
    pub fn new(book_id: impl Into<String>, chapter_ref: impl Into<String>, paragraph_index: u32) -> Self {
        Self {
            book_id: book_id.into(),
            chapter_ref: chapter_ref.into(),
            paragraph_index,
        }
    }
}

/// 规范化文本：去除首尾空白，连续空白压缩为单个空格
pub fn normalize_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// 合成指纹
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fingerprint {
    hash: String,
    context: Option<ParagraphPosition>,
}

impl Fingerprint {
    /// 根据文本和参数计算指纹
    pub fn compute(text: &str, params: &SynthesisParams) -> Self {
        let normalized = normalize_text(text);
        let content = format!("{}|{}", normalized, params.key());
        let digest = md5::compute(content.as_bytes());
        Self {
            hash: format!("{:x}", digest),
            context: None,
        }
    }

    /// 附加结构化位置（不改变哈希）
    pub fn with_context(mut self, position: ParagraphPosition) -> Self {
        self.context = Some(position);
        self
    }

    pub fn hash(&self) -> &str {
        &self.hash
    }

    pub fn context(&self) -> Option<&ParagraphPosition> {
        self.context.as_ref()
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> SynthesisParams {
        SynthesisParams::new("zh-CN-XiaoxiaoNeural", 1.0, 1.0)
    }

    #[test]
    fn test_identical_inputs_same_hash() {
        let a = Fingerprint::compute("第一章 开始", &params());
        let b = Fingerprint::compute("第一章 开始", &params());
        assert_eq!(a, b);
        assert_eq!(a.hash().len(), 32);
    }

    #[test]
    fn test_whitespace_is_normalized() {
        let a = Fingerprint::compute("  Hello   world\n", &params());
        let b = Fingerprint::compute("Hello world", &params());
        assert_eq!(a.hash(), b.hash());
    }

    #[test]
    fn test_params_change_hash() {
        let base = Fingerprint::compute("Hello", &params());
        let faster = Fingerprint::compute("Hello", &SynthesisParams::new("zh-CN-XiaoxiaoNeural", 1.5, 1.0));
        let other_voice = Fingerprint::compute("Hello", &SynthesisParams::new("en-US-JennyNeural", 1.0, 1.0));
        assert_ne!(base.hash(), faster.hash());
        assert_ne!(base.hash(), other_voice.hash());
    }

    #[test]
    fn test_context_does_not_change_hash() {
        let plain = Fingerprint::compute("Hello", &params());
        let located = Fingerprint::compute("Hello", &params())
            .with_context(ParagraphPosition::new("book-1", "ch1.xhtml", 3));
        assert_eq!(plain.hash(), located.hash());
        assert_eq!(located.context().map(|p| p.paragraph_index), Some(3));
    }

    #[test]
    fn test_normalize_text() {
        assert_eq!(normalize_text(" a \t b\n\nc "), "a b c");
        assert_eq!(normalize_text("   "), "");
    }
}
