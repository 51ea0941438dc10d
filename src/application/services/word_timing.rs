//! Word timing alignment
//!
//! 把 provider 上报的词边界（tick）转换为毫秒，并在源文本中定位每个词

use crate::application::ports::{WordBoundary, TICKS_PER_MS};
use crate::domain::speech::WordTiming;

/// 按顺序在源文本中查找每个词，游标只前进不后退
pub fn align_word_timings(source: &str, boundaries: &[WordBoundary]) -> Vec<WordTiming> {
    let mut byte_cursor = 0usize;
    let mut char_cursor = 0usize;
    let mut timings = Vec::with_capacity(boundaries.len());

    for boundary in boundaries {
        let token = boundary.text.trim();
        if token.is_empty() {
            continue;
        }

        let located = source[byte_cursor..].find(token).map(|rel| byte_cursor + rel);
        let (text, char_start) = match located {
            Some(start) => {
                let end = start + token.len();
                let start_char = char_cursor + source[byte_cursor..start].chars().count();
                char_cursor = start_char + token.chars().count();
                byte_cursor = end;
                (source[start..end].to_string(), Some(start_char))
            }
            None => (token.to_string(), None),
        };

        timings.push(WordTiming {
            char_len: text.chars().count(),
            text,
            offset_ms: boundary.offset_ticks / TICKS_PER_MS,
            duration_ms: boundary.duration_ticks / TICKS_PER_MS,
            char_start,
        });
    }

    timings
}

#[cfg(test)]
mod tests {
    use super::*;

    fn boundary(text: &str, offset_ms: u64, duration_ms: u64) -> WordBoundary {
        WordBoundary {
            text: text.to_string(),
            offset_ticks: offset_ms * TICKS_PER_MS,
            duration_ticks: duration_ms * TICKS_PER_MS,
        }
    }

    #[test]
    fn test_ticks_converted_to_ms() {
        let timings = align_word_timings("Hello world", &[boundary("Hello", 100, 350)]);
        assert_eq!(timings[0].offset_ms, 100);
        assert_eq!(timings[0].duration_ms, 350);
    }

    #[test]
    fn test_positions_follow_source_order() {
        let source = "the cat and the hat";
        let timings = align_word_timings(
            source,
            &[
                boundary("the", 0, 100),
                boundary("cat", 100, 100),
                boundary("and", 200, 100),
                boundary("the", 300, 100),
                boundary("hat", 400, 100),
            ],
        );
        let starts: Vec<_> = timings.iter().map(|t| t.char_start).collect();
        assert_eq!(starts, vec![Some(0), Some(4), Some(8), Some(12), Some(16)]);
    }

    #[test]
    fn test_multibyte_char_offsets() {
        let source = "你好，世界";
        let timings = align_word_timings(source, &[boundary("你好", 0, 300), boundary("世界", 400, 300)]);
        assert_eq!(timings[0].char_start, Some(0));
        assert_eq!(timings[1].char_start, Some(3));
        assert_eq!(timings[1].char_len, 2);
    }

    #[test]
    fn test_unknown_token_keeps_cursor() {
        let source = "one two";
        let timings = align_word_timings(
            source,
            &[boundary("one", 0, 10), boundary("1", 10, 10), boundary("two", 20, 10)],
        );
        assert_eq!(timings[1].char_start, None);
        assert_eq!(timings[1].text, "1");
        assert_eq!(timings[2].char_start, Some(4));
    }

    #[test]
    fn test_blank_tokens_skipped() {
        let timings = align_word_timings("a b", &[boundary(" ", 0, 10), boundary("b", 10, 10)]);
        assert_eq!(timings.len(), 1);
        assert_eq!(timings[0].text, "b");
    }
}
