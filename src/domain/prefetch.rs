//! Prefetch Window - 预取窗口
//!
//! 半开区间 [start, end)，每次播放位置变化时重新计算并取代上一个窗口

use serde::{Deserialize, Serialize};

/// 窗口配置
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowConfig {
    /// 当前位置之前预取的段数
    pub behind: usize,
    /// 当前位置之后预取的段数
    pub ahead: usize,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            behind: 1,
            ahead: 3,
        }
    }
}

impl WindowConfig {
    pub fn new(behind: usize, ahead: usize) -> Self {
        Self { behind, ahead }
    }

    /// 计算播放位置对应的窗口（包含当前位置）
    pub fn window_for(&self, position: usize, total_paragraphs: usize) -> PrefetchWindow {
        if position >= total_paragraphs {
            return PrefetchWindow::empty();
        }
        let start = position.saturating_sub(self.behind);
        let end = position
            .saturating_add(self.ahead)
            .saturating_add(1)
            .min(total_paragraphs);
        PrefetchWindow { start, end }
    }
}

/// 预取窗口
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrefetchWindow {
    pub start: usize,
    pub end: usize,
}

impl PrefetchWindow {
    /// 按段落总数裁剪的显式窗口
    pub fn new(start: usize, end: usize, total_paragraphs: usize) -> Self {
        let end = end.min(total_paragraphs);
        let start = start.min(end);
        Self { start, end }
    }

    pub fn empty() -> Self {
        Self { start: 0, end: 0 }
    }

    pub fn contains(&self, index: usize) -> bool {
        index >= self.start && index < self.end
    }

    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn indices(&self) -> std::ops::Range<usize> {
        self.start..self.end
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_one_behind_three_ahead() {
        let window = WindowConfig::default().window_for(5, 20);
        assert_eq!(window, PrefetchWindow { start: 4, end: 9 });
        assert!(window.contains(4));
        assert!(window.contains(8));
        assert!(!window.contains(9));
        assert_eq!(window.len(), 5);
    }

    #[test]
    fn test_window_clamped_at_edges() {
        let config = WindowConfig::new(2, 3);
        assert_eq!(config.window_for(0, 10), PrefetchWindow { start: 0, end: 4 });
        assert_eq!(config.window_for(9, 10), PrefetchWindow { start: 7, end: 10 });
    }

    #[test]
    fn test_position_past_end_is_empty() {
        let window = WindowConfig::default().window_for(10, 10);
        assert!(window.is_empty());
        assert_eq!(window.indices().count(), 0);
    }

    #[test]
    fn test_explicit_window_is_clamped() {
        let window = PrefetchWindow::new(8, 30, 10);
        assert_eq!(window, PrefetchWindow { start: 8, end: 10 });
        let inverted = PrefetchWindow::new(12, 30, 10);
        assert!(inverted.is_empty());
    }
}
