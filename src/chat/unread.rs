//! 顾客端未读计数
//!
//! 顾客与客服之间只有一个隐式会话，因此这里只维护一个计数器：
//! 聊天面板关闭/最小化时收到客服消息则 +1，打开面板即清零。
//! 管理端的分会话未读数见 `conversation` 模块。

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use tracing::debug;

/// 顾客端未读计数器
pub struct UnreadTracker {
    count: AtomicU32,
    /// 聊天面板是否处于打开且未最小化状态
    surface_open: AtomicBool,
}

impl Default for UnreadTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl UnreadTracker {
    pub fn new() -> Self {
        Self {
            count: AtomicU32::new(0),
            surface_open: AtomicBool::new(false),
        }
    }

    /// 未读 +1，返回新值
    pub fn increment(&self) -> u32 {
        let new = self.count.fetch_add(1, Ordering::SeqCst) + 1;
        debug!("[Unread] 未读计数: {}", new);
        new
    }

    /// 清零，返回清零前的值
    pub fn clear(&self) -> u32 {
        self.count.swap(0, Ordering::SeqCst)
    }

    /// 覆盖计数（历史拉取返回的服务端未读数）
    pub fn set_count(&self, count: u32) {
        self.count.store(count, Ordering::SeqCst);
    }

    pub fn count(&self) -> u32 {
        self.count.load(Ordering::SeqCst)
    }

    pub fn set_surface_open(&self, open: bool) {
        self.surface_open.store(open, Ordering::SeqCst);
    }

    pub fn surface_open(&self) -> bool {
        self.surface_open.load(Ordering::SeqCst)
    }
}

/// 浏览器标签页闪烁标题
///
/// 有未读且面板未聚焦时，嵌入方按自己的节拍交替调用
/// `flash_on = true/false` 来晃动标题；计数归零时恢复原标题。
/// 仅是展示效果，不参与任何正确性逻辑。
pub fn attention_title(unread: u32, original_title: &str, flash_on: bool) -> String {
    if unread > 0 && flash_on {
        format!("({}) New Message!", unread)
    } else {
        original_title.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn increments_and_clears() {
        let tracker = UnreadTracker::new();
        assert_eq!(tracker.increment(), 1);
        assert_eq!(tracker.increment(), 2);
        assert_eq!(tracker.clear(), 2);
        assert_eq!(tracker.count(), 0);
        // 重复清零无副作用
        assert_eq!(tracker.clear(), 0);
    }

    #[test]
    fn set_count_overrides() {
        let tracker = UnreadTracker::new();
        tracker.set_count(7);
        assert_eq!(tracker.count(), 7);
    }

    #[test]
    fn surface_open_defaults_to_closed() {
        let tracker = UnreadTracker::new();
        assert!(!tracker.surface_open());
        tracker.set_surface_open(true);
        assert!(tracker.surface_open());
    }

    #[test]
    fn title_alternates_and_restores() {
        assert_eq!(attention_title(3, "Store", true), "(3) New Message!");
        assert_eq!(attention_title(3, "Store", false), "Store");
        // 计数归零后无论节拍如何都恢复原标题
        assert_eq!(attention_title(0, "Store", true), "Store");
        assert_eq!(attention_title(0, "Store", false), "Store");
    }
}
