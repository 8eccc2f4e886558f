//! 当前会话的消息序列
//!
//! 维护一个有序消息列表，支持乐观插入与服务端回显的原位替换。
//! 展示顺序即到达顺序，不按 sentAt 重排（重排会破坏乐观消息的插入位置）。

use crate::chat::message::types::{ChatMessage, DeliveryState, MessageEntry, SenderType};
use std::collections::HashSet;
use std::sync::Mutex;
use tracing::{debug, warn};

/// reconcile 的处理结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// 匹配到乐观条目，已原位替换
    Replaced,
    /// 未匹配到乐观条目，按新消息追加
    Appended,
    /// 消息 ID 已存在，忽略（幂等）
    Duplicate,
}

struct StoreInner {
    entries: Vec<MessageEntry>,
    /// 已进入序列的消息 ID 集合，保证 append 幂等
    seen_ids: HashSet<String>,
}

/// 消息序列（单会话，内存态）
///
/// 所有方法内部不持锁跨 await，可在事件分发回调中同步调用
pub struct MessageStore {
    inner: Mutex<StoreInner>,
}

impl Default for MessageStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageStore {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(StoreInner {
                entries: Vec::new(),
                seen_ids: HashSet::new(),
            }),
        }
    }

    /// 整体替换消息序列（切换会话 / 初次加载历史）
    pub fn load_history(&self, messages: Vec<ChatMessage>) {
        let mut inner = self.inner.lock().unwrap();
        inner.seen_ids = messages.iter().map(|m| m.id.clone()).collect();
        inner.entries = messages
            .into_iter()
            .map(|message| MessageEntry {
                message,
                delivery: DeliveryState::Confirmed,
            })
            .collect();
        debug!("[MsgStore] 已加载历史消息，共 {} 条", inner.entries.len());
    }

    /// 追加已确认消息；重复 ID 忽略（同一消息可能经乐观路径和回显两次到达）
    pub fn append(&self, message: ChatMessage) -> bool {
        let mut inner = self.inner.lock().unwrap();
        if !inner.seen_ids.insert(message.id.clone()) {
            debug!("[MsgStore] 忽略重复消息: id={}", message.id);
            return false;
        }
        inner.entries.push(MessageEntry {
            message,
            delivery: DeliveryState::Confirmed,
        });
        true
    }

    /// 立即插入乐观消息（Pending），UI 无需等待服务端确认
    pub fn append_optimistic(&self, draft: ChatMessage) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(temp_id) = &draft.client_temp_id {
            debug!("[MsgStore] 插入乐观消息: clientTempId={}", temp_id);
        } else {
            warn!("[MsgStore] ⚠️ 乐观消息缺少 clientTempId: id={}", draft.id);
        }
        inner.seen_ids.insert(draft.id.clone());
        inner.entries.push(MessageEntry {
            message: draft,
            delivery: DeliveryState::Pending,
        });
    }

    /// 用服务端回显归并乐观消息
    ///
    /// 按 `clientTempId`（或 ID 恰为临时 ID 的条目）定位乐观条目并原位替换，
    /// 保持列表位置不变；未匹配到则按新消息追加。
    pub fn reconcile(&self, confirmed: ChatMessage) -> ReconcileOutcome {
        if let Some(temp_id) = confirmed.client_temp_id.clone() {
            let mut inner = self.inner.lock().unwrap();
            let position = inner.entries.iter().position(|e| {
                e.message.client_temp_id.as_deref() == Some(temp_id.as_str())
                    || e.message.id == temp_id
            });
            if let Some(idx) = position {
                debug!(
                    "[MsgStore] ✅ 乐观消息已确认: clientTempId={} -> id={}",
                    temp_id, confirmed.id
                );
                inner.seen_ids.insert(confirmed.id.clone());
                inner.entries[idx] = MessageEntry {
                    message: confirmed,
                    delivery: DeliveryState::Confirmed,
                };
                return ReconcileOutcome::Replaced;
            }
        }
        if self.append(confirmed) {
            ReconcileOutcome::Appended
        } else {
            ReconcileOutcome::Duplicate
        }
    }

    /// 是否存在该关联 ID 的待确认条目
    pub fn has_pending(&self, client_temp_id: &str) -> bool {
        let inner = self.inner.lock().unwrap();
        inner.entries.iter().any(|e| {
            e.delivery == DeliveryState::Pending
                && e.message.client_temp_id.as_deref() == Some(client_temp_id)
        })
    }

    /// 发送失败：Pending -> Failed
    pub fn mark_send_failed(&self, client_temp_id: &str) -> bool {
        let mut inner = self.inner.lock().unwrap();
        for entry in inner.entries.iter_mut() {
            if entry.delivery == DeliveryState::Pending
                && entry.message.client_temp_id.as_deref() == Some(client_temp_id)
            {
                warn!("[MsgStore] ❌ 消息发送失败: clientTempId={}", client_temp_id);
                entry.delivery = DeliveryState::Failed;
                return true;
            }
        }
        false
    }

    /// 将指定发送方的未读消息全部置为已读，返回变更条数
    ///
    /// 两个用途：收到对端已读回执时翻转本端发出的消息；
    /// 本端标记已读时翻转对端发来的消息。
    pub fn mark_read_from(&self, sender: SenderType) -> usize {
        let mut inner = self.inner.lock().unwrap();
        let mut changed = 0;
        for entry in inner.entries.iter_mut() {
            if entry.message.sender_type == sender && !entry.message.is_read {
                entry.message.is_read = true;
                changed += 1;
            }
        }
        changed
    }

    /// 消息序列快照（到达顺序）
    pub fn entries(&self) -> Vec<MessageEntry> {
        self.inner.lock().unwrap().entries.clone()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
