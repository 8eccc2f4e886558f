//! 会话列表（管理端，内存态）
//!
//! 列表始终按最近活动降序呈现；新消息事件将所在会话稳定地移动到表头，
//! 而不是整表重排，避免无关条目可见跳动。

use crate::chat::conversation::models::Conversation;
use crate::chat::message::{ChatMessage, SenderType};
use tracing::debug;

/// upsert_from_message 的处理结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// 已更新预览/时间戳/未读数并移动到表头
    Updated,
    /// 本地没有匹配会话（首条消息的新会话），需要整表刷新
    Unknown,
}

/// 会话列表
///
/// 纯内存结构，不做任何 IO；由 `ConversationService` 负责与后端同步
pub struct ConversationList {
    items: Vec<Conversation>,
    selected_id: Option<String>,
    /// 当前管理员自己的用户 ID，用于过滤与自己的会话
    owner_user_id: String,
}

impl ConversationList {
    pub fn new(owner_user_id: String) -> Self {
        Self {
            items: Vec::new(),
            selected_id: None,
            owner_user_id,
        }
    }

    /// 整体替换列表（初次加载 / 新会话兜底刷新）
    ///
    /// 过滤掉与自己的会话，并按 updatedAt 降序排好
    pub fn replace_all(&mut self, conversations: Vec<Conversation>) {
        let mut items: Vec<Conversation> = conversations
            .into_iter()
            .filter(|c| c.user_id != self.owner_user_id)
            .collect();
        items.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        debug!("[ConvList] 列表已替换，共 {} 个会话", items.len());
        self.items = items;
    }

    /// 根据入站消息更新会话
    ///
    /// 定位规则：优先 conversationId；缺失时仅对 USER 消息回退到
    /// 发送方 ID 匹配（ADMIN 消息无法可靠猜测所属会话）。
    /// 未读数只在满足三个条件时 +1：USER 发出、尚未读、会话未被选中。
    pub fn upsert_from_message(&mut self, message: &ChatMessage) -> UpsertOutcome {
        let index = match &message.conversation_id {
            Some(cid) => self.items.iter().position(|c| &c.id == cid),
            None => {
                if message.sender_type == SenderType::User {
                    self.items.iter().position(|c| c.user_id == message.sender_id)
                } else {
                    None
                }
            }
        };

        let Some(index) = index else {
            debug!(
                "[ConvList] 消息无匹配会话，待整表刷新: senderId={}",
                message.sender_id
            );
            return UpsertOutcome::Unknown;
        };

        let mut conv = self.items.remove(index);
        let is_selected = self.selected_id.as_deref() == Some(conv.id.as_str());
        let should_increment =
            message.sender_type == SenderType::User && !message.is_read && !is_selected;

        conv.messages = vec![message.clone()];
        conv.updated_at = message.sent_at.clone();
        if should_increment {
            conv.count.messages += 1;
        }
        debug!(
            "[ConvList] 会话移至表头: id={}, unread={}, selected={}",
            conv.id, conv.count.messages, is_selected
        );
        self.items.insert(0, conv);
        UpsertOutcome::Updated
    }

    /// 未读数清零（管理员打开会话或收到 conversationRead）
    pub fn clear_unread(&mut self, conversation_id: &str) -> bool {
        for conv in self.items.iter_mut() {
            if conv.id == conversation_id {
                conv.count.messages = 0;
                return true;
            }
        }
        false
    }

    /// 选中会话：记录选中状态并清零未读数，返回会话快照
    pub fn select(&mut self, conversation_id: &str) -> Option<Conversation> {
        let found = self.items.iter_mut().find(|c| c.id == conversation_id)?;
        found.count.messages = 0;
        let snapshot = found.clone();
        self.selected_id = Some(conversation_id.to_string());
        Some(snapshot)
    }

    /// 取消选中（管理员关闭会话窗口）
    pub fn deselect(&mut self) {
        self.selected_id = None;
    }

    pub fn selected_id(&self) -> Option<String> {
        self.selected_id.clone()
    }

    /// 当前选中会话的快照
    pub fn selected(&self) -> Option<Conversation> {
        let id = self.selected_id.as_deref()?;
        self.items.iter().find(|c| c.id == id).cloned()
    }

    /// 列表快照（最近活动在前）
    pub fn snapshot(&self) -> Vec<Conversation> {
        self.items.clone()
    }

    /// 所有会话未读数之和
    pub fn total_unread(&self) -> i32 {
        self.items.iter().map(|c| c.count.messages).sum()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::conversation::models::{ChatUser, MessageCount};
    use crate::chat::message::MessageKind;

    fn conv(id: &str, user_id: &str, updated_at: &str) -> Conversation {
        Conversation {
            id: id.to_string(),
            user_id: user_id.to_string(),
            updated_at: updated_at.to_string(),
            user: ChatUser {
                id: user_id.to_string(),
                ..ChatUser::default()
            },
            messages: Vec::new(),
            count: MessageCount::default(),
        }
    }

    fn user_msg(conversation_id: Option<&str>, sender_id: &str, sent_at: &str) -> ChatMessage {
        ChatMessage {
            id: format!("m-{}", sent_at),
            client_temp_id: None,
            conversation_id: conversation_id.map(|s| s.to_string()),
            sender_id: sender_id.to_string(),
            sender_type: SenderType::User,
            content: "hello".to_string(),
            kind: MessageKind::Text,
            metadata: None,
            sent_at: sent_at.to_string(),
            is_read: false,
        }
    }

    #[test]
    fn replace_all_sorts_descending_and_filters_self() {
        let mut list = ConversationList::new("admin-1".to_string());
        list.replace_all(vec![
            conv("b", "u2", "2026-01-01T09:00:00.000Z"),
            conv("a", "u1", "2026-01-01T10:00:00.000Z"),
            conv("self", "admin-1", "2026-01-01T11:00:00.000Z"),
        ]);
        let ids: Vec<String> = list.snapshot().iter().map(|c| c.id.clone()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn new_message_moves_conversation_to_head() {
        let mut list = ConversationList::new("admin-1".to_string());
        list.replace_all(vec![
            conv("a", "u1", "2026-01-01T10:00:00.000Z"),
            conv("b", "u2", "2026-01-01T09:00:00.000Z"),
        ]);

        let msg = user_msg(Some("b"), "u2", "2026-01-01T10:30:00.000Z");
        assert_eq!(list.upsert_from_message(&msg), UpsertOutcome::Updated);

        let snapshot = list.snapshot();
        assert_eq!(snapshot[0].id, "b");
        assert_eq!(snapshot[0].updated_at, "2026-01-01T10:30:00.000Z");
        assert_eq!(snapshot[0].preview().unwrap().content, "hello");
        assert_eq!(snapshot[0].unread_count(), 1);
        assert_eq!(snapshot[1].id, "a");
    }

    #[test]
    fn move_to_front_is_stable_for_unrelated_entries() {
        let mut list = ConversationList::new("admin-1".to_string());
        list.replace_all(vec![
            conv("a", "u1", "2026-01-01T10:00:00.000Z"),
            conv("b", "u2", "2026-01-01T09:00:00.000Z"),
            conv("c", "u3", "2026-01-01T08:00:00.000Z"),
            conv("d", "u4", "2026-01-01T07:00:00.000Z"),
        ]);
        let msg = user_msg(Some("c"), "u3", "2026-01-01T11:00:00.000Z");
        list.upsert_from_message(&msg);
        let ids: Vec<String> = list.snapshot().iter().map(|c| c.id.clone()).collect();
        assert_eq!(ids, vec!["c", "a", "b", "d"]);
    }

    #[test]
    fn selected_conversation_does_not_accumulate_unread() {
        let mut list = ConversationList::new("admin-1".to_string());
        list.replace_all(vec![conv("c", "u3", "2026-01-01T08:00:00.000Z")]);
        list.select("c").unwrap();

        let msg = user_msg(Some("c"), "u3", "2026-01-01T11:00:00.000Z");
        assert_eq!(list.upsert_from_message(&msg), UpsertOutcome::Updated);

        let head = &list.snapshot()[0];
        // 未读保持 0，但预览和时间戳照常更新
        assert_eq!(head.unread_count(), 0);
        assert_eq!(head.updated_at, "2026-01-01T11:00:00.000Z");
        assert_eq!(head.preview().unwrap().content, "hello");
    }

    #[test]
    fn admin_message_updates_preview_without_unread() {
        let mut list = ConversationList::new("admin-1".to_string());
        list.replace_all(vec![conv("a", "u1", "2026-01-01T10:00:00.000Z")]);

        let mut msg = user_msg(Some("a"), "admin-1", "2026-01-01T12:00:00.000Z");
        msg.sender_type = SenderType::Admin;
        assert_eq!(list.upsert_from_message(&msg), UpsertOutcome::Updated);
        assert_eq!(list.snapshot()[0].unread_count(), 0);
    }

    #[test]
    fn already_read_message_does_not_increment() {
        let mut list = ConversationList::new("admin-1".to_string());
        list.replace_all(vec![conv("a", "u1", "2026-01-01T10:00:00.000Z")]);
        let mut msg = user_msg(Some("a"), "u1", "2026-01-01T12:00:00.000Z");
        msg.is_read = true;
        list.upsert_from_message(&msg);
        assert_eq!(list.snapshot()[0].unread_count(), 0);
    }

    #[test]
    fn legacy_message_falls_back_to_sender_lookup() {
        let mut list = ConversationList::new("admin-1".to_string());
        list.replace_all(vec![conv("a", "u1", "2026-01-01T10:00:00.000Z")]);

        // USER 消息缺失 conversationId：按发送方匹配
        let msg = user_msg(None, "u1", "2026-01-01T12:00:00.000Z");
        assert_eq!(list.upsert_from_message(&msg), UpsertOutcome::Updated);

        // ADMIN 消息缺失 conversationId：无法猜测，报告 Unknown
        let mut admin_msg = user_msg(None, "admin-2", "2026-01-01T13:00:00.000Z");
        admin_msg.sender_type = SenderType::Admin;
        assert_eq!(list.upsert_from_message(&admin_msg), UpsertOutcome::Unknown);
    }

    #[test]
    fn unknown_conversation_reports_unknown() {
        let mut list = ConversationList::new("admin-1".to_string());
        list.replace_all(vec![conv("a", "u1", "2026-01-01T10:00:00.000Z")]);
        let msg = user_msg(Some("brand-new"), "u9", "2026-01-01T12:00:00.000Z");
        assert_eq!(list.upsert_from_message(&msg), UpsertOutcome::Unknown);
        // 原列表保持不变
        assert_eq!(list.len(), 1);
    }

    #[test]
    fn ordering_holds_across_message_sequences() {
        let mut list = ConversationList::new("admin-1".to_string());
        list.replace_all(vec![
            conv("a", "u1", "2026-01-01T10:00:00.000Z"),
            conv("b", "u2", "2026-01-01T09:00:00.000Z"),
            conv("c", "u3", "2026-01-01T08:00:00.000Z"),
        ]);

        for (target, sent_at) in [
            ("b", "2026-01-01T11:00:00.000Z"),
            ("c", "2026-01-01T11:05:00.000Z"),
            ("a", "2026-01-01T11:10:00.000Z"),
            ("c", "2026-01-01T11:15:00.000Z"),
        ] {
            let uid = match target {
                "a" => "u1",
                "b" => "u2",
                _ => "u3",
            };
            list.upsert_from_message(&user_msg(Some(target), uid, sent_at));
            // 每次变更后列表都保持 updatedAt 降序
            let snapshot = list.snapshot();
            for pair in snapshot.windows(2) {
                assert!(pair[0].updated_at >= pair[1].updated_at);
            }
        }
        let ids: Vec<String> = list.snapshot().iter().map(|c| c.id.clone()).collect();
        assert_eq!(ids, vec!["c", "a", "b"]);
    }

    #[test]
    fn select_clears_unread_and_tracks_selection() {
        let mut list = ConversationList::new("admin-1".to_string());
        let mut c = conv("a", "u1", "2026-01-01T10:00:00.000Z");
        c.count.messages = 4;
        list.replace_all(vec![c]);

        let selected = list.select("a").unwrap();
        assert_eq!(selected.unread_count(), 0);
        assert_eq!(list.selected_id().as_deref(), Some("a"));
        assert_eq!(list.total_unread(), 0);

        list.deselect();
        assert!(list.selected_id().is_none());
    }
}
