//! 会话数据结构与配置

use crate::chat::message::ChatMessage;
use serde::{Deserialize, Serialize};

/// 会话对端用户的展示信息（冗余字段，服务端下发）
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatUser {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

impl ChatUser {
    /// 展示名（姓 + 名）
    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }
}

/// 未读计数包装（线上字段名为 `_count.messages`）
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MessageCount {
    #[serde(default)]
    pub messages: i32,
}

/// 会话摘要（管理端列表条目）
///
/// `messages` 只保留最近一条作为预览，不含完整历史
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub id: String,
    /// 顾客一方的用户 ID
    pub user_id: String,
    /// 最近活动时间，列表按其降序排序
    pub updated_at: String,
    #[serde(default)]
    pub user: ChatUser,
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
    #[serde(rename = "_count", default)]
    pub count: MessageCount,
}

impl Conversation {
    /// 未读消息数
    pub fn unread_count(&self) -> i32 {
        self.count.messages
    }

    /// 预览消息（最近一条）
    pub fn preview(&self) -> Option<&ChatMessage> {
        self.messages.first()
    }
}

/// 会话历史响应（含未读计数）
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationHistory {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
    #[serde(rename = "_count", default)]
    pub count: MessageCount,
}
