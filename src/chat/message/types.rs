//! 消息数据结构
//!
//! 定义聊天消息的线上结构（与后端/各端字段对齐）以及
//! 按 `type` 判别出的富媒体内容标签联合。

use crate::chat::serialization::normalize_metadata;
use serde::{Deserialize, Serialize};

/// 消息发送方身份（两方会话：顾客 / 客服）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SenderType {
    #[serde(rename = "USER")]
    User,
    #[serde(rename = "ADMIN")]
    Admin,
}

/// 消息类型，决定 metadata 的解释方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum MessageKind {
    #[default]
    #[serde(rename = "TEXT")]
    Text,
    #[serde(rename = "IMAGE")]
    Image,
    #[serde(rename = "PRODUCT")]
    Product,
    #[serde(rename = "ORDER")]
    Order,
}

/// 聊天消息（线上结构）
///
/// 历史数据可能缺失 `conversationId` 与 `type`，全部按缺省容错反序列化
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    /// 服务端持久化后的消息 ID；确认前为客户端临时 ID
    pub id: String,
    /// 客户端关联 ID，仅本端发出的消息携带，恰好匹配一次
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_temp_id: Option<String>,
    /// 会话 ID；旧数据可能缺失，匹配时回退到发送方启发式
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
    pub sender_id: String,
    pub sender_type: SenderType,
    /// 展示文本（富媒体消息的兜底文案）
    pub content: String,
    #[serde(rename = "type", default)]
    pub kind: MessageKind,
    /// 不透明负载，按 `kind` 解释；可能是 JSON 字符串也可能是结构化对象
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
    /// ISO-8601 发送时间
    pub sent_at: String,
    /// 仅对"对端发给我"的消息有意义，由已读回执置位
    #[serde(default)]
    pub is_read: bool,
}

/// IMAGE 消息的 metadata
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageRef {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub alt: String,
}

/// PRODUCT 消息的 metadata
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductRef {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub sku_id: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub price: f64,
    #[serde(default)]
    pub image_url: String,
}

/// ORDER 消息的 metadata
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderRef {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub total: f64,
    #[serde(default)]
    pub item_count: i64,
}

/// 按 `kind` + 归一化 metadata 判别出的富媒体内容
///
/// 渲染侧对该联合做穷尽匹配，不再直接摸 metadata 字段
#[derive(Debug, Clone, PartialEq)]
pub enum RichContent {
    Text,
    Image(ImageRef),
    Product(ProductRef),
    Order(OrderRef),
}

impl ChatMessage {
    /// 判别富媒体内容（全函数：脏 metadata 降级为空字段，绝不报错）
    pub fn rich_content(&self) -> RichContent {
        let meta = normalize_metadata(self.metadata.as_ref());
        match self.kind {
            MessageKind::Text => RichContent::Text,
            MessageKind::Image => {
                RichContent::Image(serde_json::from_value(meta).unwrap_or_default())
            }
            MessageKind::Product => {
                RichContent::Product(serde_json::from_value(meta).unwrap_or_default())
            }
            MessageKind::Order => {
                RichContent::Order(serde_json::from_value(meta).unwrap_or_default())
            }
        }
    }

    /// 判断消息是否属于指定会话
    ///
    /// 优先比较 `conversationId`；旧数据缺失时回退到发送方 ID 启发式
    /// （发送方是会话对端或本端即视为相关）。启发式只是尽力而为，
    /// 新产生的消息都应携带 `conversationId`。
    pub fn belongs_to(&self, conversation_id: &str, counterpart_id: &str, self_id: &str) -> bool {
        match &self.conversation_id {
            Some(cid) => cid == conversation_id,
            None => self.sender_id == counterpart_id || self.sender_id == self_id,
        }
    }
}

/// 消息投递状态（仅存在于本地消息序列，不上线）
///
/// 乐观消息以 Pending 进入序列，服务端回显后转 Confirmed，
/// 发送失败转 Failed；一条逻辑消息在序列中始终只有一个条目。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryState {
    Pending,
    Confirmed,
    Failed,
}

/// 消息序列条目：线上消息 + 本地投递状态
#[derive(Debug, Clone)]
pub struct MessageEntry {
    pub message: ChatMessage,
    pub delivery: DeliveryState,
}
