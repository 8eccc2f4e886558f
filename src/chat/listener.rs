//! 聊天事件回调接口
//!
//! 嵌入方（界面层）通过该接口接收连接状态与消息事件。
//! 消息类参数统一为 JSON 字符串，便于跨语言绑定层直接透传。

use async_trait::async_trait;

/// 聊天事件监听器
#[async_trait]
pub trait ChatEventListener: Send + Sync {
    /// 连接状态变化（驱动在线指示灯与发送按钮的可用性）
    async fn on_connection_status_changed(&self, connected: bool, message: String);

    /// 收到新消息（JSON 编码的消息体）
    async fn on_new_message(&self, message: String);

    /// 对端已读我发出的消息（JSON：conversationId / userId）
    async fn on_message_read(&self, receipt: String);

    /// 某端已读整个会话（JSON：conversationId / readBy）
    async fn on_conversation_read(&self, receipt: String);

    /// 顾客端未读计数变化
    async fn on_unread_count_changed(&self, unread_count: u32);

    /// 消息发送失败（乐观条目已转 Failed）
    async fn on_send_failed(&self, client_temp_id: String, reason: String);

    /// 图片上传失败（发送未执行，提示用户后可重试）
    async fn on_upload_failed(&self, reason: String);
}

/// 空实现（默认监听器）
pub struct EmptyChatEventListener;

#[async_trait]
impl ChatEventListener for EmptyChatEventListener {
    async fn on_connection_status_changed(&self, _connected: bool, _message: String) {}
    async fn on_new_message(&self, _message: String) {}
    async fn on_message_read(&self, _receipt: String) {}
    async fn on_conversation_read(&self, _receipt: String) {}
    async fn on_unread_count_changed(&self, _unread_count: u32) {}
    async fn on_send_failed(&self, _client_temp_id: String, _reason: String) {}
    async fn on_upload_failed(&self, _reason: String) {}
}
