//! 会话列表回调接口

use async_trait::async_trait;

/// 会话列表回调接口
///
/// 参数统一为 JSON 字符串，便于跨语言绑定层直接透传
#[async_trait]
pub trait ConversationListener: Send + Sync {
    /// 列表整体刷新完成（初次加载或新会话兜底刷新）
    async fn on_conversation_list_refreshed(&self, conversation_list: String);

    /// 单个会话变更（预览/时间戳/未读数）
    async fn on_conversation_changed(&self, conversation: String);

    /// 检测到本地不存在的新会话，刷新已触发
    async fn on_new_conversation_detected(&self, sender_id: String);

    /// 总未读消息数变更
    async fn on_total_unread_message_count_changed(&self, total_unread_count: i32);
}

/// 空实现（默认监听器）
pub struct EmptyConversationListener;

#[async_trait]
impl ConversationListener for EmptyConversationListener {
    async fn on_conversation_list_refreshed(&self, _conversation_list: String) {}
    async fn on_conversation_changed(&self, _conversation: String) {}
    async fn on_new_conversation_detected(&self, _sender_id: String) {}
    async fn on_total_unread_message_count_changed(&self, _total_unread_count: i32) {}
}
