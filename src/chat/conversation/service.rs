//! 会话列表服务层
//!
//! 把纯内存的 `ConversationList` 与后端 REST 拉取、回调通知串起来。
//! 入站消息无法匹配本地会话时（顾客首条消息会在服务端隐式建会话，
//! 本地没有其展示信息），触发整表刷新而不是凭空拼一条残缺记录。

use crate::chat::conversation::api::ChatApi;
use crate::chat::conversation::list::{ConversationList, UpsertOutcome};
use crate::chat::conversation::listener::{ConversationListener, EmptyConversationListener};
use crate::chat::conversation::models::Conversation;
use crate::chat::message::ChatMessage;
use anyhow::Result;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{debug, error, info};

/// 会话列表服务
pub struct ConversationService {
    api: ChatApi,
    list: Mutex<ConversationList>,
    listener: Arc<dyn ConversationListener>,
    /// 每页拉取的会话数
    limit: usize,
    /// 整表刷新次数（诊断用）
    refresh_count: AtomicU64,
}

impl ConversationService {
    pub fn new(api: ChatApi, owner_user_id: String, limit: usize) -> Self {
        Self::with_listener(api, owner_user_id, limit, Arc::new(EmptyConversationListener))
    }

    pub fn with_listener(
        api: ChatApi,
        owner_user_id: String,
        limit: usize,
        listener: Arc<dyn ConversationListener>,
    ) -> Self {
        Self {
            api,
            list: Mutex::new(ConversationList::new(owner_user_id)),
            listener,
            limit,
            refresh_count: AtomicU64::new(0),
        }
    }

    /// 从后端整表刷新会话列表
    ///
    /// 既是初次加载路径，也是入站消息匹配不到会话时的兜底恢复路径。
    /// 拉取失败只记日志，保留现有（可能过期的）列表。
    pub async fn refresh_list(&self) -> Result<()> {
        self.refresh_count.fetch_add(1, Ordering::Relaxed);
        info!("[ConvService] 🔄 刷新会话列表...");
        let conversations = self.api.get_conversations(self.limit).await?;
        self.load_list(conversations);
        Ok(())
    }

    /// 把拉取结果装入列表并触发回调
    pub fn load_list(&self, conversations: Vec<Conversation>) {
        let (snapshot, total) = {
            let mut list = self.list.lock().unwrap();
            list.replace_all(conversations);
            (list.snapshot(), list.total_unread())
        };
        let json = serde_json::to_string(&snapshot).unwrap_or_else(|_| "[]".to_string());
        let listener = self.listener.clone();
        tokio::spawn(async move {
            listener.on_conversation_list_refreshed(json).await;
            listener.on_total_unread_message_count_changed(total).await;
        });
    }

    /// 基于入站消息实时更新会话（预览、时间戳、未读数、排序）
    pub async fn on_new_message(&self, message: &ChatMessage) -> Result<()> {
        let (outcome, changed, total) = {
            let mut list = self.list.lock().unwrap();
            let outcome = list.upsert_from_message(message);
            let changed = list.snapshot().into_iter().next();
            (outcome, changed, list.total_unread())
        };

        match outcome {
            UpsertOutcome::Updated => {
                if let Some(conv) = changed {
                    let json = serde_json::to_string(&conv).unwrap_or_else(|_| "{}".to_string());
                    self.listener.on_conversation_changed(json).await;
                }
                self.listener
                    .on_total_unread_message_count_changed(total)
                    .await;
                Ok(())
            }
            UpsertOutcome::Unknown => {
                info!(
                    "[ConvService] 🆕 检测到新会话（senderId={}），触发整表刷新",
                    message.sender_id
                );
                self.listener
                    .on_new_conversation_detected(message.sender_id.clone())
                    .await;
                if let Err(e) = self.refresh_list().await {
                    // 刷新失败保留现有列表，等待下一次事件或用户手动刷新
                    error!("[ConvService] ❌ 新会话兜底刷新失败: {}", e);
                }
                Ok(())
            }
        }
    }

    /// 选中会话：清零未读数并返回会话快照（含对端用户信息）
    pub async fn select(&self, conversation_id: &str) -> Option<Conversation> {
        let (selected, total) = {
            let mut list = self.list.lock().unwrap();
            (list.select(conversation_id), list.total_unread())
        };
        if selected.is_some() {
            debug!("[ConvService] 选中会话: {}", conversation_id);
            self.listener
                .on_total_unread_message_count_changed(total)
                .await;
        }
        selected
    }

    /// 取消选中
    pub fn deselect(&self) {
        self.list.lock().unwrap().deselect();
    }

    /// 未读数清零（对端 conversationRead 或管理员显式标记已读）
    pub async fn clear_unread(&self, conversation_id: &str) {
        let (cleared, total) = {
            let mut list = self.list.lock().unwrap();
            (list.clear_unread(conversation_id), list.total_unread())
        };
        if cleared {
            debug!("[ConvService] 会话未读清零: {}", conversation_id);
            self.listener
                .on_total_unread_message_count_changed(total)
                .await;
        }
    }

    pub fn selected_id(&self) -> Option<String> {
        self.list.lock().unwrap().selected_id()
    }

    pub fn selected(&self) -> Option<Conversation> {
        self.list.lock().unwrap().selected()
    }

    pub fn conversations(&self) -> Vec<Conversation> {
        self.list.lock().unwrap().snapshot()
    }

    pub fn total_unread(&self) -> i32 {
        self.list.lock().unwrap().total_unread()
    }

    /// 整表刷新触发次数
    pub fn refresh_count(&self) -> u64 {
        self.refresh_count.load(Ordering::Relaxed)
    }
}
