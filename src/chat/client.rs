//! 聊天客户端核心实现模块
//!
//! 把连接管理、消息序列、会话列表、未读计数和上传串成一个门面。
//! 两个界面共用同一个客户端：顾客端挂件（单隐式会话）与管理端
//! 客服台（会话列表）通过 `ChatSurface` 区分。

use crate::chat::connection::{
    ChatTransport, ConnectionState, ReconnectPolicy, SocketConnection, WebSocketTransport,
};
use crate::chat::conversation::{
    ChatApi, Conversation, ConversationListener, ConversationService, EmptyConversationListener,
};
use crate::chat::listener::{ChatEventListener, EmptyChatEventListener};
use crate::chat::message::{
    ChatMessage, MessageEntry, MessageKind, MessageStore, OrderRef, ProductRef, SenderType,
};
use crate::chat::serialization::{generate_temp_id, now_iso};
use crate::chat::types::{
    event, ConversationReadReceipt, MarkAsReadPayload, MessageReadReceipt, SendMessagePayload,
    SocketEnvelope,
};
use crate::chat::unread::UnreadTracker;
use crate::chat::upload::{AssetUploader, CHAT_UPLOAD_FOLDER};
use anyhow::{Context, Result};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, Mutex as AsyncMutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// 聊天界面类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatSurface {
    /// 顾客端挂件：与客服的单个隐式会话
    Customer,
    /// 管理端客服台：会话列表 + 逐会话未读数
    Admin,
}

/// 客户端配置
#[derive(Clone, Debug)]
pub struct ClientConfig {
    /// 当前用户 ID
    pub user_id: String,
    /// 握手用 access token
    pub token: String,
    /// 界面类型
    pub surface: ChatSurface,
    /// WebSocket 服务器 URL
    pub ws_url: String,
    /// 聊天命名空间
    pub namespace: String,
    /// HTTP API 基础地址
    pub api_base_url: String,
    /// 会话列表每次拉取的条数
    pub conversation_limit: usize,
    /// 重连策略
    pub reconnect: ReconnectPolicy,
}

impl ClientConfig {
    /// 创建默认配置
    pub fn new(user_id: String, token: String, surface: ChatSurface) -> Self {
        Self {
            user_id,
            token,
            surface,
            ws_url: "ws://localhost:8080".to_string(),
            namespace: "/chat".to_string(),
            api_base_url: "http://localhost:8080/api/v1".to_string(),
            conversation_limit: 50,
            reconnect: ReconnectPolicy::default(),
        }
    }
}

/// 聊天客户端
///
/// 核心聊天逻辑实现；界面层通过监听器接收事件，通过方法发起动作
#[derive(Clone)]
pub struct ChatClient {
    pub(crate) config: ClientConfig,
    api: ChatApi,
    uploader: AssetUploader,
    transport: Arc<dyn ChatTransport>,
    connection: Option<Arc<SocketConnection>>,
    store: Arc<MessageStore>,
    // 会话列表服务（仅管理端）
    conversations: Option<Arc<ConversationService>>,
    // 顾客端未读计数
    unread: Arc<UnreadTracker>,
    // 事件监听器（可由调用方注册）
    listener: Arc<dyn ChatEventListener>,
    conversation_listener: Arc<dyn ConversationListener>,
    received_msg_ids: Arc<Mutex<HashSet<String>>>,
    // 在途的历史拉取任务，切换会话时取消
    history_task: Arc<AsyncMutex<Option<JoinHandle<()>>>>,
}

impl ChatClient {
    /// 创建新的客户端（WebSocket 传输）
    pub fn new(config: ClientConfig) -> Result<Self> {
        Self::with_transport(config, Arc::new(WebSocketTransport))
    }

    /// 创建新的客户端并注入传输层（测试用假传输走这里）
    pub fn with_transport(config: ClientConfig, transport: Arc<dyn ChatTransport>) -> Result<Self> {
        // 带认证拦截器的 HTTP 客户端（token 通过 default_headers 自动添加），
        // API 与上传共享同一个连接池
        let http_client = reqwest::ClientBuilder::new()
            .default_headers({
                let mut headers = reqwest::header::HeaderMap::new();
                headers.insert(
                    reqwest::header::AUTHORIZATION,
                    reqwest::header::HeaderValue::from_str(&format!("Bearer {}", config.token))
                        .context("无效的 token")?,
                );
                headers
            })
            .build()
            .context("创建 HTTP 客户端失败")?;
        let api = ChatApi::with_client(http_client.clone(), config.api_base_url.clone());
        let uploader = AssetUploader::with_client(http_client, config.api_base_url.clone());

        Ok(Self {
            config,
            api,
            uploader,
            transport,
            connection: None,
            store: Arc::new(MessageStore::new()),
            conversations: None,
            unread: Arc::new(UnreadTracker::new()),
            listener: Arc::new(EmptyChatEventListener),
            conversation_listener: Arc::new(EmptyConversationListener),
            received_msg_ids: Arc::new(Mutex::new(HashSet::new())),
            history_task: Arc::new(AsyncMutex::new(None)),
        })
    }

    /// 注册聊天事件监听器
    pub fn set_listener(&mut self, listener: Arc<dyn ChatEventListener>) {
        self.listener = listener;
    }

    /// 注册会话列表监听器
    pub fn set_conversation_listener(&mut self, listener: Arc<dyn ConversationListener>) {
        self.conversation_listener = listener.clone();

        // 若服务已存在，则用新的监听器重建服务并刷新，保持回调一致
        if self.conversations.is_some() {
            let service = Arc::new(ConversationService::with_listener(
                self.api.clone(),
                self.config.user_id.clone(),
                self.config.conversation_limit,
                listener,
            ));
            self.conversations = Some(service.clone());
            if let Ok(handle) = tokio::runtime::Handle::try_current() {
                handle.spawn(async move {
                    if let Err(e) = service.refresh_list().await {
                        error!("[Client] ❌ 重建会话服务后刷新失败: {}", e);
                    }
                });
            }
        }
    }

    /// 构建 WebSocket 握手 URL（token 在握手时携带，不逐消息携带）
    fn build_url(&self) -> String {
        let surface = match self.config.surface {
            ChatSurface::Customer => "customer",
            ChatSurface::Admin => "admin",
        };
        format!(
            "{}{}/?token={}&userId={}&surface={}",
            self.config.ws_url, self.config.namespace, self.config.token, self.config.user_id, surface
        )
    }

    fn my_sender_type(&self) -> SenderType {
        match self.config.surface {
            ChatSurface::Customer => SenderType::User,
            ChatSurface::Admin => SenderType::Admin,
        }
    }

    /// 连接到服务器并在内部启动事件分发
    pub async fn connect(&mut self) -> Result<()> {
        info!(
            "[Client] 🔗 连接聊天服务 (user={}, surface={:?})",
            self.config.user_id, self.config.surface
        );

        let (inbound_tx, mut inbound_rx) = mpsc::channel::<SocketEnvelope>(256);
        let connection = Arc::new(SocketConnection::new(
            self.transport.clone(),
            self.build_url(),
            self.config.reconnect.clone(),
            inbound_tx,
        ));
        connection.open().await?;
        self.connection = Some(connection.clone());

        // 管理端：构建会话列表服务
        if self.config.surface == ChatSurface::Admin && self.conversations.is_none() {
            self.conversations = Some(Arc::new(ConversationService::with_listener(
                self.api.clone(),
                self.config.user_id.clone(),
                self.config.conversation_limit,
                self.conversation_listener.clone(),
            )));
        }

        // 连接状态变化转发给监听器（在线指示灯）
        let mut state_rx = connection.subscribe();
        let listener = self.listener.clone();
        tokio::spawn(async move {
            let mut last_connected = false;
            loop {
                let state = *state_rx.borrow_and_update();
                let connected = state == ConnectionState::Connected;
                if connected != last_connected {
                    listener
                        .on_connection_status_changed(connected, state.to_string())
                        .await;
                    last_connected = connected;
                }
                if state_rx.changed().await.is_err() {
                    break;
                }
            }
        });

        // 事件分发循环
        let client = self.clone();
        tokio::spawn(async move {
            info!("[Client] 📥 开始监听服务器事件");
            while let Some(envelope) = inbound_rx.recv().await {
                client.handle_event(envelope).await;
            }
            debug!("[Client] 事件分发循环退出");
        });

        // 初始数据拉取：失败只记日志，界面保持现有（可能为空的）数据
        match self.config.surface {
            ChatSurface::Admin => {
                if let Some(service) = self.conversations.clone() {
                    tokio::spawn(async move {
                        info!("[Client] 🔄 拉取初始会话列表");
                        if let Err(e) = service.refresh_list().await {
                            error!("[Client] ❌ 初始会话列表拉取失败: {}", e);
                        }
                    });
                }
            }
            ChatSurface::Customer => {
                let api = self.api.clone();
                let store = self.store.clone();
                let unread = self.unread.clone();
                let listener = self.listener.clone();
                tokio::spawn(async move {
                    info!("[Client] 🔄 拉取本人会话历史");
                    match api.get_my_history().await {
                        Ok(history) => {
                            let unread_count = history.count.messages.max(0) as u32;
                            store.load_history(history.messages);
                            unread.set_count(unread_count);
                            listener.on_unread_count_changed(unread_count).await;
                        }
                        Err(e) => error!("[Client] ❌ 本人会话历史拉取失败: {}", e),
                    }
                });
            }
        }

        Ok(())
    }

    /// 断开连接并取消在途任务
    pub async fn disconnect(&self) {
        if let Some(handle) = self.history_task.lock().await.take() {
            handle.abort();
        }
        if let Some(connection) = &self.connection {
            connection.close();
        }
    }

    /// 处理单个入站事件
    async fn handle_event(&self, envelope: SocketEnvelope) {
        match envelope.event.as_str() {
            event::NEW_MESSAGE => match serde_json::from_value::<ChatMessage>(envelope.data) {
                Ok(message) => self.handle_new_message(message).await,
                Err(e) => warn!("[Client] ⚠️ newMessage 负载解析失败: {}", e),
            },
            event::MESSAGE_READ => {
                match serde_json::from_value::<MessageReadReceipt>(envelope.data) {
                    Ok(receipt) => self.handle_message_read(receipt).await,
                    Err(e) => warn!("[Client] ⚠️ messageRead 负载解析失败: {}", e),
                }
            }
            event::CONVERSATION_READ => {
                match serde_json::from_value::<ConversationReadReceipt>(envelope.data) {
                    Ok(receipt) => self.handle_conversation_read(receipt).await,
                    Err(e) => warn!("[Client] ⚠️ conversationRead 负载解析失败: {}", e),
                }
            }
            event::HISTORY => match serde_json::from_value::<Vec<ChatMessage>>(envelope.data) {
                Ok(messages) => {
                    info!("[Client] 📥 收到历史消息 {} 条", messages.len());
                    self.store.load_history(messages);
                }
                Err(e) => warn!("[Client] ⚠️ history 负载解析失败: {}", e),
            },
            other => debug!("[Client] 未知事件: {}", other),
        }
    }

    fn is_duplicate_message(&self, msg_id: &str) -> bool {
        let mut set = self.received_msg_ids.lock().unwrap();
        !set.insert(msg_id.to_string())
    }

    async fn handle_new_message(&self, message: ChatMessage) {
        // 乐观回显不算重复：它要替换掉已插入的 Pending 条目
        let is_confirmation = message
            .client_temp_id
            .as_deref()
            .map(|t| self.store.has_pending(t))
            .unwrap_or(false);
        if !is_confirmation && self.is_duplicate_message(&message.id) {
            debug!("[Client] 忽略重复消息: id={}", message.id);
            return;
        }

        let mut stored = message.clone();

        // 顾客端：面板打开时自动已读，关闭时计未读并提醒
        if self.config.surface == ChatSurface::Customer
            && message.sender_type == SenderType::Admin
            && !is_confirmation
        {
            if self.unread.surface_open() {
                if let Err(e) = self
                    .emit_mark_as_read(message.conversation_id.as_deref())
                    .await
                {
                    warn!("[Client] ⚠️ 自动已读上报失败: {}", e);
                }
                stored.is_read = true;
            } else if !message.is_read {
                let count = self.unread.increment();
                self.listener.on_unread_count_changed(count).await;
            }
        }

        // 当前会话相关性：管理端看选中会话；顾客端只有一个隐式会话
        let relevant = match self.config.surface {
            ChatSurface::Customer => true,
            ChatSurface::Admin => match self.conversations.as_ref().and_then(|s| s.selected()) {
                Some(conv) => message.belongs_to(&conv.id, &conv.user_id, &self.config.user_id),
                None => false,
            },
        };
        if relevant {
            self.store.reconcile(stored);
        }

        // 管理端：更新会话列表（预览/未读/排序，匹配不到则整表刷新）
        if let Some(service) = &self.conversations {
            if let Err(e) = service.on_new_message(&message).await {
                error!("[Client] ❌ 会话列表更新失败: {}", e);
            }
        }

        let json = serde_json::to_string(&message).unwrap_or_default();
        self.listener.on_new_message(json).await;
    }

    async fn handle_message_read(&self, receipt: MessageReadReceipt) {
        // 对端已读我发出的消息：翻转本端消息的 isRead 展示
        let apply = match self.config.surface {
            ChatSurface::Customer => true,
            ChatSurface::Admin => {
                self.conversations
                    .as_ref()
                    .and_then(|s| s.selected_id())
                    .as_deref()
                    == Some(receipt.conversation_id.as_str())
            }
        };
        if apply {
            let changed = self.store.mark_read_from(self.my_sender_type());
            debug!(
                "[Client] 📖 已读回执生效: conversationID={}, 翻转 {} 条",
                receipt.conversation_id, changed
            );
        }
        let json = serde_json::to_string(&receipt).unwrap_or_default();
        self.listener.on_message_read(json).await;
    }

    async fn handle_conversation_read(&self, receipt: ConversationReadReceipt) {
        if let Some(service) = &self.conversations {
            service.clear_unread(&receipt.conversation_id).await;
        }
        let json = serde_json::to_string(&receipt).unwrap_or_default();
        self.listener.on_conversation_read(json).await;
    }

    async fn emit_mark_as_read(&self, conversation_id: Option<&str>) -> Result<()> {
        let connection = self
            .connection
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("未连接"))?;
        let payload = MarkAsReadPayload {
            conversation_id: conversation_id.map(|s| s.to_string()),
        };
        connection
            .emit(event::MARK_AS_READ, serde_json::to_value(&payload)?)
            .await
    }

    /// 标记已读：清零本地计数并上报对端
    ///
    /// 已读回执是尽力而为的展示信号，上报失败不影响本地清零
    pub async fn mark_as_read(&self, conversation_id: Option<&str>) {
        match self.config.surface {
            ChatSurface::Customer => {
                let cleared = self.unread.clear();
                self.store.mark_read_from(SenderType::Admin);
                if cleared > 0 {
                    self.listener.on_unread_count_changed(0).await;
                }
            }
            ChatSurface::Admin => {
                if let (Some(id), Some(service)) = (conversation_id, &self.conversations) {
                    service.clear_unread(id).await;
                }
            }
        }
        if let Err(e) = self.emit_mark_as_read(conversation_id).await {
            warn!("[Client] ⚠️ 已读上报失败: {}", e);
        }
    }

    /// 顾客端：聊天面板开合状态；打开即视为读完当前消息
    pub async fn set_surface_open(&self, open: bool) {
        self.unread.set_surface_open(open);
        if open {
            self.mark_as_read(None).await;
        }
    }

    /// 管理端：选中会话
    ///
    /// 清零未读、上报已读，并拉取该顾客的历史消息；
    /// 切换会话会取消上一次仍在途的历史拉取，避免过期数据回填
    pub async fn select_conversation(&self, conversation_id: &str) -> Result<()> {
        let service = self
            .conversations
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("会话列表仅管理端可用"))?;
        let conversation = service
            .select(conversation_id)
            .await
            .ok_or_else(|| anyhow::anyhow!("会话不存在: {}", conversation_id))?;

        if let Err(e) = self.emit_mark_as_read(Some(conversation_id)).await {
            warn!("[Client] ⚠️ 已读上报失败: {}", e);
        }

        let mut guard = self.history_task.lock().await;
        if let Some(handle) = guard.take() {
            handle.abort();
        }
        let api = self.api.clone();
        let store = self.store.clone();
        let counterpart = conversation.user_id.clone();
        *guard = Some(tokio::spawn(async move {
            match api.get_history(&counterpart).await {
                Ok(history) => store.load_history(history.messages),
                Err(e) => error!("[Client] ❌ 历史拉取失败，保留现有消息: {}", e),
            }
        }));
        Ok(())
    }

    /// 发送文本消息
    pub async fn send_text_message(
        &self,
        to_user_id: Option<&str>,
        content: &str,
    ) -> Result<String> {
        self.send_rich_message(to_user_id, MessageKind::Text, content.to_string(), None)
            .await
    }

    /// 发送图片消息（URL 已由上传步骤换取）
    pub async fn send_image_message(
        &self,
        to_user_id: Option<&str>,
        url: &str,
        alt: &str,
    ) -> Result<String> {
        let metadata = serde_json::json!({ "url": url, "alt": alt });
        self.send_rich_message(
            to_user_id,
            MessageKind::Image,
            "Sent an image".to_string(),
            Some(metadata),
        )
        .await
    }

    /// 发送商品卡片
    pub async fn send_product_message(
        &self,
        to_user_id: Option<&str>,
        product: &ProductRef,
    ) -> Result<String> {
        let content = format!("Shared a product: {}", product.name);
        self.send_rich_message(
            to_user_id,
            MessageKind::Product,
            content,
            Some(serde_json::to_value(product)?),
        )
        .await
    }

    /// 发送订单卡片
    pub async fn send_order_message(
        &self,
        to_user_id: Option<&str>,
        order: &OrderRef,
    ) -> Result<String> {
        let content = format!("Referenced an order: #{}", order.id);
        self.send_rich_message(
            to_user_id,
            MessageKind::Order,
            content,
            Some(serde_json::to_value(order)?),
        )
        .await
    }

    /// 先上传图片再发送 IMAGE 消息
    ///
    /// 上传失败只通知用户，不发送消息
    pub async fn upload_and_send_image(
        &self,
        to_user_id: Option<&str>,
        file_name: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String> {
        let url = match self
            .uploader
            .upload_image(file_name, bytes, content_type, CHAT_UPLOAD_FOLDER)
            .await
        {
            Ok(url) => url,
            Err(e) => {
                self.listener.on_upload_failed(e.to_string()).await;
                return Err(e.context("图片上传失败"));
            }
        };
        self.send_image_message(to_user_id, &url, file_name).await
    }

    /// 通用发送：先乐观入列，再发射 sendMessage 事件
    ///
    /// 发射失败时乐观条目转 Failed，返回错误但不影响其他消息
    async fn send_rich_message(
        &self,
        to_user_id: Option<&str>,
        kind: MessageKind,
        content: String,
        metadata: Option<serde_json::Value>,
    ) -> Result<String> {
        let client_temp_id = generate_temp_id();
        let conversation_id = match self.config.surface {
            ChatSurface::Admin => self.conversations.as_ref().and_then(|s| s.selected_id()),
            ChatSurface::Customer => None,
        };
        debug!(
            "[Client] 🔧 构造消息: kind={:?}, clientTempId={}",
            kind, client_temp_id
        );

        let draft = ChatMessage {
            id: client_temp_id.clone(),
            client_temp_id: Some(client_temp_id.clone()),
            conversation_id,
            sender_id: self.config.user_id.clone(),
            sender_type: self.my_sender_type(),
            content: content.clone(),
            kind,
            metadata: metadata.clone(),
            sent_at: now_iso(),
            is_read: false,
        };
        self.store.append_optimistic(draft);

        let payload = SendMessagePayload {
            content,
            to_user_id: to_user_id.map(|s| s.to_string()),
            client_temp_id: client_temp_id.clone(),
            kind,
            metadata,
        };
        let emitted = match self.connection.as_ref() {
            Some(connection) => {
                connection
                    .emit(event::SEND_MESSAGE, serde_json::to_value(&payload)?)
                    .await
            }
            None => Err(anyhow::anyhow!("未连接")),
        };
        match emitted {
            Ok(()) => {
                info!(
                    "[Client] ✅ 消息已发送，等待回显: clientTempId={}",
                    client_temp_id
                );
                Ok(client_temp_id)
            }
            Err(e) => {
                self.store.mark_send_failed(&client_temp_id);
                self.listener
                    .on_send_failed(client_temp_id, e.to_string())
                    .await;
                Err(e.context("消息发送失败"))
            }
        }
    }

    // ===================== 状态访问 =====================

    /// 当前会话的消息序列（到达顺序）
    pub fn messages(&self) -> Vec<MessageEntry> {
        self.store.entries()
    }

    /// 会话列表快照（管理端；顾客端恒为空）
    pub fn conversations(&self) -> Vec<Conversation> {
        self.conversations
            .as_ref()
            .map(|s| s.conversations())
            .unwrap_or_default()
    }

    /// 会话列表服务（管理端）
    pub fn conversation_service(&self) -> Option<Arc<ConversationService>> {
        self.conversations.clone()
    }

    /// 顾客端未读计数
    pub fn unread_count(&self) -> u32 {
        self.unread.count()
    }

    /// 管理端所有会话未读数之和
    pub fn total_unread_count(&self) -> i32 {
        self.conversations
            .as_ref()
            .map(|s| s.total_unread())
            .unwrap_or(0)
    }

    pub fn is_connected(&self) -> bool {
        self.connection
            .as_ref()
            .map(|c| c.is_connected())
            .unwrap_or(false)
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.connection
            .as_ref()
            .map(|c| c.state())
            .unwrap_or(ConnectionState::Disconnected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::connection::{TransportChannel, TransportEvent};
    use crate::chat::conversation::models::{ChatUser, MessageCount};
    use crate::chat::message::DeliveryState;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Once;
    use std::time::Duration;
    use tokio::time::sleep;

    static INIT_LOGGER: Once = Once::new();

    fn init_test_logger() {
        INIT_LOGGER.call_once(|| {
            use tracing_subscriber::prelude::*;
            use tracing_subscriber::EnvFilter;

            // 测试中默认打开当前 crate 的 debug，关闭底层 HTTP 客户端的噪音
            let filter_layer = EnvFilter::new(
                "info,support_chat_sdk_rust=debug,hyper_util::client=info,reqwest=info",
            );

            let fmt_layer = tracing_subscriber::fmt::layer()
                .with_file(true)
                .with_line_number(true)
                .with_target(false)
                .with_test_writer();

            tracing_subscriber::registry()
                .with(filter_layer)
                .with(fmt_layer)
                .init();
        });
    }

    /// 内存假传输：测试端可读取客户端发出的帧，也可注入入站帧
    struct FakeTransport {
        connect_count: AtomicU32,
        server_rx: AsyncMutex<Option<mpsc::Receiver<String>>>,
        server_tx: AsyncMutex<Option<mpsc::Sender<TransportEvent>>>,
    }

    impl FakeTransport {
        fn new() -> Self {
            Self {
                connect_count: AtomicU32::new(0),
                server_rx: AsyncMutex::new(None),
                server_tx: AsyncMutex::new(None),
            }
        }

        async fn inject(&self, envelope: serde_json::Value) {
            let tx = self.server_tx.lock().await.clone().unwrap();
            tx.send(TransportEvent::Frame(envelope.to_string()))
                .await
                .unwrap();
        }

        async fn next_frame(&self) -> SocketEnvelope {
            let mut guard = self.server_rx.lock().await;
            let rx = guard.as_mut().unwrap();
            let frame = tokio::time::timeout(Duration::from_secs(1), rx.recv())
                .await
                .expect("等待客户端帧超时")
                .expect("帧通道已关闭");
            serde_json::from_str(&frame).unwrap()
        }
    }

    #[async_trait]
    impl ChatTransport for FakeTransport {
        async fn connect(&self, _url: &str) -> anyhow::Result<TransportChannel> {
            self.connect_count.fetch_add(1, Ordering::SeqCst);
            let (out_tx, out_rx) = mpsc::channel(64);
            let (in_tx, in_rx) = mpsc::channel(64);
            *self.server_rx.lock().await = Some(out_rx);
            *self.server_tx.lock().await = Some(in_tx);
            Ok(TransportChannel {
                outgoing: out_tx,
                incoming: in_rx,
            })
        }
    }

    fn test_config(surface: ChatSurface) -> ClientConfig {
        let mut config = ClientConfig::new("me".to_string(), "test-token".to_string(), surface);
        // 不可达地址：初始 REST 拉取失败仅打日志
        config.api_base_url = "http://127.0.0.1:1/api/v1".to_string();
        config.reconnect = ReconnectPolicy {
            max_attempts: 2,
            base_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(40),
        };
        config
    }

    async fn wait_until<F: Fn() -> bool>(cond: F) {
        for _ in 0..200 {
            if cond() {
                return;
            }
            sleep(Duration::from_millis(10)).await;
        }
        panic!("等待条件超时");
    }

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

    #[tokio::test]
    async fn customer_send_and_echo_collapse_to_one_confirmed_message() {
        init_test_logger();
        let transport = Arc::new(FakeTransport::new());
        let mut client =
            ChatClient::with_transport(test_config(ChatSurface::Customer), transport.clone())
                .unwrap();
        client.connect().await.unwrap();
        assert!(client.is_connected());

        let temp_id = client.send_text_message(None, "Hello").await.unwrap();

        // 客户端发出的帧携带关联 ID
        let frame = transport.next_frame().await;
        assert_eq!(frame.event, event::SEND_MESSAGE);
        assert_eq!(frame.data["clientTempId"], temp_id.as_str());
        assert_eq!(frame.data["content"], "Hello");

        // 乐观条目立即可见
        let entries = client.messages();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].delivery, DeliveryState::Pending);

        // 服务端回显
        transport
            .inject(serde_json::json!({
                "event": "newMessage",
                "data": {
                    "id": "m1",
                    "clientTempId": temp_id,
                    "conversationId": "c1",
                    "senderId": "me",
                    "senderType": "USER",
                    "content": "Hello",
                    "sentAt": "2026-01-01T00:00:01.000Z",
                    "isRead": false
                }
            }))
            .await;

        wait_until(|| {
            let entries = client.messages();
            entries.len() == 1
                && entries[0].message.id == "m1"
                && entries[0].delivery == DeliveryState::Confirmed
        })
        .await;
    }

    #[tokio::test]
    async fn customer_unread_counts_only_while_closed() {
        init_test_logger();
        let transport = Arc::new(FakeTransport::new());
        let mut client =
            ChatClient::with_transport(test_config(ChatSurface::Customer), transport.clone())
                .unwrap();
        client.connect().await.unwrap();

        // 面板关闭：客服消息计入未读
        transport
            .inject(serde_json::json!({
                "event": "newMessage",
                "data": {
                    "id": "a1",
                    "conversationId": "c1",
                    "senderId": "admin-1",
                    "senderType": "ADMIN",
                    "content": "need help?",
                    "sentAt": "2026-01-01T00:00:01.000Z",
                    "isRead": false
                }
            }))
            .await;
        wait_until(|| client.unread_count() == 1).await;
        assert_eq!(client.messages().len(), 1);

        // 打开面板：清零并上报已读
        client.set_surface_open(true).await;
        assert_eq!(client.unread_count(), 0);
        assert!(client.messages()[0].message.is_read);
        let frame = transport.next_frame().await;
        assert_eq!(frame.event, event::MARK_AS_READ);

        // 面板打开期间的新消息不再累计未读
        transport
            .inject(serde_json::json!({
                "event": "newMessage",
                "data": {
                    "id": "a2",
                    "conversationId": "c1",
                    "senderId": "admin-1",
                    "senderType": "ADMIN",
                    "content": "still there?",
                    "sentAt": "2026-01-01T00:00:02.000Z",
                    "isRead": false
                }
            }))
            .await;
        wait_until(|| client.messages().len() == 2).await;
        assert_eq!(client.unread_count(), 0);
        assert!(client.messages()[1].message.is_read);
    }

    #[tokio::test]
    async fn admin_list_reorders_and_counts_unread_for_unselected_only() {
        init_test_logger();
        let transport = Arc::new(FakeTransport::new());
        let mut client =
            ChatClient::with_transport(test_config(ChatSurface::Admin), transport.clone()).unwrap();
        client.connect().await.unwrap();

        let service = client.conversation_service().unwrap();
        service.load_list(vec![
            conv("a", "u1", "2026-01-01T10:00:00.000Z"),
            conv("b", "u2", "2026-01-01T09:00:00.000Z"),
        ]);

        client.select_conversation("a").await.unwrap();
        let frame = transport.next_frame().await;
        assert_eq!(frame.event, event::MARK_AS_READ);
        assert_eq!(frame.data["conversationId"], "a");

        // 未选中会话 b 的顾客消息：移到表头并 +1
        transport
            .inject(serde_json::json!({
                "event": "newMessage",
                "data": {
                    "id": "m-b1",
                    "conversationId": "b",
                    "senderId": "u2",
                    "senderType": "USER",
                    "content": "order question",
                    "sentAt": "2026-01-01T11:00:00.000Z",
                    "isRead": false
                }
            }))
            .await;
        wait_until(|| {
            let list = client.conversations();
            !list.is_empty() && list[0].id == "b" && list[0].unread_count() == 1
        })
        .await;
        // 非当前会话的消息不进入消息序列
        assert!(client.messages().is_empty());

        // 选中会话 a 的顾客消息：未读保持 0，预览/时间戳照常更新
        transport
            .inject(serde_json::json!({
                "event": "newMessage",
                "data": {
                    "id": "m-a1",
                    "conversationId": "a",
                    "senderId": "u1",
                    "senderType": "USER",
                    "content": "hello admin",
                    "sentAt": "2026-01-01T12:00:00.000Z",
                    "isRead": false
                }
            }))
            .await;
        wait_until(|| {
            let list = client.conversations();
            !list.is_empty() && list[0].id == "a"
        })
        .await;
        let list = client.conversations();
        assert_eq!(list[0].unread_count(), 0);
        assert_eq!(list[0].updated_at, "2026-01-01T12:00:00.000Z");
        assert_eq!(client.total_unread_count(), 1);
        // 当前会话的消息进入消息序列
        wait_until(|| client.messages().len() == 1).await;

        // 对端已读整个会话 b
        transport
            .inject(serde_json::json!({
                "event": "conversationRead",
                "data": { "conversationId": "b", "readBy": "u2" }
            }))
            .await;
        wait_until(|| client.total_unread_count() == 0).await;
    }

    #[tokio::test]
    async fn peer_read_receipt_flips_own_messages() {
        init_test_logger();
        let transport = Arc::new(FakeTransport::new());
        let mut client =
            ChatClient::with_transport(test_config(ChatSurface::Customer), transport.clone())
                .unwrap();
        client.connect().await.unwrap();

        client.send_text_message(None, "Hi support").await.unwrap();
        let _ = transport.next_frame().await;
        assert!(!client.messages()[0].message.is_read);

        transport
            .inject(serde_json::json!({
                "event": "messageRead",
                "data": { "conversationId": "c1", "userId": "admin-1" }
            }))
            .await;
        wait_until(|| client.messages()[0].message.is_read).await;
    }

    #[tokio::test]
    async fn send_without_connection_marks_entry_failed() {
        init_test_logger();
        let transport = Arc::new(FakeTransport::new());
        let client =
            ChatClient::with_transport(test_config(ChatSurface::Customer), transport).unwrap();
        // 未 connect 直接发送
        let result = client.send_text_message(None, "Hello").await;
        assert!(result.is_err());
        let entries = client.messages();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].delivery, DeliveryState::Failed);
    }

    #[tokio::test]
    #[ignore]
    async fn run_support_chat_client() {
        // 需要本地后端，手动运行：cargo test -- --ignored
        init_test_logger();

        let login = match crate::chat::auth::login_async(
            "http://localhost:8080/api/v1",
            "admin@example.com".to_string(),
            "admin123".to_string(),
        )
        .await
        {
            Ok(data) => data,
            Err(e) => {
                tracing::error!("登录失败: {}", e);
                return;
            }
        };

        let config = ClientConfig::new(login.user.id.clone(), login.access_token, ChatSurface::Admin);
        let mut client = ChatClient::new(config).unwrap();
        if let Err(e) = client.connect().await {
            tracing::error!("连接失败: {}", e);
            return;
        }

        tracing::info!("📥 客户端运行中，等待消息推送...");
        sleep(Duration::from_secs(3600)).await;
    }
}
