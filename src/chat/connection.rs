//! Socket 连接管理
//!
//! 每个聊天界面持有一条经握手鉴权的实时连接。连接对象显式构造、
//! 显式开关，传输层通过 `ChatTransport` 注入，测试可替换为内存假传输。
//!
//! 连接状态机：Disconnected -> Connecting -> Connected
//! -> (Reconnecting -> Connected | Disconnected)

use crate::chat::types::SocketEnvelope;
use anyhow::{Context, Result};
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval, sleep};
use tokio_tungstenite::{connect_async, tungstenite::Message as WsMessage};
use tracing::{debug, error, info, warn};

/// 连接状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Reconnecting => "reconnecting",
        };
        f.write_str(s)
    }
}

/// 重连策略：指数退避，封顶延迟，超过最大次数后放弃
#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl ReconnectPolicy {
    /// 第 attempt 次重试前的等待时长（attempt 从 1 开始）
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(16);
        let millis = (self.base_delay.as_millis() as u64).saturating_mul(1u64 << exp);
        Duration::from_millis(millis.min(self.max_delay.as_millis() as u64))
    }
}

/// 传输层事件
#[derive(Debug)]
pub enum TransportEvent {
    /// 一帧文本
    Frame(String),
    /// 连接断开（含可选原因）
    Closed(Option<String>),
}

/// 一次成功握手得到的双向通道
pub struct TransportChannel {
    /// 发往线上的文本帧
    pub outgoing: mpsc::Sender<String>,
    /// 来自线上的帧与断开事件
    pub incoming: mpsc::Receiver<TransportEvent>,
}

/// 传输层抽象：负责按 URL 建立一条帧通道
///
/// 生产环境使用 [`WebSocketTransport`]，测试注入内存假传输
#[async_trait]
pub trait ChatTransport: Send + Sync {
    async fn connect(&self, url: &str) -> Result<TransportChannel>;
}

/// WebSocket 传输（tokio-tungstenite）
///
/// 写侧带 25 秒心跳 Ping；读侧把文本帧和断开事件转发到通道
pub struct WebSocketTransport;

#[async_trait]
impl ChatTransport for WebSocketTransport {
    async fn connect(&self, url: &str) -> Result<TransportChannel> {
        let (ws_stream, response) = connect_async(url).await.context("WebSocket 握手失败")?;
        info!("[Conn] ✅ WebSocket 连接成功, 状态: {}", response.status());

        let (mut write, mut read) = ws_stream.split();
        let (out_tx, mut out_rx) = mpsc::channel::<String>(64);
        let (in_tx, in_rx) = mpsc::channel::<TransportEvent>(256);

        // 写泵 + 心跳
        tokio::spawn(async move {
            let mut ticker = interval(Duration::from_secs(25));
            loop {
                tokio::select! {
                    maybe_frame = out_rx.recv() => match maybe_frame {
                        Some(text) => {
                            if write.send(WsMessage::Text(text)).await.is_err() {
                                break;
                            }
                        }
                        None => break,
                    },
                    _ = ticker.tick() => {
                        if write.send(WsMessage::Ping(vec![])).await.is_err() {
                            break;
                        }
                    }
                }
            }
            debug!("[Conn] 写泵退出");
        });

        // 读泵
        tokio::spawn(async move {
            while let Some(next) = read.next().await {
                match next {
                    Ok(WsMessage::Text(text)) => {
                        if in_tx.send(TransportEvent::Frame(text)).await.is_err() {
                            return;
                        }
                    }
                    Ok(WsMessage::Ping(_)) | Ok(WsMessage::Pong(_)) => {}
                    Ok(WsMessage::Close(frame)) => {
                        let reason = frame.map(|f| f.reason.to_string());
                        let _ = in_tx.send(TransportEvent::Closed(reason)).await;
                        return;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        let _ = in_tx
                            .send(TransportEvent::Closed(Some(e.to_string())))
                            .await;
                        return;
                    }
                }
            }
            let _ = in_tx.send(TransportEvent::Closed(None)).await;
        });

        Ok(TransportChannel {
            outgoing: out_tx,
            incoming: in_rx,
        })
    }
}

/// Socket 连接管理器
///
/// 持有一条连接及其状态机；入站事件解析为 [`SocketEnvelope`]
/// 后送入构造时传入的通道，由客户端的分发循环消费
pub struct SocketConnection {
    transport: Arc<dyn ChatTransport>,
    url: String,
    policy: ReconnectPolicy,
    state_tx: watch::Sender<ConnectionState>,
    state_rx: watch::Receiver<ConnectionState>,
    outgoing: Arc<Mutex<Option<mpsc::Sender<String>>>>,
    inbound_tx: mpsc::Sender<SocketEnvelope>,
    pump: Mutex<Option<JoinHandle<()>>>,
}

impl SocketConnection {
    pub fn new(
        transport: Arc<dyn ChatTransport>,
        url: String,
        policy: ReconnectPolicy,
        inbound_tx: mpsc::Sender<SocketEnvelope>,
    ) -> Self {
        let (state_tx, state_rx) = watch::channel(ConnectionState::Disconnected);
        Self {
            transport,
            url,
            policy,
            state_tx,
            state_rx,
            outgoing: Arc::new(Mutex::new(None)),
            inbound_tx,
            pump: Mutex::new(None),
        }
    }

    /// 建立连接（幂等：已有存活连接时为空操作）
    pub async fn open(&self) -> Result<()> {
        {
            let pump = self.pump.lock().unwrap();
            if let Some(handle) = pump.as_ref() {
                if !handle.is_finished() {
                    debug!("[Conn] 连接已存活，open 为空操作");
                    return Ok(());
                }
            }
        }

        info!("[Conn] 🔗 正在建立连接...");
        self.state_tx.send_replace(ConnectionState::Connecting);

        let channel = match self.transport.connect(&self.url).await {
            Ok(channel) => channel,
            Err(e) => {
                self.state_tx.send_replace(ConnectionState::Disconnected);
                return Err(e).context("连接失败");
            }
        };

        *self.outgoing.lock().unwrap() = Some(channel.outgoing);
        self.state_tx.send_replace(ConnectionState::Connected);
        info!("[Conn] ✅ 连接已建立");

        let handle = tokio::spawn(Self::run(
            self.transport.clone(),
            self.url.clone(),
            self.policy.clone(),
            self.state_tx.clone(),
            self.outgoing.clone(),
            self.inbound_tx.clone(),
            channel.incoming,
        ));
        *self.pump.lock().unwrap() = Some(handle);
        Ok(())
    }

    /// 事件泵：转发入站帧；断开后按策略重连，放弃后进入 Disconnected
    async fn run(
        transport: Arc<dyn ChatTransport>,
        url: String,
        policy: ReconnectPolicy,
        state_tx: watch::Sender<ConnectionState>,
        outgoing: Arc<Mutex<Option<mpsc::Sender<String>>>>,
        inbound_tx: mpsc::Sender<SocketEnvelope>,
        mut incoming: mpsc::Receiver<TransportEvent>,
    ) {
        loop {
            while let Some(event) = incoming.recv().await {
                match event {
                    TransportEvent::Frame(text) => {
                        match serde_json::from_str::<SocketEnvelope>(&text) {
                            Ok(envelope) => {
                                if inbound_tx.send(envelope).await.is_err() {
                                    // 分发端已关闭，连接随之结束
                                    *outgoing.lock().unwrap() = None;
                                    state_tx.send_replace(ConnectionState::Disconnected);
                                    return;
                                }
                            }
                            Err(e) => {
                                warn!("[Conn] ⚠️ 忽略无法解析的帧: {}, 原始内容: {}", e, text);
                            }
                        }
                    }
                    TransportEvent::Closed(reason) => {
                        warn!("[Conn] 👋 连接断开: {:?}", reason);
                        break;
                    }
                }
            }

            // 断开：清掉发送端，按策略重连
            *outgoing.lock().unwrap() = None;
            state_tx.send_replace(ConnectionState::Reconnecting);

            let mut reconnected = false;
            for attempt in 1..=policy.max_attempts {
                let delay = policy.delay_for(attempt);
                info!(
                    "[Conn] 🔄 第 {}/{} 次重连，{} ms 后尝试",
                    attempt,
                    policy.max_attempts,
                    delay.as_millis()
                );
                sleep(delay).await;
                match transport.connect(&url).await {
                    Ok(channel) => {
                        *outgoing.lock().unwrap() = Some(channel.outgoing);
                        incoming = channel.incoming;
                        state_tx.send_replace(ConnectionState::Connected);
                        info!("[Conn] ✅ 重连成功");
                        reconnected = true;
                        break;
                    }
                    Err(e) => {
                        warn!("[Conn] ❌ 第 {} 次重连失败: {}", attempt, e);
                    }
                }
            }

            if !reconnected {
                error!(
                    "[Conn] ❌ 重连 {} 次均失败，放弃并进入断开状态",
                    policy.max_attempts
                );
                state_tx.send_replace(ConnectionState::Disconnected);
                return;
            }
        }
    }

    /// 关闭连接并停止重连
    pub fn close(&self) {
        if let Some(handle) = self.pump.lock().unwrap().take() {
            handle.abort();
        }
        *self.outgoing.lock().unwrap() = None;
        self.state_tx.send_replace(ConnectionState::Disconnected);
        info!("[Conn] 🔌 连接已关闭");
    }

    /// 发送一个事件帧；未连接时立刻失败
    pub async fn emit(&self, event: &str, data: serde_json::Value) -> Result<()> {
        let sender = self
            .outgoing
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| anyhow::anyhow!("未连接"))?;
        let frame = serde_json::to_string(&SocketEnvelope {
            event: event.to_string(),
            data,
        })?;
        sender
            .send(frame)
            .await
            .map_err(|_| anyhow::anyhow!("连接已关闭，发送失败"))?;
        Ok(())
    }

    pub fn state(&self) -> ConnectionState {
        *self.state_rx.borrow()
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// 订阅状态变化（UI 在线指示灯）
    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.state_rx.clone()
    }
}

impl Drop for SocketConnection {
    fn drop(&mut self) {
        if let Some(handle) = self.pump.lock().unwrap().take() {
            handle.abort();
        }
    }
}
