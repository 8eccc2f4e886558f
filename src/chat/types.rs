use serde::{Deserialize, Serialize};

/// Socket 事件名称
pub mod event {
    /// 服务器推送：新消息
    pub const NEW_MESSAGE: &str = "newMessage";
    /// 服务器推送：对端已读整个会话
    pub const CONVERSATION_READ: &str = "conversationRead";
    /// 服务器推送：对端已读消息（已读回执）
    pub const MESSAGE_READ: &str = "messageRead";
    /// 服务器推送：历史消息（连接建立后下发）
    pub const HISTORY: &str = "history";
    /// 客户端发出：发送消息
    pub const SEND_MESSAGE: &str = "sendMessage";
    /// 客户端发出：标记会话已读
    pub const MARK_AS_READ: &str = "markAsRead";
}

/// Socket 帧信封（文本帧，JSON 编码）
///
/// 所有进出 `/chat` 命名空间的事件都使用该结构：`{"event": ..., "data": ...}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SocketEnvelope {
    pub event: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

/// sendMessage 事件负载
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessagePayload {
    pub content: String,
    /// 接收方用户 ID；顾客端可省略（服务端路由到客服）
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to_user_id: Option<String>,
    /// 客户端关联 ID，用于乐观消息与服务端回显的匹配
    pub client_temp_id: String,
    #[serde(rename = "type")]
    pub kind: crate::chat::message::MessageKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

/// markAsRead 事件负载
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkAsReadPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
}

/// messageRead 事件负载（对端已读我发出的消息）
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageReadReceipt {
    #[serde(default)]
    pub conversation_id: String,
    #[serde(default)]
    pub user_id: String,
}

/// conversationRead 事件负载（某端已读整个会话）
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationReadReceipt {
    #[serde(default)]
    pub conversation_id: String,
    #[serde(default)]
    pub read_by: String,
}

/// 统一的 API 响应包装结构体
///
/// 后端通过响应拦截器统一返回 `{ data: ... }`；错误时返回 `{ message, statusCode }`。
/// data 字段可能为 null 或缺失，因此使用 `Option<T>`
#[derive(Debug, Deserialize)]
pub struct ApiResponse<T> {
    #[serde(default = "Option::default")]
    pub data: Option<T>,
    #[serde(default)]
    pub message: Option<String>,
}

/// 通用 HTTP 响应处理函数：直接反序列化为统一的响应结构体
///
/// 返回 `ApiResponse<T>`，调用方可以根据需要处理 `data` 字段（可能为 None）。
/// 所有 REST 调用都共用此方法
pub async fn handle_http_response<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
    operation_name: &str,
) -> anyhow::Result<ApiResponse<T>> {
    use anyhow::Context;
    use tracing::{debug, error};

    let status = response.status();

    // 读取 body bytes（只能读取一次）
    let body_bytes = response.bytes().await.context("读取响应 body 失败")?;
    let body_str = String::from_utf8_lossy(&body_bytes);

    if !status.is_success() {
        error!(
            "[HTTP] {}请求失败，HTTP状态: {}, 响应: {}",
            operation_name, status, body_str
        );
        return Err(anyhow::anyhow!("HTTP 错误 {}: {}", status, body_str));
    }
    debug!("[HTTP] {}请求成功，HTTP状态: {}", operation_name, status);

    // 从 bytes 反序列化（因为 body 已经被消费了）
    let api_resp: ApiResponse<T> = serde_json::from_slice(&body_bytes).map_err(|e| {
        error!(
            "[HTTP] {}反序列化失败: {:?}\n原始响应: {}",
            operation_name, e, body_str
        );
        anyhow::anyhow!("反序列化响应失败: {:?}", e)
    })?;

    Ok(api_resp)
}
