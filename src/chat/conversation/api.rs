//! 聊天 HTTP API 客户端
//!
//! 负责会话列表与历史消息相关的所有 REST 请求

use crate::chat::conversation::models::{Conversation, ConversationHistory};
use crate::chat::types::handle_http_response;
use anyhow::{Context, Result};
use tracing::{debug, info};
use uuid::Uuid;

/// 聊天相关的 HTTP API 客户端
#[derive(Clone)]
pub struct ChatApi {
    client: reqwest::Client,
    api_base_url: String,
}

impl ChatApi {
    /// 创建 API 客户端（token 通过 default_headers 自动添加到每个请求）
    pub fn new(api_base_url: String, token: &str) -> Result<Self> {
        let client = reqwest::ClientBuilder::new()
            .default_headers({
                let mut headers = reqwest::header::HeaderMap::new();
                headers.insert(
                    reqwest::header::AUTHORIZATION,
                    reqwest::header::HeaderValue::from_str(&format!("Bearer {}", token))
                        .context("无效的 token")?,
                );
                headers
            })
            .build()
            .context("创建 HTTP 客户端失败")?;
        Ok(Self {
            client,
            api_base_url,
        })
    }

    /// 用已配置好的 HTTP 客户端构造（与上传等模块共享连接池）
    pub fn with_client(client: reqwest::Client, api_base_url: String) -> Self {
        Self {
            client,
            api_base_url,
        }
    }

    /// 拉取会话摘要列表（管理端）
    pub async fn get_conversations(&self, limit: usize) -> Result<Vec<Conversation>> {
        let request_id = Uuid::new_v4().to_string();
        let url = format!("{}/chat/conversations?limit={}", self.api_base_url, limit);

        info!("[ChatAPI] 📡 请求会话列表, limit={}", limit);
        debug!("[ChatAPI]   请求URL: {}, 请求ID: {}", url, request_id);

        let response = self
            .client
            .get(&url)
            .header("x-request-id", &request_id)
            .send()
            .await
            .context("请求失败")?;

        let api_resp = handle_http_response::<Vec<Conversation>>(response, "会话列表").await?;
        let conversations = api_resp.data.unwrap_or_default();
        info!("[ChatAPI] ✅ 会话列表响应，会话数: {}", conversations.len());
        Ok(conversations)
    }

    /// 拉取与指定顾客的历史消息（管理端）
    pub async fn get_history(&self, user_id: &str) -> Result<ConversationHistory> {
        let request_id = Uuid::new_v4().to_string();
        let url = format!("{}/chat/history/{}", self.api_base_url, user_id);

        info!("[ChatAPI] 📡 请求会话历史, userId={}", user_id);
        debug!("[ChatAPI]   请求URL: {}, 请求ID: {}", url, request_id);

        let response = self
            .client
            .get(&url)
            .header("x-request-id", &request_id)
            .send()
            .await
            .context("请求失败")?;

        let api_resp = handle_http_response::<ConversationHistory>(response, "会话历史").await?;
        let history = api_resp
            .data
            .ok_or_else(|| anyhow::anyhow!("响应中缺少 data 字段"))?;
        info!("[ChatAPI] ✅ 会话历史响应，消息数: {}", history.messages.len());
        Ok(history)
    }

    /// 拉取自己与客服的历史消息（顾客端隐式会话）
    pub async fn get_my_history(&self) -> Result<ConversationHistory> {
        let request_id = Uuid::new_v4().to_string();
        let url = format!("{}/chat/my-history", self.api_base_url);

        info!("[ChatAPI] 📡 请求本人会话历史");
        debug!("[ChatAPI]   请求URL: {}, 请求ID: {}", url, request_id);

        let response = self
            .client
            .get(&url)
            .header("x-request-id", &request_id)
            .send()
            .await
            .context("请求失败")?;

        let api_resp = handle_http_response::<ConversationHistory>(response, "本人会话历史").await?;
        let history = api_resp
            .data
            .ok_or_else(|| anyhow::anyhow!("响应中缺少 data 字段"))?;
        info!(
            "[ChatAPI] ✅ 本人会话历史响应，消息数: {}, 未读: {}",
            history.messages.len(),
            history.count.messages
        );
        Ok(history)
    }
}
