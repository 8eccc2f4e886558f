//! 登录与 token 获取
//!
//! 实时连接在握手时需要 access token；嵌入的站点通常已持有会话 token，
//! CLI 与测试则通过这里的账号密码登录获取。

use crate::chat::conversation::models::ChatUser;
use crate::chat::types::handle_http_response;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

#[derive(Debug, Serialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginData {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub user: ChatUser,
}

/// 账号密码登录，返回 access token 与用户信息
pub async fn login_async(api_base_url: &str, email: String, password: String) -> Result<LoginData> {
    let client = reqwest::Client::new();
    let request_id = Uuid::new_v4().to_string();
    let url = format!("{}/auth/login", api_base_url);

    info!("🔐 正在登录...");
    debug!("   URL: {}", url);
    debug!("   邮箱: {}", email);
    debug!("   请求ID: {}", request_id);

    let response = client
        .post(&url)
        .header("Content-Type", "application/json")
        .header("x-request-id", &request_id)
        .json(&LoginRequest { email, password })
        .send()
        .await
        .context("登录请求失败")?;

    let api_resp = handle_http_response::<LoginData>(response, "登录").await?;
    let data = api_resp
        .data
        .ok_or_else(|| anyhow::anyhow!("登录响应中缺少 data 字段"))?;
    info!("✅ 登录成功，用户ID: {}", data.user.id);
    Ok(data)
}
