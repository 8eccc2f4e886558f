//! 图片上传
//!
//! 发送 IMAGE 消息前先把文件上传到资源服务换取持久 URL。
//! 非图片文件在发起网络请求前即被拒绝；上传失败只通知用户，不发送消息。

use crate::chat::types::handle_http_response;
use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

/// 聊天图片的默认目标目录
pub const CHAT_UPLOAD_FOLDER: &str = "chat-uploads";

#[derive(Debug, Deserialize)]
struct UploadData {
    url: String,
}

/// 资源上传客户端
#[derive(Clone)]
pub struct AssetUploader {
    client: reqwest::Client,
    api_base_url: String,
}

impl AssetUploader {
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

    /// 与其他模块共享 HTTP 客户端构造
    pub fn with_client(client: reqwest::Client, api_base_url: String) -> Self {
        Self {
            client,
            api_base_url,
        }
    }

    /// 上传一张图片，返回持久 URL
    ///
    /// - `file_name`: 原始文件名（作为 alt 的来源）
    /// - `content_type`: MIME 类型，必须以 `image/` 开头
    /// - `folder`: 目标目录提示，聊天场景用 [`CHAT_UPLOAD_FOLDER`]
    pub async fn upload_image(
        &self,
        file_name: &str,
        bytes: Vec<u8>,
        content_type: &str,
        folder: &str,
    ) -> Result<String> {
        if !content_type.starts_with("image/") {
            return Err(anyhow::anyhow!("仅支持图片文件: {}", content_type));
        }

        let request_id = Uuid::new_v4().to_string();
        let url = format!("{}/uploads/images", self.api_base_url);
        info!(
            "[Upload] 📤 上传图片: file={}, size={} bytes, folder={}",
            file_name,
            bytes.len(),
            folder
        );

        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(file_name.to_string())
            .mime_str(content_type)
            .context("无效的 MIME 类型")?;
        let form = reqwest::multipart::Form::new()
            .part("file", part)
            .text("folder", folder.to_string());

        let response = self
            .client
            .post(&url)
            .header("x-request-id", &request_id)
            .multipart(form)
            .send()
            .await
            .context("上传请求失败")?;

        let api_resp = handle_http_response::<UploadData>(response, "图片上传").await?;
        let data = api_resp
            .data
            .ok_or_else(|| anyhow::anyhow!("响应中缺少 data 字段"))?;
        info!("[Upload] ✅ 上传完成: {}", data.url);
        Ok(data.url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn rejects_non_image_before_any_network_io() {
        // 不可达地址：若校验未拦截会返回网络错误而不是类型错误
        let uploader = AssetUploader::new("http://127.0.0.1:1/api/v1".to_string(), "t").unwrap();
        let err = uploader
            .upload_image("note.pdf", vec![1, 2, 3], "application/pdf", CHAT_UPLOAD_FOLDER)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("仅支持图片文件"));
    }
}
