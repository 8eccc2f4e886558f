//! 富媒体消息渲染
//!
//! 按消息的 `kind` + 归一化 metadata 选择渲染策略：文本气泡、
//! 图片缩略图（点击放大）、商品卡片 / 订单卡片（点击发起详情查询）。
//! 商品与订单详情由外部目录/订单服务提供，这里只定义按 ID 查询的契约。

use crate::chat::message::{ChatMessage, OrderRef, ProductRef, RichContent};
use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

/// 渲染视图：界面层对其穷尽匹配即可完成一条消息的呈现
#[derive(Debug, Clone, PartialEq)]
pub enum MessageView {
    /// 普通文本气泡
    Bubble { text: String },
    /// 图片缩略图
    ImageThumbnail { url: String, alt: String },
    /// 商品卡片
    ProductCard(ProductRef),
    /// 订单卡片
    OrderCard(OrderRef),
}

/// 点击消息后需要发起的动作
#[derive(Debug, Clone, PartialEq)]
pub enum DetailRequest {
    /// 全屏查看图片
    ZoomImage { url: String },
    /// 按商品 ID（和可选 SKU）查询详情
    ProductDetail { id: String, sku_id: Option<String> },
    /// 按订单 ID 查询详情
    OrderDetail { id: String },
}

/// 详情查询的结果
#[derive(Debug, Clone)]
pub enum DetailOutcome {
    Zoom(String),
    Product(serde_json::Value),
    Order(serde_json::Value),
}

/// 商品详情查询契约（由商品目录服务实现）
#[async_trait]
pub trait ProductLookup: Send + Sync {
    async fn product_detail(&self, id: &str, sku_id: Option<&str>) -> Result<serde_json::Value>;
}

/// 订单详情查询契约（由订单服务实现）
#[async_trait]
pub trait OrderLookup: Send + Sync {
    async fn order_detail(&self, id: &str) -> Result<serde_json::Value>;
}

/// 空实现（默认协作方，查询返回空对象）
pub struct EmptyProductLookup;

#[async_trait]
impl ProductLookup for EmptyProductLookup {
    async fn product_detail(&self, _id: &str, _sku_id: Option<&str>) -> Result<serde_json::Value> {
        Ok(serde_json::json!({}))
    }
}

pub struct EmptyOrderLookup;

#[async_trait]
impl OrderLookup for EmptyOrderLookup {
    async fn order_detail(&self, _id: &str) -> Result<serde_json::Value> {
        Ok(serde_json::json!({}))
    }
}

/// 选择渲染视图（全函数：脏 metadata 渲染为空字段卡片，绝不报错）
pub fn view_of(message: &ChatMessage) -> MessageView {
    match message.rich_content() {
        RichContent::Text => MessageView::Bubble {
            text: message.content.clone(),
        },
        RichContent::Image(image) => MessageView::ImageThumbnail {
            url: image.url,
            alt: image.alt,
        },
        RichContent::Product(product) => MessageView::ProductCard(product),
        RichContent::Order(order) => MessageView::OrderCard(order),
    }
}

/// 会话列表的预览文案
pub fn preview_label(message: &ChatMessage) -> String {
    match message.rich_content() {
        RichContent::Text => message.content.clone(),
        RichContent::Image(_) => "Sent an image".to_string(),
        RichContent::Product(_) => "Shared a product".to_string(),
        RichContent::Order(_) => "Referenced an order".to_string(),
    }
}

/// 解析点击动作；文本消息点击无动作
pub fn resolve_click(message: &ChatMessage) -> Option<DetailRequest> {
    match message.rich_content() {
        RichContent::Text => None,
        RichContent::Image(image) => Some(DetailRequest::ZoomImage { url: image.url }),
        RichContent::Product(product) => Some(DetailRequest::ProductDetail {
            id: product.id,
            sku_id: product.sku_id,
        }),
        RichContent::Order(order) => Some(DetailRequest::OrderDetail { id: order.id }),
    }
}

/// 富媒体渲染器：视图选择 + 点击后的详情查询编排
pub struct RichContentRenderer {
    products: Arc<dyn ProductLookup>,
    orders: Arc<dyn OrderLookup>,
}

impl RichContentRenderer {
    pub fn new(products: Arc<dyn ProductLookup>, orders: Arc<dyn OrderLookup>) -> Self {
        Self { products, orders }
    }

    pub fn view(&self, message: &ChatMessage) -> MessageView {
        view_of(message)
    }

    /// 处理点击：图片直接返回放大动作，商品/订单发起详情查询
    pub async fn open_detail(&self, message: &ChatMessage) -> Result<Option<DetailOutcome>> {
        let Some(request) = resolve_click(message) else {
            return Ok(None);
        };
        debug!("[Render] 点击动作: {:?}", request);
        let outcome = match request {
            DetailRequest::ZoomImage { url } => DetailOutcome::Zoom(url),
            DetailRequest::ProductDetail { id, sku_id } => {
                let detail = self
                    .products
                    .product_detail(&id, sku_id.as_deref())
                    .await?;
                DetailOutcome::Product(detail)
            }
            DetailRequest::OrderDetail { id } => {
                let detail = self.orders.order_detail(&id).await?;
                DetailOutcome::Order(detail)
            }
        };
        Ok(Some(outcome))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::message::{MessageKind, SenderType};
    use serde_json::json;

    fn msg(kind: MessageKind, content: &str, metadata: Option<serde_json::Value>) -> ChatMessage {
        ChatMessage {
            id: "m1".to_string(),
            client_temp_id: None,
            conversation_id: Some("c1".to_string()),
            sender_id: "u1".to_string(),
            sender_type: SenderType::Admin,
            content: content.to_string(),
            kind,
            metadata,
            sent_at: "2026-01-01T00:00:00.000Z".to_string(),
            is_read: false,
        }
    }

    #[test]
    fn text_renders_content_verbatim() {
        let m = msg(MessageKind::Text, "hello there", None);
        assert_eq!(
            view_of(&m),
            MessageView::Bubble {
                text: "hello there".to_string()
            }
        );
        assert_eq!(resolve_click(&m), None);
    }

    #[test]
    fn image_string_metadata_renders_same_as_object() {
        let object = msg(
            MessageKind::Image,
            "Sent an image",
            Some(json!({ "url": "http://x/y.png", "alt": "y.png" })),
        );
        let encoded = msg(
            MessageKind::Image,
            "Sent an image",
            Some(json!("{\"url\":\"http://x/y.png\",\"alt\":\"y.png\"}")),
        );
        assert_eq!(view_of(&object), view_of(&encoded));
        assert_eq!(
            resolve_click(&object),
            Some(DetailRequest::ZoomImage {
                url: "http://x/y.png".to_string()
            })
        );
    }

    #[test]
    fn order_with_malformed_metadata_renders_fallback_fields() {
        let m = msg(MessageKind::Order, "Referenced an order: #42", None);
        match view_of(&m) {
            MessageView::OrderCard(order) => {
                assert_eq!(order.id, "");
                assert_eq!(order.status, "");
                assert_eq!(order.item_count, 0);
            }
            other => panic!("期望订单卡片，实际: {:?}", other),
        }
    }

    #[test]
    fn preview_labels_by_kind() {
        assert_eq!(preview_label(&msg(MessageKind::Text, "hi", None)), "hi");
        assert_eq!(
            preview_label(&msg(MessageKind::Image, "Sent an image", None)),
            "Sent an image"
        );
        assert_eq!(
            preview_label(&msg(MessageKind::Product, "x", None)),
            "Shared a product"
        );
        assert_eq!(
            preview_label(&msg(MessageKind::Order, "x", None)),
            "Referenced an order"
        );
    }

    #[tokio::test]
    async fn product_click_requests_lookup_by_id_and_sku() {
        struct RecordingLookup;
        #[async_trait]
        impl ProductLookup for RecordingLookup {
            async fn product_detail(
                &self,
                id: &str,
                sku_id: Option<&str>,
            ) -> Result<serde_json::Value> {
                Ok(json!({ "id": id, "skuId": sku_id }))
            }
        }

        let renderer =
            RichContentRenderer::new(Arc::new(RecordingLookup), Arc::new(EmptyOrderLookup));
        let m = msg(
            MessageKind::Product,
            "Shared a product: Sneaker",
            Some(json!({ "id": "p1", "skuId": "sku-9" })),
        );
        match renderer.open_detail(&m).await.unwrap() {
            Some(DetailOutcome::Product(detail)) => {
                assert_eq!(detail["id"], "p1");
                assert_eq!(detail["skuId"], "sku-9");
            }
            other => panic!("期望商品详情，实际: {:?}", other),
        }
    }

    #[tokio::test]
    async fn text_click_does_nothing() {
        let renderer =
            RichContentRenderer::new(Arc::new(EmptyProductLookup), Arc::new(EmptyOrderLookup));
        let m = msg(MessageKind::Text, "hi", None);
        assert!(renderer.open_detail(&m).await.unwrap().is_none());
    }
}
