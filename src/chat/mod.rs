pub mod auth;
pub mod client;
pub mod connection;
pub mod conversation;
pub mod listener;
pub mod message;
pub mod render;
pub mod serialization;
pub mod types;
pub mod unread;
pub mod upload;

// 重新导出认证相关函数
pub use auth::login_async;

// 重新导出客户端与会话相关类型
pub use client::{ChatClient, ChatSurface, ClientConfig};
pub use connection::{ChatTransport, ConnectionState, ReconnectPolicy, WebSocketTransport};
pub use conversation::{Conversation, ConversationListener, ConversationService};
pub use listener::ChatEventListener;
pub use message::{ChatMessage, MessageKind, RichContent, SenderType};
