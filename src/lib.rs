pub mod chat;

// 重新导出常用类型和函数，方便外部使用
pub use chat::{
    client::{ChatClient, ChatSurface, ClientConfig},
    connection::{ChatTransport, ConnectionState, ReconnectPolicy, WebSocketTransport},
    conversation::{Conversation, ConversationService},
    login_async,
    message::{ChatMessage, MessageKind, RichContent, SenderType},
};
