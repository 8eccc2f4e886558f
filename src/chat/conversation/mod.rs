pub mod api;
pub mod list;
pub mod listener;
pub mod models;
pub mod service;

pub use api::ChatApi;
pub use list::{ConversationList, UpsertOutcome};
pub use listener::{ConversationListener, EmptyConversationListener};
pub use models::{ChatUser, Conversation, ConversationHistory, MessageCount};
pub use service::ConversationService;
