pub mod store;
pub mod types;

pub use store::{MessageStore, ReconcileOutcome};
pub use types::{
    ChatMessage, DeliveryState, ImageRef, MessageEntry, MessageKind, OrderRef, ProductRef,
    RichContent, SenderType,
};
