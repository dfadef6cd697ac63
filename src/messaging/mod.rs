//! Messaging subsystem for the storefront support chat.
//!
//! This module is organized into:
//! - `core`: Configuration, errors, IDs, and the conversation data model
//! - `store`: Storage slots and the local fallback store
//! - `transport`: Remote REST transport, local transport, and the 404 fallback decorator
//! - `state`: Session-scoped conversation state with change notifications
//! - `ui`: Shopper widget, support browser, and terminal rendering

pub mod core;
pub mod state;
pub mod store;
pub mod transport;
pub mod ui;

// Re-export commonly used types for convenience
pub use self::core::{
    Conversation, ConversationId, ConversationMessages, FallbackConfig, Identity, Message,
    MessageId, MessageOrigin, MessagingConfig, MessagingError, MessagingResult, RemoteConfig,
    ReplyPayload, ReplyResult, SendMessagePayload, SendMessageResult, TransportMode, UserId,
    UserMeta, WritePolicy,
};
pub use state::{ChatSnapshot, ConversationState};
pub use store::{FileSlot, LocalFallbackStore, MemorySlot, StorageSlot};
pub use transport::{
    FallbackTransport, LocalTransport, MessageTransport, RemoteTransport, TransportFuture,
    build_transport, build_transport_with_slot,
};
pub use ui::{AdminBrowser, ChatWidget, ProductContext};
