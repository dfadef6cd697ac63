//! Core messaging types and identifiers.

pub mod config;
pub mod errors;
pub mod ids;
pub mod models;

pub use config::{FallbackConfig, MessagingConfig, RemoteConfig, TransportMode, WritePolicy};
pub use errors::{MessagingError, MessagingResult};
pub use ids::{ConversationId, IdError, MessageId, UserId};
pub use models::{
    Conversation, ConversationDatabase, ConversationMessages, Identity, Message, MessageOrigin,
    PREVIEW_CHARS, ReplyPayload, ReplyResult, SendMessagePayload, SendMessageResult, UserMeta,
    preview_of,
};
