//! Conversation and message data model shared by every transport.
//!
//! Field names serialize in camelCase so that local and remote documents have
//! the same wire shape.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::messaging::core::ids::{ConversationId, MessageId, UserId};

/// Maximum number of characters kept in `last_message_preview`.
pub const PREVIEW_CHARS: usize = 80;

/// Truncate `content` to at most `max_chars` characters.
#[must_use]
pub fn preview_of(content: &str, max_chars: usize) -> String {
    content.chars().take(max_chars).collect()
}

/// Origin of a message: the end-user or support.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageOrigin {
    /// Written by the end-user owning the conversation.
    User,
    /// Written by a support agent.
    Admin,
}

impl MessageOrigin {
    /// Stable string form.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Admin => "admin",
        }
    }
}

impl fmt::Display for MessageOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MessageOrigin {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "user" => Ok(Self::User),
            "admin" => Ok(Self::Admin),
            _ => Err(value.to_string()),
        }
    }
}

/// Denormalized display data about the conversation owner.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserMeta {
    /// Email address, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Display name, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl UserMeta {
    /// Human readable label, preferring the name, then the email.
    #[must_use]
    pub fn label(&self) -> Option<&str> {
        self.name
            .as_deref()
            .filter(|name| !name.trim().is_empty())
            .or_else(|| self.email.as_deref().filter(|email| !email.trim().is_empty()))
    }
}

/// A single text entry in a conversation.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Unique identifier within the conversation.
    #[serde(alias = "_id")]
    pub id: MessageId,
    /// Who wrote the message.
    pub from: MessageOrigin,
    /// Non-empty text body.
    pub content: String,
    /// Send time (client clock in fallback mode, server clock otherwise).
    pub created_at: DateTime<Utc>,
}

impl Message {
    /// Build a message with a fresh id stamped at `now`.
    #[must_use]
    pub fn new(from: MessageOrigin, content: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: MessageId::generate(),
            from,
            content: content.into(),
            created_at: now,
        }
    }
}

/// Dialogue between one end-user and support.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    /// Unique identifier.
    #[serde(alias = "_id")]
    pub id: ConversationId,
    /// Owning end-user. Never changes once set.
    pub user_id: UserId,
    /// Display data captured at the first message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_meta: Option<UserMeta>,
    /// Messages in chronological, append-only order.
    ///
    /// List endpoints may omit bodies, in which case this is empty.
    #[serde(default)]
    pub messages: Vec<Message>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Time of the most recent append.
    pub updated_at: DateTime<Utc>,
    /// Full body of the most recent message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_message: Option<String>,
    /// Most recent body truncated to [`PREVIEW_CHARS`] characters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_message_preview: Option<String>,
}

impl Conversation {
    /// Create an empty conversation owned by `user_id`.
    #[must_use]
    pub fn new(user_id: UserId, user_meta: Option<UserMeta>, now: DateTime<Utc>) -> Self {
        Self {
            id: ConversationId::generate(),
            user_id,
            user_meta,
            messages: Vec::new(),
            created_at: now,
            updated_at: now,
            last_message: None,
            last_message_preview: None,
        }
    }

    /// Append a message and refresh the denormalized fields.
    pub fn push_message(&mut self, message: Message) {
        self.updated_at = message.created_at;
        self.last_message_preview = Some(preview_of(&message.content, PREVIEW_CHARS));
        self.last_message = Some(message.content.clone());
        self.messages.push(message);
    }

    /// Most recent message, if any.
    #[must_use]
    pub fn latest(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Label used by list views: user name, email, then raw user id.
    #[must_use]
    pub fn display_label(&self) -> String {
        self.user_meta
            .as_ref()
            .and_then(UserMeta::label)
            .map_or_else(|| self.user_id.to_string(), str::to_string)
    }
}

/// Persisted layout of the local fallback store.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct ConversationDatabase {
    /// Every conversation with its messages.
    #[serde(default)]
    pub conversations: Vec<Conversation>,
    /// Save counter used for optimistic concurrency.
    #[serde(default)]
    pub revision: u64,
}

impl ConversationDatabase {
    /// Find a conversation by id.
    #[must_use]
    pub fn find(&self, id: &ConversationId) -> Option<&Conversation> {
        self.conversations.iter().find(|conv| &conv.id == id)
    }

    /// Find a conversation by id, mutably.
    pub fn find_mut(&mut self, id: &ConversationId) -> Option<&mut Conversation> {
        self.conversations.iter_mut().find(|conv| &conv.id == id)
    }

    /// Find the conversation owned by `user_id`.
    #[must_use]
    pub fn find_by_user(&self, user_id: &UserId) -> Option<&Conversation> {
        self.conversations
            .iter()
            .find(|conv| &conv.user_id == user_id)
    }
}

/// Authenticated end-user bound to a chat session.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Identity {
    /// User id issued by the auth collaborator.
    pub user_id: UserId,
    /// Email, if known.
    pub email: Option<String>,
    /// Display name, if known.
    pub name: Option<String>,
}

impl Identity {
    /// Identity with only a user id.
    #[must_use]
    pub fn new(user_id: impl Into<UserId>) -> Self {
        Self {
            user_id: user_id.into(),
            email: None,
            name: None,
        }
    }

    /// Attach an email.
    #[must_use]
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    /// Attach a display name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Snapshot of the display data sent along with messages.
    #[must_use]
    pub fn meta(&self) -> UserMeta {
        UserMeta {
            email: self.email.clone(),
            name: self.name.clone(),
        }
    }
}

/// Body of a send-message request.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessagePayload {
    /// Sending user.
    pub user_id: UserId,
    /// Display data for the admin list.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_meta: Option<UserMeta>,
    /// Message body.
    pub content: String,
}

/// Result of a send-message request.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageResult {
    /// Conversation the message landed in.
    pub conversation_id: ConversationId,
    /// Conversation after the append.
    pub conversation: Conversation,
    /// The stored message.
    pub message: Message,
}

/// A conversation together with its full message history.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct ConversationMessages {
    /// Conversation record.
    pub conversation: Conversation,
    /// Messages in chronological order.
    #[serde(default)]
    pub messages: Vec<Message>,
}

/// Body of an admin reply request.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct ReplyPayload {
    /// Reply body.
    pub content: String,
}

/// Result of an admin reply request.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct ReplyResult {
    /// The stored reply.
    pub message: Message,
    /// Conversation after the append.
    pub conversation: Conversation,
}
