//! Local fallback store for conversations and messages.
//!
//! The whole conversation graph lives in one JSON document under a fixed key
//! and is accessed as "read full document, mutate, write full document". It is
//! only consulted when the remote API reports a missing endpoint, so it is a
//! degraded-mode convenience rather than a system of record.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::messaging::core::config::{FallbackConfig, WritePolicy};
use crate::messaging::core::errors::{MessagingError, MessagingResult};
use crate::messaging::core::ids::{ConversationId, UserId};
use crate::messaging::core::models::{
    Conversation, ConversationDatabase, Message, MessageOrigin, UserMeta,
};
use crate::messaging::store::slot::{FileSlot, MemorySlot, StorageSlot};

/// Result of a mutation closure: whether the database must be persisted.
enum Change<T> {
    Keep(T),
    Save(T),
}

/// Durable, process-local conversation store.
pub struct LocalFallbackStore {
    slot: Arc<dyn StorageSlot>,
    key: String,
    write_policy: WritePolicy,
    max_conflict_retries: u32,
}

impl LocalFallbackStore {
    /// Create a store over an arbitrary slot.
    #[must_use]
    pub fn new(slot: Arc<dyn StorageSlot>, config: &FallbackConfig) -> Self {
        Self {
            slot,
            key: config.storage_key.clone(),
            write_policy: config.write_policy,
            max_conflict_retries: config.max_conflict_retries,
        }
    }

    /// Create a file-backed store in `config.data_dir`.
    #[must_use]
    pub fn from_config(config: &FallbackConfig) -> Self {
        Self::new(Arc::new(FileSlot::new(config.data_dir.clone())), config)
    }

    /// Create a store over a fresh in-memory slot with default settings.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemorySlot::new()), &FallbackConfig::default())
    }

    /// Storage key of the persisted document.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Load the database. Absent, unreadable or corrupt documents load as empty.
    #[must_use]
    pub fn load(&self) -> ConversationDatabase {
        match self.slot.read(&self.key) {
            Ok(Some(raw)) => match serde_json::from_str(&raw) {
                Ok(db) => db,
                Err(err) => {
                    warn!(
                        key = %self.key,
                        error = %err,
                        "Fallback store is corrupt, starting empty"
                    );
                    ConversationDatabase::default()
                }
            },
            Ok(None) => ConversationDatabase::default(),
            Err(err) => {
                warn!(
                    key = %self.key,
                    error = %err,
                    "Fallback store is unreadable, starting empty"
                );
                ConversationDatabase::default()
            }
        }
    }

    /// Persist the full database and bump its revision.
    ///
    /// Under [`WritePolicy::Revision`] the save is refused when the persisted
    /// revision no longer matches `db.revision`.
    ///
    /// # Errors
    /// Returns `Conflict` on a stale revision, or an error if the slot write fails.
    pub fn save(&self, db: &mut ConversationDatabase) -> MessagingResult<()> {
        if self.write_policy == WritePolicy::Revision {
            let persisted = self.load().revision;
            if persisted != db.revision {
                return Err(MessagingError::Conflict {
                    loaded: db.revision,
                    persisted,
                });
            }
        }

        db.revision += 1;
        let written = serde_json::to_string(db)
            .map_err(MessagingError::from)
            .and_then(|raw| self.slot.write(&self.key, &raw));
        if written.is_err() {
            db.revision -= 1;
        }
        written
    }

    /// Return the conversation owned by `user_id`, creating and persisting it if absent.
    ///
    /// # Errors
    /// Returns an error if the database cannot be persisted.
    pub fn ensure_conversation(
        &self,
        user_id: &UserId,
        user_meta: Option<&UserMeta>,
    ) -> MessagingResult<Conversation> {
        self.update("ensure_conversation", |db| {
            if let Some(existing) = db.find_by_user(user_id) {
                return Ok(Change::Keep(existing.clone()));
            }
            let conversation = Conversation::new(user_id.clone(), user_meta.cloned(), Utc::now());
            info!(
                conversation_id = %conversation.id,
                user_id = %user_id,
                "Created fallback conversation"
            );
            db.conversations.push(conversation.clone());
            Ok(Change::Save(conversation))
        })
    }

    /// Append a message to a conversation and persist it.
    ///
    /// # Errors
    /// Returns `NotFound` if the conversation does not exist, or an error if the
    /// database cannot be persisted.
    pub fn append_message(
        &self,
        conversation_id: &ConversationId,
        from: MessageOrigin,
        content: &str,
    ) -> MessagingResult<Message> {
        self.append_with_conversation(conversation_id, from, content)
            .map(|(message, _)| message)
    }

    /// Append a message and also return the conversation as persisted.
    ///
    /// # Errors
    /// Same as [`Self::append_message`].
    pub fn append_with_conversation(
        &self,
        conversation_id: &ConversationId,
        from: MessageOrigin,
        content: &str,
    ) -> MessagingResult<(Message, Conversation)> {
        self.update("append_message", |db| {
            let conversation = db
                .find_mut(conversation_id)
                .ok_or_else(|| MessagingError::NotFound(conversation_id.to_string()))?;
            let message = Message::new(from, content, Utc::now());
            conversation.push_message(message.clone());
            debug!(
                conversation_id = %conversation_id,
                message_id = %message.id,
                from = %from,
                "Appended fallback message"
            );
            Ok(Change::Save((message, conversation.clone())))
        })
    }

    /// Look up a conversation by id.
    #[must_use]
    pub fn find_conversation(&self, conversation_id: &ConversationId) -> Option<Conversation> {
        self.load().find(conversation_id).cloned()
    }

    /// Conversations owned by `user_id`, or all of them when `None`,
    /// most recently updated first.
    #[must_use]
    pub fn list_conversations(&self, user_id: Option<&UserId>) -> Vec<Conversation> {
        let mut conversations: Vec<Conversation> = self
            .load()
            .conversations
            .into_iter()
            .filter(|conv| user_id.is_none_or(|id| &conv.user_id == id))
            .collect();
        conversations.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        conversations
    }

    /// Load, mutate and save, retrying on revision conflicts.
    fn update<T>(
        &self,
        operation: &'static str,
        mut apply: impl FnMut(&mut ConversationDatabase) -> MessagingResult<Change<T>>,
    ) -> MessagingResult<T> {
        let mut attempt = 0;
        loop {
            let mut db = self.load();
            let value = match apply(&mut db)? {
                Change::Keep(value) => return Ok(value),
                Change::Save(value) => value,
            };
            match self.save(&mut db) {
                Ok(()) => return Ok(value),
                Err(MessagingError::Conflict { loaded, persisted })
                    if attempt < self.max_conflict_retries =>
                {
                    attempt += 1;
                    warn!(
                        operation,
                        loaded,
                        persisted,
                        attempt,
                        "Fallback store conflict, retrying"
                    );
                }
                Err(err) => return Err(err),
            }
        }
    }
}
