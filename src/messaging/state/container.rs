//! Conversation state container.
//!
//! Holds the bound user's conversations, the open conversation and its
//! messages, and keeps them in sync with a [`MessageTransport`]. Instances are
//! constructed explicitly and shared by `Arc`; observers subscribe to a
//! `watch` channel of [`ChatSnapshot`] values.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use tokio::sync::{RwLock, watch};
use tracing::{debug, info, warn};

use crate::messaging::core::errors::{MessagingError, MessagingResult};
use crate::messaging::core::ids::ConversationId;
use crate::messaging::core::models::{
    Conversation, ConversationMessages, Identity, Message, SendMessagePayload, SendMessageResult,
};
use crate::messaging::transport::MessageTransport;

/// Observable view of the chat session.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ChatSnapshot {
    /// Conversations owned by the bound user.
    pub conversations: Vec<Conversation>,
    /// Conversation currently open, if any.
    pub current_conversation: Option<Conversation>,
    /// Messages of the open conversation.
    pub messages: Vec<Message>,
    /// Whether any request is in flight. Advisory only.
    pub is_loading: bool,
}

/// Marks a request in flight for as long as it lives.
struct LoadingGuard<'a> {
    state: &'a ConversationState,
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.state.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.state.refresh_loading();
    }
}

/// Session-scoped chat state bound to one transport.
pub struct ConversationState {
    transport: Arc<dyn MessageTransport>,
    identity: RwLock<Option<Identity>>,
    snapshot: watch::Sender<ChatSnapshot>,
    /// Bumped by every clear; results issued under an older epoch are dropped.
    epoch: AtomicU64,
    conversations_seq: AtomicU64,
    open_seq: AtomicU64,
    in_flight: AtomicUsize,
}

impl ConversationState {
    /// Create an empty state with no identity bound.
    #[must_use]
    pub fn new(transport: Arc<dyn MessageTransport>) -> Self {
        let (snapshot, _) = watch::channel(ChatSnapshot::default());
        Self {
            transport,
            identity: RwLock::new(None),
            snapshot,
            epoch: AtomicU64::new(0),
            conversations_seq: AtomicU64::new(0),
            open_seq: AtomicU64::new(0),
            in_flight: AtomicUsize::new(0),
        }
    }

    /// Transport used by this state.
    #[must_use]
    pub fn transport(&self) -> &Arc<dyn MessageTransport> {
        &self.transport
    }

    /// Current state.
    #[must_use]
    pub fn snapshot(&self) -> ChatSnapshot {
        self.snapshot.borrow().clone()
    }

    /// Receiver notified on every state change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<ChatSnapshot> {
        self.snapshot.subscribe()
    }

    /// Identity currently bound, if any.
    pub async fn identity(&self) -> Option<Identity> {
        self.identity.read().await.clone()
    }

    /// Bind or unbind the authenticated user.
    ///
    /// Absent to present fetches conversations; present to absent clears all
    /// state; switching between two users does both.
    pub async fn set_identity(&self, identity: Option<Identity>) {
        let previous = {
            let mut guard = self.identity.write().await;
            std::mem::replace(&mut *guard, identity.clone())
        };

        match (previous, identity) {
            (Some(prev), None) => {
                info!(user_id = %prev.user_id, "Identity unbound, clearing chat state");
                self.clear();
            }
            (None, Some(next)) => {
                debug!(user_id = %next.user_id, "Identity bound");
                self.fetch_conversations().await;
            }
            (Some(prev), Some(next)) if prev.user_id != next.user_id => {
                info!(from = %prev.user_id, to = %next.user_id, "Identity switched");
                self.clear();
                self.fetch_conversations().await;
            }
            _ => {}
        }
    }

    /// Reload the bound user's conversation list.
    ///
    /// Failures are logged and otherwise ignored; the previous list stays.
    pub async fn fetch_conversations(&self) {
        let epoch = self.epoch.load(Ordering::SeqCst);
        let Some(identity) = self.identity().await else {
            debug!("No identity bound, skipping conversation fetch");
            return;
        };
        self.load_conversations(&identity, epoch).await;
    }

    async fn load_conversations(&self, identity: &Identity, epoch: u64) {
        let ticket = self.conversations_seq.fetch_add(1, Ordering::SeqCst) + 1;
        let _loading = self.begin_loading();
        match self
            .transport
            .get_user_conversations(Some(identity.user_id.clone()))
            .await
        {
            Ok(conversations) => {
                let count = conversations.len();
                let applied = self.snapshot.send_if_modified(|snapshot| {
                    if !self.is_current(epoch, &self.conversations_seq, ticket) {
                        return false;
                    }
                    snapshot.conversations = conversations;
                    true
                });
                if applied {
                    debug!(user_id = %identity.user_id, count, "Fetched conversations");
                } else {
                    debug!(ticket, "Discarding stale conversation list");
                }
            }
            Err(err) => {
                warn!(user_id = %identity.user_id, error = %err, "Failed to fetch conversations");
            }
        }
    }

    /// Load a conversation and its messages, replacing the open one.
    ///
    /// On failure the previous state is left untouched.
    ///
    /// # Errors
    /// Returns the transport error, e.g. `NotFound`.
    pub async fn open_conversation(&self, conversation_id: ConversationId) -> MessagingResult<()> {
        let epoch = self.epoch.load(Ordering::SeqCst);
        self.load_messages(conversation_id, epoch).await
    }

    async fn load_messages(
        &self,
        conversation_id: ConversationId,
        epoch: u64,
    ) -> MessagingResult<()> {
        let ticket = self.open_seq.fetch_add(1, Ordering::SeqCst) + 1;
        let _loading = self.begin_loading();
        let ConversationMessages {
            conversation,
            messages,
        } = self
            .transport
            .get_conversation_messages(conversation_id.clone())
            .await
            .map_err(|err| {
                warn!(%conversation_id, error = %err, "Failed to open conversation");
                err
            })?;

        let applied = self.snapshot.send_if_modified(|snapshot| {
            if !self.is_current(epoch, &self.open_seq, ticket) {
                return false;
            }
            snapshot.current_conversation = Some(conversation);
            snapshot.messages = messages;
            true
        });
        if !applied {
            debug!(conversation_id = %conversation_id, "Discarding stale conversation");
        }
        Ok(())
    }

    /// Send a message as the bound user, then re-read conversations and open
    /// the one the message landed in. If the identity is unbound or switched
    /// while the send is in flight, that refresh is skipped.
    ///
    /// # Errors
    /// `NotAuthenticated` without identity, `EmptyMessage` for blank content
    /// (both before any I/O), otherwise the transport error.
    pub async fn send_message(&self, content: &str) -> MessagingResult<SendMessageResult> {
        let epoch = self.epoch.load(Ordering::SeqCst);
        let identity = self
            .identity()
            .await
            .ok_or(MessagingError::NotAuthenticated)?;
        let content = content.trim();
        if content.is_empty() {
            return Err(MessagingError::EmptyMessage);
        }

        let payload = SendMessagePayload {
            user_id: identity.user_id.clone(),
            user_meta: Some(identity.meta()),
            content: content.to_string(),
        };

        let result = {
            let _loading = self.begin_loading();
            self.transport.send_message(payload).await.map_err(|err| {
                warn!(user_id = %identity.user_id, error = %err, "Failed to send message");
                err
            })?
        };

        if self.epoch.load(Ordering::SeqCst) != epoch {
            debug!(
                user_id = %identity.user_id,
                "Session changed during send, skipping refresh"
            );
            return Ok(result);
        }
        self.load_conversations(&identity, epoch).await;
        // Logged inside; the send itself already succeeded.
        let _ = self
            .load_messages(result.conversation_id.clone(), epoch)
            .await;
        Ok(result)
    }

    /// Reset conversations, open conversation and messages, invalidating
    /// responses still in flight.
    fn clear(&self) {
        self.snapshot.send_modify(|snapshot| {
            self.epoch.fetch_add(1, Ordering::SeqCst);
            self.conversations_seq.fetch_add(1, Ordering::SeqCst);
            self.open_seq.fetch_add(1, Ordering::SeqCst);
            snapshot.conversations.clear();
            snapshot.current_conversation = None;
            snapshot.messages.clear();
        });
    }

    /// Checked under the snapshot lock, which `clear` also holds.
    fn is_current(&self, epoch: u64, seq: &AtomicU64, ticket: u64) -> bool {
        self.epoch.load(Ordering::SeqCst) == epoch && seq.load(Ordering::SeqCst) == ticket
    }

    fn begin_loading(&self) -> LoadingGuard<'_> {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        self.refresh_loading();
        LoadingGuard { state: self }
    }

    fn refresh_loading(&self) {
        self.snapshot.send_if_modified(|snapshot| {
            let loading = self.in_flight.load(Ordering::SeqCst) > 0;
            let changed = snapshot.is_loading != loading;
            snapshot.is_loading = loading;
            changed
        });
    }
}
