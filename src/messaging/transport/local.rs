//! Transport served entirely by the local fallback store.

use std::sync::Arc;

use tokio::task;

use crate::messaging::core::errors::{MessagingError, MessagingResult};
use crate::messaging::core::ids::{ConversationId, UserId};
use crate::messaging::core::models::{
    Conversation, ConversationMessages, MessageOrigin, ReplyPayload, ReplyResult,
    SendMessagePayload, SendMessageResult,
};
use crate::messaging::store::fallback_store::LocalFallbackStore;
use crate::messaging::transport::{MessageTransport, TransportFuture, validate_content};

/// Local transport over a [`LocalFallbackStore`].
///
/// Store access is blocking I/O, so every call runs on the blocking pool.
#[derive(Clone)]
pub struct LocalTransport {
    store: Arc<LocalFallbackStore>,
}

impl LocalTransport {
    /// Wrap a fallback store.
    #[must_use]
    pub const fn new(store: Arc<LocalFallbackStore>) -> Self {
        Self { store }
    }

    /// Underlying store.
    #[must_use]
    pub fn store(&self) -> &Arc<LocalFallbackStore> {
        &self.store
    }

    async fn blocking<T, F>(&self, op: F) -> MessagingResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&LocalFallbackStore) -> MessagingResult<T> + Send + 'static,
    {
        let store = Arc::clone(&self.store);
        task::spawn_blocking(move || op(&store)).await?
    }
}

fn conversation_messages(conversation: Conversation) -> ConversationMessages {
    ConversationMessages {
        messages: conversation.messages.clone(),
        conversation,
    }
}

impl MessageTransport for LocalTransport {
    fn name(&self) -> &'static str {
        "local"
    }

    fn send_message(
        &self,
        payload: SendMessagePayload,
    ) -> TransportFuture<'_, MessagingResult<SendMessageResult>> {
        Box::pin(async move {
            validate_content(&payload.content)?;
            self.blocking(move |store| {
                let conversation =
                    store.ensure_conversation(&payload.user_id, payload.user_meta.as_ref())?;
                let (message, conversation) = store.append_with_conversation(
                    &conversation.id,
                    MessageOrigin::User,
                    &payload.content,
                )?;
                Ok(SendMessageResult {
                    conversation_id: conversation.id.clone(),
                    conversation,
                    message,
                })
            })
            .await
        })
    }

    fn get_user_conversations(
        &self,
        user_id: Option<UserId>,
    ) -> TransportFuture<'_, MessagingResult<Vec<Conversation>>> {
        Box::pin(async move {
            self.blocking(move |store| Ok(store.list_conversations(user_id.as_ref())))
                .await
        })
    }

    fn get_conversation_messages(
        &self,
        conversation_id: ConversationId,
    ) -> TransportFuture<'_, MessagingResult<ConversationMessages>> {
        Box::pin(async move {
            self.blocking(move |store| {
                store
                    .find_conversation(&conversation_id)
                    .map(conversation_messages)
                    .ok_or_else(|| MessagingError::NotFound(conversation_id.to_string()))
            })
            .await
        })
    }

    fn admin_get_conversation(
        &self,
        conversation_id: ConversationId,
    ) -> TransportFuture<'_, MessagingResult<ConversationMessages>> {
        self.get_conversation_messages(conversation_id)
    }

    fn admin_send_reply(
        &self,
        conversation_id: ConversationId,
        payload: ReplyPayload,
    ) -> TransportFuture<'_, MessagingResult<ReplyResult>> {
        Box::pin(async move {
            validate_content(&payload.content)?;
            self.blocking(move |store| {
                let (message, conversation) = store.append_with_conversation(
                    &conversation_id,
                    MessageOrigin::Admin,
                    &payload.content,
                )?;
                Ok(ReplyResult {
                    message,
                    conversation,
                })
            })
            .await
        })
    }
}
