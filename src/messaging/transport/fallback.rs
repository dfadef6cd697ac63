//! Decorator routing to a fallback transport when the primary one reports a
//! missing endpoint.

use std::sync::Arc;

use tracing::info;

use crate::messaging::core::errors::MessagingResult;
use crate::messaging::core::ids::{ConversationId, UserId};
use crate::messaging::core::models::{
    Conversation, ConversationMessages, ReplyPayload, ReplyResult, SendMessagePayload,
    SendMessageResult,
};
use crate::messaging::transport::{MessageTransport, TransportFuture, validate_content};

/// Tries `primary`, then `fallback` only on [`EndpointNotFound`].
///
/// Genuine failures (network, 5xx, auth, malformed payloads) are returned
/// unchanged; payload validation runs before either transport is touched.
///
/// [`EndpointNotFound`]: crate::messaging::core::errors::MessagingError::EndpointNotFound
pub struct FallbackTransport {
    primary: Arc<dyn MessageTransport>,
    fallback: Arc<dyn MessageTransport>,
}

impl FallbackTransport {
    /// Compose two transports.
    #[must_use]
    pub fn new(primary: Arc<dyn MessageTransport>, fallback: Arc<dyn MessageTransport>) -> Self {
        Self { primary, fallback }
    }

    /// Whether `result` should be retried on the fallback transport.
    fn should_fall_back<T>(&self, operation: &'static str, result: &MessagingResult<T>) -> bool {
        match result {
            Err(err) if err.is_endpoint_not_found() => {
                info!(
                    operation,
                    primary = self.primary.name(),
                    fallback = self.fallback.name(),
                    "Endpoint not implemented, serving from fallback"
                );
                true
            }
            _ => false,
        }
    }
}

impl MessageTransport for FallbackTransport {
    fn name(&self) -> &'static str {
        "fallback"
    }

    fn send_message(
        &self,
        payload: SendMessagePayload,
    ) -> TransportFuture<'_, MessagingResult<SendMessageResult>> {
        Box::pin(async move {
            validate_content(&payload.content)?;
            let result = self.primary.send_message(payload.clone()).await;
            if self.should_fall_back("send_message", &result) {
                return self.fallback.send_message(payload).await;
            }
            result
        })
    }

    fn get_user_conversations(
        &self,
        user_id: Option<UserId>,
    ) -> TransportFuture<'_, MessagingResult<Vec<Conversation>>> {
        Box::pin(async move {
            let result = self.primary.get_user_conversations(user_id.clone()).await;
            if self.should_fall_back("get_user_conversations", &result) {
                return self.fallback.get_user_conversations(user_id).await;
            }
            result
        })
    }

    fn get_conversation_messages(
        &self,
        conversation_id: ConversationId,
    ) -> TransportFuture<'_, MessagingResult<ConversationMessages>> {
        Box::pin(async move {
            let result = self
                .primary
                .get_conversation_messages(conversation_id.clone())
                .await;
            if self.should_fall_back("get_conversation_messages", &result) {
                return self.fallback.get_conversation_messages(conversation_id).await;
            }
            result
        })
    }

    fn admin_get_conversation(
        &self,
        conversation_id: ConversationId,
    ) -> TransportFuture<'_, MessagingResult<ConversationMessages>> {
        Box::pin(async move {
            let result = self
                .primary
                .admin_get_conversation(conversation_id.clone())
                .await;
            if self.should_fall_back("admin_get_conversation", &result) {
                return self.fallback.admin_get_conversation(conversation_id).await;
            }
            result
        })
    }

    fn admin_send_reply(
        &self,
        conversation_id: ConversationId,
        payload: ReplyPayload,
    ) -> TransportFuture<'_, MessagingResult<ReplyResult>> {
        Box::pin(async move {
            validate_content(&payload.content)?;
            let result = self
                .primary
                .admin_send_reply(conversation_id.clone(), payload.clone())
                .await;
            if self.should_fall_back("admin_send_reply", &result) {
                return self.fallback.admin_send_reply(conversation_id, payload).await;
            }
            result
        })
    }
}
