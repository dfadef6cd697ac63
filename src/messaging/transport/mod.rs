//! Message transports: remote REST API, local fallback store, and the
//! decorator routing between them.

pub mod fallback;
pub mod local;
pub mod remote;
pub mod select;

pub use fallback::FallbackTransport;
pub use local::LocalTransport;
pub use remote::RemoteTransport;
pub use select::{build_transport, build_transport_with_slot};

use std::future::Future;
use std::pin::Pin;

use crate::messaging::core::errors::{MessagingError, MessagingResult};
use crate::messaging::core::ids::{ConversationId, UserId};
use crate::messaging::core::models::{
    Conversation, ConversationMessages, ReplyPayload, ReplyResult, SendMessagePayload,
    SendMessageResult,
};

/// Boxed future type for transport operations.
pub type TransportFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Stable interface over wherever conversations live.
pub trait MessageTransport: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Send a message from an end-user, creating their conversation if needed.
    ///
    /// # Errors
    /// Returns `InvalidPayload` for blank content, or a transport error.
    fn send_message(
        &self,
        payload: SendMessagePayload,
    ) -> TransportFuture<'_, MessagingResult<SendMessageResult>>;

    /// List conversations owned by `user_id`, or every conversation when `None`
    /// (admin view).
    ///
    /// # Errors
    /// Returns a transport error.
    fn get_user_conversations(
        &self,
        user_id: Option<UserId>,
    ) -> TransportFuture<'_, MessagingResult<Vec<Conversation>>>;

    /// Load a conversation and its messages as seen by its owner.
    ///
    /// # Errors
    /// Returns `NotFound` if the conversation does not exist, or a transport error.
    fn get_conversation_messages(
        &self,
        conversation_id: ConversationId,
    ) -> TransportFuture<'_, MessagingResult<ConversationMessages>>;

    /// Load a conversation and its messages for the admin detail pane.
    ///
    /// # Errors
    /// Returns `NotFound` if the conversation does not exist, or a transport error.
    fn admin_get_conversation(
        &self,
        conversation_id: ConversationId,
    ) -> TransportFuture<'_, MessagingResult<ConversationMessages>>;

    /// Append a support reply to a conversation.
    ///
    /// # Errors
    /// Returns `InvalidPayload` for blank content, `NotFound` for an unknown
    /// conversation, or a transport error.
    fn admin_send_reply(
        &self,
        conversation_id: ConversationId,
        payload: ReplyPayload,
    ) -> TransportFuture<'_, MessagingResult<ReplyResult>>;
}

/// Reject missing or whitespace-only message content.
///
/// # Errors
/// Returns `InvalidPayload` when `content` is blank.
pub fn validate_content(content: &str) -> MessagingResult<()> {
    if content.trim().is_empty() {
        return Err(MessagingError::InvalidPayload(
            "content must not be empty".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod testing {
    //! Transport double that counts calls and can be told to fail.

    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::messaging::store::fallback_store::LocalFallbackStore;
    use crate::messaging::transport::local::LocalTransport;

    /// Wraps another transport, counting every call.
    pub struct ScriptedTransport {
        inner: Arc<dyn MessageTransport>,
        fail_with: Mutex<Option<fn() -> MessagingError>>,
        calls: AtomicUsize,
    }

    impl ScriptedTransport {
        pub fn new(inner: Arc<dyn MessageTransport>) -> Self {
            Self {
                inner,
                fail_with: Mutex::new(None),
                calls: AtomicUsize::new(0),
            }
        }

        /// Transport over a fresh in-memory fallback store.
        pub fn in_memory() -> Self {
            Self::new(Arc::new(LocalTransport::new(Arc::new(
                LocalFallbackStore::in_memory(),
            ))))
        }

        /// Every subsequent call fails with the produced error.
        pub fn fail_with(&self, make: fn() -> MessagingError) {
            *self.fail_with.lock().unwrap() = Some(make);
        }

        pub fn succeed(&self) {
            *self.fail_with.lock().unwrap() = None;
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        fn record(&self) -> MessagingResult<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match *self.fail_with.lock().unwrap() {
                Some(make) => Err(make()),
                None => Ok(()),
            }
        }
    }

    impl MessageTransport for ScriptedTransport {
        fn name(&self) -> &'static str {
            "scripted"
        }

        fn send_message(
            &self,
            payload: SendMessagePayload,
        ) -> TransportFuture<'_, MessagingResult<SendMessageResult>> {
            Box::pin(async move {
                self.record()?;
                self.inner.send_message(payload).await
            })
        }

        fn get_user_conversations(
            &self,
            user_id: Option<UserId>,
        ) -> TransportFuture<'_, MessagingResult<Vec<Conversation>>> {
            Box::pin(async move {
                self.record()?;
                self.inner.get_user_conversations(user_id).await
            })
        }

        fn get_conversation_messages(
            &self,
            conversation_id: ConversationId,
        ) -> TransportFuture<'_, MessagingResult<ConversationMessages>> {
            Box::pin(async move {
                self.record()?;
                self.inner.get_conversation_messages(conversation_id).await
            })
        }

        fn admin_get_conversation(
            &self,
            conversation_id: ConversationId,
        ) -> TransportFuture<'_, MessagingResult<ConversationMessages>> {
            Box::pin(async move {
                self.record()?;
                self.inner.admin_get_conversation(conversation_id).await
            })
        }

        fn admin_send_reply(
            &self,
            conversation_id: ConversationId,
            payload: ReplyPayload,
        ) -> TransportFuture<'_, MessagingResult<ReplyResult>> {
            Box::pin(async move {
                self.record()?;
                self.inner.admin_send_reply(conversation_id, payload).await
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_content_is_invalid() {
        assert!(validate_content("Hello").is_ok());
        for blank in ["", "   ", "\n\t"] {
            assert!(matches!(
                validate_content(blank),
                Err(MessagingError::InvalidPayload(_))
            ));
        }
    }
}
