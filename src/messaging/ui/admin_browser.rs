//! Support-side conversation browser: a list pane over every conversation
//! and a detail pane with a reply box.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::messaging::core::errors::{MessagingError, MessagingResult};
use crate::messaging::core::ids::ConversationId;
use crate::messaging::core::models::{
    Conversation, ConversationMessages, MessageOrigin, ReplyPayload, ReplyResult,
};
use crate::messaging::transport::MessageTransport;
use crate::messaging::ui::format::relative_label;
use crate::messaging::ui::widget::{Bubble, bubbles};

/// One row of the list pane.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ConversationListEntry {
    /// Conversation id.
    pub id: ConversationId,
    /// User name, email, or raw user id.
    pub label: String,
    /// Last message preview, empty for a fresh conversation.
    pub preview: String,
    /// Age of the last activity.
    pub updated: String,
    /// Number of messages, when the list endpoint returns them.
    pub message_count: usize,
    /// Whether this row is open in the detail pane.
    pub selected: bool,
}

/// Detail pane content.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ConversationDetail {
    /// Conversation id.
    pub id: ConversationId,
    /// Header label.
    pub title: String,
    /// Full transcript, support messages on the outgoing side.
    pub bubbles: Vec<Bubble>,
}

/// Two-pane admin view over a transport.
pub struct AdminBrowser {
    transport: Arc<dyn MessageTransport>,
    conversations: Vec<Conversation>,
    selected: Option<ConversationMessages>,
}

impl AdminBrowser {
    /// Empty browser; call [`AdminBrowser::refresh`] to populate it.
    #[must_use]
    pub fn new(transport: Arc<dyn MessageTransport>) -> Self {
        Self {
            transport,
            conversations: Vec::new(),
            selected: None,
        }
    }

    /// Conversations in the list pane, most recent first.
    #[must_use]
    pub fn conversations(&self) -> &[Conversation] {
        &self.conversations
    }

    /// Conversation open in the detail pane.
    #[must_use]
    pub const fn selected(&self) -> Option<&ConversationMessages> {
        self.selected.as_ref()
    }

    /// Reload the list and, if one is open, the selected conversation.
    ///
    /// # Errors
    /// Returns the transport error from the list request. A failure reloading
    /// the selection is logged and keeps the previous detail.
    pub async fn refresh(&mut self) -> MessagingResult<()> {
        let mut conversations = self.transport.get_user_conversations(None).await?;
        conversations.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        self.conversations = conversations;

        if let Some(id) = self.selected.as_ref().map(|s| s.conversation.id.clone()) {
            match self.transport.admin_get_conversation(id.clone()).await {
                Ok(detail) => self.selected = Some(detail),
                Err(err) => {
                    warn!(
                        conversation_id = %id,
                        error = %err,
                        "Failed to reload selected conversation"
                    );
                }
            }
        }
        Ok(())
    }

    /// Open a conversation in the detail pane.
    ///
    /// # Errors
    /// Returns `NotFound` for an unknown id, or a transport error. The previous
    /// selection is kept on failure.
    pub async fn select(&mut self, conversation_id: ConversationId) -> MessagingResult<()> {
        let detail = self.transport.admin_get_conversation(conversation_id).await?;
        self.selected = Some(detail);
        Ok(())
    }

    /// Open the `index`-th list entry (zero based).
    ///
    /// # Errors
    /// Returns `NotFound` when the index is out of range.
    pub async fn select_index(&mut self, index: usize) -> MessagingResult<()> {
        let id = self
            .conversations
            .get(index)
            .map(|conversation| conversation.id.clone())
            .ok_or_else(|| MessagingError::NotFound(format!("list entry {}", index + 1)))?;
        self.select(id).await
    }

    /// Reply to the selected conversation, then refresh both panes.
    ///
    /// # Errors
    /// `EmptyMessage` for blank content and `NotFound` without a selection,
    /// both before any I/O; otherwise the transport error.
    pub async fn reply(&mut self, content: &str) -> MessagingResult<ReplyResult> {
        let content = content.trim();
        if content.is_empty() {
            return Err(MessagingError::EmptyMessage);
        }
        let id = self
            .selected
            .as_ref()
            .map(|selected| selected.conversation.id.clone())
            .ok_or_else(|| MessagingError::NotFound("no conversation selected".to_string()))?;

        let result = self
            .transport
            .admin_send_reply(
                id.clone(),
                ReplyPayload {
                    content: content.to_string(),
                },
            )
            .await?;
        info!(conversation_id = %id, "Support reply sent");

        if let Err(err) = self.refresh().await {
            warn!(error = %err, "Failed to refresh after reply");
        }
        Ok(result)
    }

    /// Rows of the list pane.
    #[must_use]
    pub fn entries(&self, now: &DateTime<Utc>) -> Vec<ConversationListEntry> {
        let selected = self.selected.as_ref().map(|s| &s.conversation.id);
        self.conversations
            .iter()
            .map(|conversation| ConversationListEntry {
                id: conversation.id.clone(),
                label: conversation.display_label(),
                preview: conversation
                    .last_message_preview
                    .clone()
                    .unwrap_or_default(),
                updated: relative_label(&conversation.updated_at, now),
                message_count: conversation.messages.len(),
                selected: selected == Some(&conversation.id),
            })
            .collect()
    }

    /// Detail pane, if a conversation is selected.
    #[must_use]
    pub fn detail(&self) -> Option<ConversationDetail> {
        self.selected.as_ref().map(|selected| {
            let title = selected.conversation.display_label();
            ConversationDetail {
                id: selected.conversation.id.clone(),
                bubbles: bubbles(&selected.messages, MessageOrigin::Admin, &title),
                title,
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messaging::core::ids::UserId;
    use crate::messaging::core::models::{SendMessagePayload, UserMeta};
    use crate::messaging::transport::testing::ScriptedTransport;
    use crate::messaging::ui::widget::BubbleSide;

    async fn seeded() -> (Arc<ScriptedTransport>, AdminBrowser) {
        let transport = Arc::new(ScriptedTransport::in_memory());
        let seeds = [("u1", Some("Ann"), "Hello"), ("u2", None, "Where is my order?")];
        for (user, name, content) in seeds {
            transport
                .send_message(SendMessagePayload {
                    user_id: UserId::new(user),
                    user_meta: Some(UserMeta {
                        email: Some(format!("{user}@shop.test")),
                        name: name.map(str::to_string),
                    }),
                    content: content.to_string(),
                })
                .await
                .unwrap();
        }
        let mut browser = AdminBrowser::new(transport.clone());
        browser.refresh().await.unwrap();
        (transport, browser)
    }

    #[tokio::test]
    async fn list_shows_labels_and_previews_most_recent_first() {
        let (_transport, browser) = seeded().await;
        let entries = browser.entries(&Utc::now());

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].label, "u2@shop.test");
        assert_eq!(entries[0].preview, "Where is my order?");
        assert_eq!(entries[1].label, "Ann");
        assert_eq!(entries[1].updated, "just now");
        assert_eq!(entries[1].message_count, 1);
        assert!(entries.iter().all(|entry| !entry.selected));
    }

    #[tokio::test]
    async fn reply_refreshes_detail_and_list() {
        let (_transport, mut browser) = seeded().await;
        browser.select_index(1).await.unwrap();

        browser.reply("  We're here ").await.unwrap();

        let detail = browser.detail().unwrap();
        assert_eq!(detail.title, "Ann");
        assert_eq!(detail.bubbles.len(), 2);
        assert_eq!(detail.bubbles[0].side, BubbleSide::Incoming);
        assert_eq!(detail.bubbles[0].author, "Ann");
        assert_eq!(detail.bubbles[1].side, BubbleSide::Outgoing);
        assert_eq!(detail.bubbles[1].content, "We're here");

        let entries = browser.entries(&Utc::now());
        assert_eq!(entries[0].label, "Ann");
        assert_eq!(entries[0].preview, "We're here");
        assert!(entries[0].selected);
    }

    #[tokio::test]
    async fn reply_is_validated_before_io() {
        let (transport, mut browser) = seeded().await;
        let calls = transport.calls();

        assert!(matches!(
            browser.reply("hi").await,
            Err(MessagingError::NotFound(_))
        ));
        browser.select_index(0).await.unwrap();
        let calls_after_select = transport.calls();
        assert_eq!(calls_after_select, calls + 1);
        assert!(matches!(
            browser.reply("   ").await,
            Err(MessagingError::EmptyMessage)
        ));
        assert_eq!(transport.calls(), calls_after_select);
    }

    #[tokio::test]
    async fn failed_select_keeps_previous_detail() {
        let (_transport, mut browser) = seeded().await;
        browser.select_index(0).await.unwrap();
        let before = browser.selected().cloned();

        assert!(
            browser
                .select(ConversationId::new("conv_missing"))
                .await
                .is_err()
        );
        assert!(browser.select_index(9).await.is_err());
        assert_eq!(browser.selected().cloned(), before);
    }

    #[tokio::test]
    async fn refresh_failure_is_reported() {
        let (transport, mut browser) = seeded().await;
        transport.fail_with(|| MessagingError::Http {
            status: 403,
            message: "admin only".to_string(),
        });

        assert!(browser.refresh().await.is_err());
        assert_eq!(browser.conversations().len(), 2);
    }
}
