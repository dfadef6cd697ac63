//! End-user chat widget.
//!
//! A view-model over [`ConversationState`]: it owns only presentation state
//! (open flag, draft, notification) and delegates every transition to the
//! container.

use std::sync::Arc;

use tracing::debug;

use crate::messaging::core::errors::MessagingError;
use crate::messaging::core::models::{Message, MessageOrigin};
use crate::messaging::state::ConversationState;
use crate::messaging::ui::format::format_time;

/// Product the shopper was looking at when opening the chat.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ProductContext {
    /// Product display name.
    pub name: String,
    /// Catalog identifier, if known.
    pub product_id: Option<String>,
}

impl ProductContext {
    /// Context for a product name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            product_id: None,
        }
    }

    /// Attach the catalog identifier.
    #[must_use]
    pub fn with_product_id(mut self, product_id: impl Into<String>) -> Self {
        self.product_id = Some(product_id.into());
        self
    }
}

/// Which side of the transcript a bubble sits on.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum BubbleSide {
    /// Written by the viewer.
    Outgoing,
    /// Written by the other party.
    Incoming,
}

/// One rendered message.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Bubble {
    /// Side of the transcript.
    pub side: BubbleSide,
    /// Author label.
    pub author: String,
    /// Message body.
    pub content: String,
    /// `HH:MM` send time.
    pub time: String,
}

/// Turn messages into bubbles as seen by `viewer`.
///
/// `other` labels messages written by the other party.
#[must_use]
pub fn bubbles(messages: &[Message], viewer: MessageOrigin, other: &str) -> Vec<Bubble> {
    messages
        .iter()
        .map(|message| {
            let outgoing = message.from == viewer;
            Bubble {
                side: if outgoing {
                    BubbleSide::Outgoing
                } else {
                    BubbleSide::Incoming
                },
                author: if outgoing {
                    "You".to_string()
                } else {
                    other.to_string()
                },
                content: message.content.clone(),
                time: format_time(&message.created_at),
            }
        })
        .collect()
}

/// Everything needed to draw the widget.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct WidgetView {
    /// Whether the panel is expanded.
    pub open: bool,
    /// Header text.
    pub title: String,
    /// Welcome text, shown only while the transcript is empty.
    pub placeholder: Option<String>,
    /// Transcript in chronological order.
    pub bubbles: Vec<Bubble>,
    /// Typing indicator.
    pub typing: bool,
    /// Error banner.
    pub notification: Option<String>,
    /// Current input text.
    pub draft: String,
    /// Whether the send button is enabled.
    pub can_send: bool,
}

/// Floating chat widget for a signed-in shopper.
pub struct ChatWidget {
    state: Arc<ConversationState>,
    product: Option<ProductContext>,
    open: bool,
    draft: String,
    notification: Option<String>,
}

impl ChatWidget {
    /// Widget over a shared state container.
    #[must_use]
    pub const fn new(state: Arc<ConversationState>) -> Self {
        Self {
            state,
            product: None,
            open: false,
            draft: String::new(),
            notification: None,
        }
    }

    /// Seed the welcome text with a product.
    #[must_use]
    pub fn with_product(mut self, product: ProductContext) -> Self {
        self.product = Some(product);
        self
    }

    /// Underlying state container.
    #[must_use]
    pub const fn state(&self) -> &Arc<ConversationState> {
        &self.state
    }

    /// Whether the panel is expanded.
    #[must_use]
    pub const fn is_open(&self) -> bool {
        self.open
    }

    /// Expand the panel and show the shopper's most recent conversation.
    pub async fn open(&mut self) {
        self.open = true;
        self.state.fetch_conversations().await;

        let snapshot = self.state.snapshot();
        if snapshot.current_conversation.is_some() {
            return;
        }
        let Some(latest) = snapshot
            .conversations
            .iter()
            .max_by_key(|conversation| conversation.updated_at)
        else {
            debug!("No conversation yet, showing welcome text");
            return;
        };

        if self
            .state
            .open_conversation(latest.id.clone())
            .await
            .is_err()
        {
            self.notification = Some("Could not load your conversation.".to_string());
        }
    }

    /// Collapse the panel. State is kept.
    pub const fn close(&mut self) {
        self.open = false;
    }

    /// Replace the input text.
    pub fn set_draft(&mut self, text: impl Into<String>) {
        self.draft = text.into();
    }

    /// Current input text.
    #[must_use]
    pub fn draft(&self) -> &str {
        &self.draft
    }

    /// Error banner, if any.
    #[must_use]
    pub fn notification(&self) -> Option<&str> {
        self.notification.as_deref()
    }

    /// Hide the error banner.
    pub fn dismiss_notification(&mut self) {
        self.notification = None;
    }

    /// Send the draft.
    ///
    /// Returns `false` without any I/O when the draft is blank. On failure the
    /// draft is kept and a notification is raised.
    pub async fn submit(&mut self) -> bool {
        if self.draft.trim().is_empty() {
            return false;
        }

        match self.state.send_message(&self.draft).await {
            Ok(_) => {
                self.draft.clear();
                self.notification = None;
                true
            }
            Err(err) => {
                self.notification = Some(notice_for(&err).to_string());
                false
            }
        }
    }

    /// Welcome text for an empty transcript.
    #[must_use]
    pub fn welcome_text(&self) -> String {
        match &self.product {
            Some(product) => format!("Questions about {}? Ask us anything.", product.name),
            None => "Hi! How can we help you today?".to_string(),
        }
    }

    /// Current rendering.
    #[must_use]
    pub fn view(&self) -> WidgetView {
        let snapshot = self.state.snapshot();
        let bubbles = bubbles(&snapshot.messages, MessageOrigin::User, "Support");
        let title = match &self.product {
            Some(product) => format!("Chat about {}", product.name),
            None => "Chat with us".to_string(),
        };

        WidgetView {
            open: self.open,
            title,
            placeholder: bubbles.is_empty().then(|| self.welcome_text()),
            typing: snapshot.is_loading,
            notification: self.notification.clone(),
            draft: self.draft.clone(),
            can_send: !self.draft.trim().is_empty() && !snapshot.is_loading,
            bubbles,
        }
    }
}

/// User-facing text for a failed send.
fn notice_for(err: &MessagingError) -> &'static str {
    match err {
        MessagingError::NotAuthenticated => "Please sign in to chat with us.",
        _ if err.is_validation() => "Type a message first.",
        _ => "Your message could not be sent. Please try again.",
    }
}
