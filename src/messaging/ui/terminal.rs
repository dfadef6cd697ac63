//! Plain-text rendering of the chat views.

use crate::messaging::ui::admin_browser::{ConversationDetail, ConversationListEntry};
use crate::messaging::ui::widget::{Bubble, BubbleSide, WidgetView};

const OUTGOING_INDENT: &str = "        ";

fn bubble_line(bubble: &Bubble) -> String {
    let indent = match bubble.side {
        BubbleSide::Outgoing => OUTGOING_INDENT,
        BubbleSide::Incoming => "",
    };
    format!(
        "{indent}[{}] {}: {}",
        bubble.time, bubble.author, bubble.content
    )
}

/// Render the shopper widget.
#[must_use]
pub fn render_widget(view: &WidgetView) -> Vec<String> {
    if !view.open {
        return vec![format!("({} is closed)", view.title)];
    }

    let mut lines = vec![format!("== {} ==", view.title)];
    if let Some(placeholder) = &view.placeholder {
        lines.push(placeholder.clone());
    }
    lines.extend(view.bubbles.iter().map(bubble_line));
    if view.typing {
        lines.push("...".to_string());
    }
    if let Some(notification) = &view.notification {
        lines.push(format!("! {notification}"));
    }
    lines
}

/// Render the admin list pane.
#[must_use]
pub fn render_entries(entries: &[ConversationListEntry]) -> Vec<String> {
    if entries.is_empty() {
        return vec!["No conversations yet.".to_string()];
    }

    entries
        .iter()
        .enumerate()
        .map(|(index, entry)| {
            let marker = if entry.selected { '>' } else { ' ' };
            let mut line = format!("{marker}{:>3}. {} ({})", index + 1, entry.label, entry.updated);
            if entry.message_count > 0 {
                line.push_str(&format!(" [{}]", entry.message_count));
            }
            if !entry.preview.is_empty() {
                line.push_str(" - ");
                line.push_str(&entry.preview);
            }
            line
        })
        .collect()
}

/// Render the admin detail pane.
#[must_use]
pub fn render_detail(detail: &ConversationDetail) -> Vec<String> {
    let mut lines = vec![format!("== {} ==", detail.title)];
    if detail.bubbles.is_empty() {
        lines.push("(no messages)".to_string());
    }
    lines.extend(detail.bubbles.iter().map(bubble_line));
    lines
}
