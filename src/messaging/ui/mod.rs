//! Chat surfaces: the shopper widget, the support browser, and their
//! plain-text rendering.

pub mod admin_browser;
pub mod format;
pub mod terminal;
pub mod widget;

pub use admin_browser::{AdminBrowser, ConversationDetail, ConversationListEntry};
pub use format::{format_time, relative_label};
pub use widget::{Bubble, BubbleSide, ChatWidget, ProductContext, WidgetView};
