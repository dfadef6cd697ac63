//! Session state shared by chat surfaces.

pub mod container;

pub use container::{ChatSnapshot, ConversationState};
