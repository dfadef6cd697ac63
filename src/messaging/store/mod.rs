//! Local persistence used when the remote API is unavailable.

pub mod fallback_store;
pub mod slot;

pub use fallback_store::LocalFallbackStore;
pub use slot::{FileSlot, MemorySlot, StorageSlot};
