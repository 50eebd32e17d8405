//! Storage abstraction for CRDT persistence.
//!
//! This module defines the [`CrdtStorage`] trait which abstracts over different
//! storage backends for persisting CRDT documents and updates.

use super::types::{CrdtUpdate, Origin};
use crate::error::EpicenterError;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, EpicenterError>;

/// Trait for CRDT document storage backends.
///
/// Implementations of this trait handle persisting CRDT state and updates
/// to a storage backend. [`Document::new`](super::doc::Document::new) loads
/// a document's prior state from one of these on construction and appends to
/// it on every local transaction (spec.md §2, "CRDT substrate").
pub trait CrdtStorage: Send + Sync {
    /// Load the full document state as a binary blob.
    ///
    /// Returns `None` if the document doesn't exist.
    fn load_doc(&self, name: &str) -> StorageResult<Option<Vec<u8>>>;

    /// Append an incremental update to the update log.
    ///
    /// Returns the ID of the newly created update record.
    fn append_update(&self, name: &str, update: &[u8], origin: Origin) -> StorageResult<i64>;

    /// Get all updates for a document.
    fn get_all_updates(&self, name: &str) -> StorageResult<Vec<CrdtUpdate>>;
}

#[cfg(test)]
mod tests {
    // Tests are in memory_storage.rs using MemoryStorage
}
