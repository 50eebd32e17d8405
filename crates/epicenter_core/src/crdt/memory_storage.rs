//! In-memory storage implementation for testing and WASM.
//!
//! This provides a simple in-memory implementation of [`CrdtStorage`]
//! for use in unit tests, development, and WASM environments.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use super::storage::{CrdtStorage, StorageResult};
use super::types::{CrdtUpdate, Origin};

/// In-memory CRDT storage for testing.
///
/// Stores each document's update log in memory; thread-safe via `RwLock`
/// but data is lost when dropped. Has no document-snapshot layer — a
/// document's full state is always reconstructed by replaying its update
/// log (`Document::new` does this via `load_doc`/`get_all_updates`).
#[derive(Debug, Default)]
pub struct MemoryStorage {
    /// Update logs (name -> list of updates).
    updates: Arc<RwLock<HashMap<String, Vec<StoredUpdate>>>>,
    /// Counter for generating update IDs.
    next_id: Arc<RwLock<i64>>,
}

#[derive(Debug, Clone)]
struct StoredUpdate {
    id: i64,
    data: Vec<u8>,
    timestamp: i64,
    origin: Origin,
}

impl MemoryStorage {
    /// Create a new empty in-memory storage.
    pub fn new() -> Self {
        Self::default()
    }

    fn next_update_id(&self) -> i64 {
        let mut id = self.next_id.write().unwrap();
        *id += 1;
        *id
    }
}

impl CrdtStorage for MemoryStorage {
    fn load_doc(&self, _name: &str) -> StorageResult<Option<Vec<u8>>> {
        Ok(None)
    }

    fn append_update(&self, name: &str, update: &[u8], origin: Origin) -> StorageResult<i64> {
        let id = self.next_update_id();
        let stored = StoredUpdate {
            id,
            data: update.to_vec(),
            timestamp: chrono::Utc::now().timestamp_millis(),
            origin,
        };

        let mut updates = self.updates.write().unwrap();
        updates.entry(name.to_string()).or_default().push(stored);

        Ok(id)
    }

    fn get_all_updates(&self, name: &str) -> StorageResult<Vec<CrdtUpdate>> {
        let updates = self.updates.read().unwrap();
        Ok(updates
            .get(name)
            .map(|u| u.as_slice())
            .unwrap_or(&[])
            .iter()
            .map(|u| CrdtUpdate {
                update_id: u.id,
                doc_name: name.to_string(),
                data: u.data.clone(),
                timestamp: u.timestamp,
                origin: u.origin.clone(),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_doc_is_always_empty() {
        let storage = MemoryStorage::new();
        assert!(storage.load_doc("test").unwrap().is_none());
    }

    #[test]
    fn append_and_get_all_updates() {
        let storage = MemoryStorage::new();

        let id1 = storage.append_update("test", b"update1", Origin::Local).unwrap();
        let id2 = storage
            .append_update("test", b"update2", Origin::Remote("peer-a".into()))
            .unwrap();
        let id3 = storage
            .append_update("test", b"update3", Origin::Remote("peer-b".into()))
            .unwrap();

        assert!(id1 < id2);
        assert!(id2 < id3);

        let all = storage.get_all_updates("test").unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].origin, Origin::Local);
        assert_eq!(all[1].origin, Origin::Remote("peer-a".into()));
    }

    #[test]
    fn updates_are_scoped_per_document() {
        let storage = MemoryStorage::new();
        storage.append_update("doc1", b"a", Origin::Local).unwrap();
        storage.append_update("doc2", b"b", Origin::Local).unwrap();

        assert_eq!(storage.get_all_updates("doc1").unwrap().len(), 1);
        assert_eq!(storage.get_all_updates("doc2").unwrap().len(), 1);
    }

    #[test]
    fn get_all_updates_on_unknown_document_is_empty() {
        let storage = MemoryStorage::new();
        assert!(storage.get_all_updates("nonexistent").unwrap().is_empty());
    }
}
