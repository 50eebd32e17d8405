//! The CRDT document: one per workspace, one ordered Y.Map per declared table.
//!
//! A workspace's entire state lives in a single `yrs::Doc`, named after the
//! workspace id. Each table declared by the workspace schema gets its own
//! top-level `Y.Map`, keyed by row id, holding that row's JSON-serialized
//! value as a string. [`Table`](crate::table::Table) is the typed surface
//! built on top of one such map; `Document` only knows about raw JSON text
//! and row ids.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use yrs::types::EntryChange;
use yrs::updates::decoder::Decode;
use yrs::updates::encoder::Encode;
use yrs::{Doc, Map, MapRef, Observable, ReadTxn, StateVector, Transact, Update};

use super::storage::CrdtStorage;
use super::types::Origin;
use crate::error::{EpicenterError, Result};

/// A single row-level change observed on a table's Y.Map.
#[derive(Debug, Clone)]
pub enum RowChange {
    /// The row at this key was inserted or overwritten.
    Upserted {
        /// The row's previous JSON value, if this was an overwrite.
        old: Option<serde_json::Value>,
        /// The row's new JSON value.
        new: serde_json::Value,
    },
    /// The row at this key was removed.
    Removed {
        /// The row's JSON value just before removal, if recoverable.
        old: Option<serde_json::Value>,
    },
}

/// One CRDT document per workspace.
///
/// Cheap to clone in spirit (it's normally held behind an `Arc` by
/// [`crate::workspace::Workspace`]), but `Document` itself owns its `yrs::Doc`
/// and a handle to the storage backend it persists updates through.
pub struct Document {
    id: String,
    doc: Doc,
    tables: HashMap<String, MapRef>,
    storage: Arc<dyn CrdtStorage>,
    /// Origin of the transaction currently being committed, if any. Table
    /// observers read this at commit time to tag a batch of row changes —
    /// yrs' own transaction origin isn't used (see [`Origin`]), so this is
    /// how the explicit origin passed to `transact`/`apply_remote_update`
    /// reaches a `Y.Map` observer, which yrs invokes synchronously on commit.
    current_origin: Arc<Mutex<Origin>>,
}

impl Document {
    /// Create a fresh, empty document for a workspace, declaring one Y.Map
    /// per table name up front so every table has a stable root container.
    pub fn new<I, S>(id: impl Into<String>, table_names: I, storage: Arc<dyn CrdtStorage>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let doc = Doc::new();
        let tables = table_names
            .into_iter()
            .map(|name| {
                let name = name.into();
                let map = doc.get_or_insert_map(name.as_str());
                (name, map)
            })
            .collect();

        Self {
            id: id.into(),
            doc,
            tables,
            storage,
            current_origin: Arc::new(Mutex::new(Origin::Local)),
        }
    }

    /// Load a previously persisted document: its snapshot, if any, followed
    /// by every update recorded since.
    pub fn load<I, S>(id: impl Into<String>, table_names: I, storage: Arc<dyn CrdtStorage>) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let id = id.into();
        let this = Self::new(id.clone(), table_names, storage);

        if let Some(state) = this.storage.load_doc(&id)? {
            this.apply_raw(&state)?;
        }
        for update in this.storage.get_all_updates(&id)? {
            this.apply_raw(&update.data)?;
        }

        Ok(this)
    }

    /// The workspace id this document is named after.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The underlying `yrs::Doc`, for callers (providers) that need direct access.
    pub fn doc(&self) -> &Doc {
        &self.doc
    }

    /// The storage backend this document persists updates through.
    pub fn storage(&self) -> &Arc<dyn CrdtStorage> {
        &self.storage
    }

    fn table_map(&self, table: &str) -> &MapRef {
        self.tables
            .get(table)
            .unwrap_or_else(|| panic!("table '{table}' was not declared on this document"))
    }

    fn apply_raw(&self, update: &[u8]) -> Result<()> {
        let decoded = Update::decode_v1(update).map_err(|e| EpicenterError::Crdt(e.to_string()))?;
        let mut txn = self.doc.transact_mut();
        txn.apply_update(decoded).map_err(|e| EpicenterError::Crdt(e.to_string()))
    }

    /// Run `f` in a write transaction, persist the delta it produced under
    /// `origin`, and return `f`'s result. A no-op mutation (e.g. `update()`
    /// on a missing row) produces an empty delta and is not persisted.
    fn transact<R>(&self, origin: &Origin, f: impl FnOnce(&mut yrs::TransactionMut) -> R) -> Result<R> {
        let sv_before = {
            let txn = self.doc.transact();
            txn.state_vector()
        };

        *self.current_origin.lock().unwrap() = origin.clone();
        let result = {
            let mut txn = self.doc.transact_mut();
            f(&mut txn)
        };

        let update = {
            let txn = self.doc.transact();
            txn.encode_state_as_update_v1(&sv_before)
        };

        if !update.is_empty() {
            self.storage.append_update(&self.id, &update, origin.clone())?;
        }

        Ok(result)
    }

    /// The raw JSON text stored for a row, if present.
    pub(crate) fn get_row(&self, table: &str, id: &str) -> Option<String> {
        let txn = self.doc.transact();
        self.table_map(table).get(&txn, id).map(|v| v.to_string(&txn))
    }

    /// All rows currently stored in a table, as `(id, json)` pairs.
    pub(crate) fn all_rows(&self, table: &str) -> Vec<(String, String)> {
        let txn = self.doc.transact();
        self.table_map(table)
            .iter(&txn)
            .map(|(key, value)| (key.to_string(), value.to_string(&txn)))
            .collect()
    }

    /// Number of rows currently stored in a table.
    pub(crate) fn row_count(&self, table: &str) -> usize {
        let txn = self.doc.transact();
        self.table_map(table).len(&txn) as usize
    }

    /// Insert or overwrite a row's JSON text.
    pub(crate) fn upsert_row(&self, table: &str, id: &str, json: String, origin: &Origin) -> Result<()> {
        self.transact(origin, |txn| {
            self.table_map(table).insert(txn, id, json);
        })
    }

    /// Remove a row entirely.
    pub(crate) fn remove_row(&self, table: &str, id: &str, origin: &Origin) -> Result<()> {
        self.transact(origin, |txn| {
            self.table_map(table).remove(txn, id);
        })
    }

    /// Encode the full current state vector (for sync handshakes).
    pub fn encode_state_vector(&self) -> Vec<u8> {
        let txn = self.doc.transact();
        txn.state_vector().encode_v1()
    }

    /// Encode the full document state as a single update.
    pub fn encode_state_as_update(&self) -> Vec<u8> {
        let txn = self.doc.transact();
        txn.encode_state_as_update_v1(&StateVector::default())
    }

    /// Encode the update needed to bring a peer at `remote_state_vector` up to date.
    pub fn encode_diff(&self, remote_state_vector: &[u8]) -> Result<Vec<u8>> {
        let sv = StateVector::decode_v1(remote_state_vector)
            .map_err(|e| EpicenterError::Crdt(e.to_string()))?;
        let txn = self.doc.transact();
        Ok(txn.encode_state_as_update_v1(&sv))
    }

    /// Apply an update received from a remote peer and persist it under that peer's origin.
    pub fn apply_remote_update(&self, update: &[u8], origin: Origin) -> Result<()> {
        *self.current_origin.lock().unwrap() = origin.clone();
        self.apply_raw(update)?;
        self.storage.append_update(&self.id, update, origin)?;
        Ok(())
    }

    /// Subscribe to raw binary updates on this document, across all tables and origins.
    pub fn observe_updates<F>(&self, callback: F) -> yrs::Subscription
    where
        F: Fn(&[u8]) + 'static,
    {
        self.doc
            .observe_update_v1(move |_txn, event| callback(&event.update))
            .expect("observe_update_v1 subscription")
    }

    /// Subscribe to row-level changes on one table's Y.Map.
    ///
    /// All changes in one callback invocation come from a single transaction
    /// and therefore share one [`Origin`], delivered alongside them.
    pub(crate) fn observe_table<F>(&self, table: &str, callback: F) -> yrs::Subscription
    where
        F: Fn(Vec<(String, RowChange)>, Origin) + 'static,
    {
        let current_origin = self.current_origin.clone();
        self.table_map(table).observe(move |txn, event| {
            let parse = |value: &yrs::types::Value, txn: &yrs::TransactionMut| -> serde_json::Value {
                let json = value.clone().cast::<String>().unwrap_or_default();
                serde_json::from_str(&json).unwrap_or(serde_json::Value::Null)
            };

            let changes: Vec<(String, RowChange)> = event
                .keys(txn)
                .iter()
                .map(|(key, change)| {
                    let key = key.to_string();
                    let change = match change {
                        EntryChange::Inserted(new) => RowChange::Upserted {
                            old: None,
                            new: parse(new, txn),
                        },
                        EntryChange::Updated(old, new) => RowChange::Upserted {
                            old: Some(parse(old, txn)),
                            new: parse(new, txn),
                        },
                        EntryChange::Removed(old) => RowChange::Removed {
                            old: Some(parse(old, txn)),
                        },
                    };
                    (key, change)
                })
                .collect();

            if !changes.is_empty() {
                let origin = current_origin.lock().unwrap().clone();
                // A panicking observer must not corrupt table state or stop
                // other observers from seeing later transactions (spec.md
                // §4.1's "exceptions inside a handler must not corrupt table
                // state"), so it's isolated the same way the teacher isolates
                // filesystem-event callbacks.
                let _ = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                    callback(changes, origin);
                }));
            }
        })
    }
}

impl std::fmt::Debug for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Document")
            .field("id", &self.id)
            .field("tables", &self.tables.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crdt::MemoryStorage;

    fn doc(storage: Arc<dyn CrdtStorage>) -> Document {
        Document::new("ws1", ["notes"], storage)
    }

    #[test]
    fn upsert_then_get_round_trips() {
        let storage: Arc<dyn CrdtStorage> = Arc::new(MemoryStorage::new());
        let document = doc(storage);
        document
            .upsert_row("notes", "n1", r#"{"id":"n1","content":"hi"}"#.to_string(), &Origin::Local)
            .unwrap();

        assert_eq!(
            document.get_row("notes", "n1"),
            Some(r#"{"id":"n1","content":"hi"}"#.to_string())
        );
        assert_eq!(document.row_count("notes"), 1);
    }

    #[test]
    fn remove_drops_the_row() {
        let storage: Arc<dyn CrdtStorage> = Arc::new(MemoryStorage::new());
        let document = doc(storage);
        document
            .upsert_row("notes", "n1", "{}".to_string(), &Origin::Local)
            .unwrap();
        document.remove_row("notes", "n1", &Origin::Local).unwrap();

        assert!(document.get_row("notes", "n1").is_none());
        assert_eq!(document.row_count("notes"), 0);
    }

    #[test]
    fn no_op_mutation_does_not_append_an_update() {
        let storage = Arc::new(MemoryStorage::new());
        let document = doc(storage.clone());
        document.remove_row("notes", "missing", &Origin::Local).unwrap();

        assert_eq!(storage.get_all_updates("ws1").unwrap().len(), 0);
    }

    #[test]
    fn sync_round_trip_between_two_documents() {
        let storage_a: Arc<dyn CrdtStorage> = Arc::new(MemoryStorage::new());
        let storage_b: Arc<dyn CrdtStorage> = Arc::new(MemoryStorage::new());
        let a = Document::new("ws1", ["notes"], storage_a);
        let b = Document::new("ws1", ["notes"], storage_b);

        a.upsert_row("notes", "n1", r#"{"id":"n1"}"#.to_string(), &Origin::Local)
            .unwrap();

        let sv = b.encode_state_vector();
        let diff = a.encode_diff(&sv).unwrap();
        b.apply_remote_update(&diff, Origin::Remote("peer-a".to_string())).unwrap();

        assert_eq!(b.get_row("notes", "n1"), Some(r#"{"id":"n1"}"#.to_string()));
    }

    #[test]
    fn observe_table_reports_upserts_and_removals() {
        use std::sync::Mutex;

        let storage: Arc<dyn CrdtStorage> = Arc::new(MemoryStorage::new());
        let document = doc(storage);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        let _sub = document.observe_table("notes", move |changes, origin| {
            assert_eq!(origin, Origin::Local);
            seen_clone.lock().unwrap().extend(changes);
        });

        document
            .upsert_row("notes", "n1", r#"{"id":"n1"}"#.to_string(), &Origin::Local)
            .unwrap();
        document.remove_row("notes", "n1", &Origin::Local).unwrap();

        let recorded = seen.lock().unwrap();
        assert_eq!(recorded.len(), 2);
        assert!(matches!(recorded[0], (_, RowChange::Upserted { .. })));
        assert!(matches!(recorded[1], (_, RowChange::Removed { .. })));
    }

    #[test]
    fn observer_panic_does_not_corrupt_later_transactions() {
        use std::sync::Mutex;

        let storage: Arc<dyn CrdtStorage> = Arc::new(MemoryStorage::new());
        let document = doc(storage);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        let _sub = document.observe_table("notes", move |changes, _origin| {
            seen_clone.lock().unwrap().extend(changes.iter().map(|(id, _)| id.clone()));
            panic!("observer blew up");
        });

        document
            .upsert_row("notes", "n1", r#"{"id":"n1"}"#.to_string(), &Origin::Local)
            .unwrap();
        document
            .upsert_row("notes", "n2", r#"{"id":"n2"}"#.to_string(), &Origin::Local)
            .unwrap();

        assert_eq!(document.get_row("notes", "n1"), Some(r#"{"id":"n1"}"#.to_string()));
        assert_eq!(document.get_row("notes", "n2"), Some(r#"{"id":"n2"}"#.to_string()));
        assert_eq!(*seen.lock().unwrap(), vec!["n1".to_string(), "n2".to_string()]);
    }
}
