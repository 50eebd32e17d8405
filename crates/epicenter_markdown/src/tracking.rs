//! Per-table `rowId -> filename` tracking, the provider's map between a row's
//! identity and the file it's currently serialized to.
//!
//! A row's filename isn't stable: a title-based serializer renames the file
//! whenever the title changes. Tracking is what lets the provider notice that
//! and unlink the stale file instead of leaving it behind as an orphan.

use std::collections::HashMap;
use std::sync::Mutex;

/// Thread-safe `table -> rowId -> filename` map.
///
/// One instance is shared across a provider's CRDT observers and file
/// watcher, both of which run on different threads.
#[derive(Default)]
pub struct Tracking {
    tables: Mutex<HashMap<String, HashMap<String, String>>>,
}

impl Tracking {
    /// An empty tracking map.
    pub fn new() -> Self {
        Self::default()
    }

    /// The filename currently tracked for `(table, id)`, if any.
    pub fn get(&self, table: &str, id: &str) -> Option<String> {
        self.tables.lock().unwrap().get(table)?.get(id).cloned()
    }

    /// Record that `(table, id)` currently lives at `filename`.
    pub fn set(&self, table: &str, id: &str, filename: impl Into<String>) {
        self.tables
            .lock()
            .unwrap()
            .entry(table.to_string())
            .or_default()
            .insert(id.to_string(), filename.into());
    }

    /// Stop tracking `(table, id)`, returning its prior filename if any.
    pub fn remove(&self, table: &str, id: &str) -> Option<String> {
        self.tables.lock().unwrap().get_mut(table)?.remove(id)
    }

    /// Every `(id, filename)` pair currently tracked for `table`.
    pub fn snapshot(&self, table: &str) -> Vec<(String, String)> {
        self.tables
            .lock()
            .unwrap()
            .get(table)
            .map(|rows| rows.iter().map(|(id, f)| (id.clone(), f.clone())).collect())
            .unwrap_or_default()
    }

    /// Drop every entry for `table` (used before rebuilding it wholesale).
    pub fn clear_table(&self, table: &str) {
        if let Some(rows) = self.tables.lock().unwrap().get_mut(table) {
            rows.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_then_get_round_trips() {
        let tracking = Tracking::new();
        tracking.set("notes", "n1", "n1.md");
        assert_eq!(tracking.get("notes", "n1"), Some("n1.md".to_string()));
    }

    #[test]
    fn remove_clears_the_entry() {
        let tracking = Tracking::new();
        tracking.set("notes", "n1", "n1.md");
        assert_eq!(tracking.remove("notes", "n1"), Some("n1.md".to_string()));
        assert_eq!(tracking.get("notes", "n1"), None);
    }

    #[test]
    fn tables_are_independent() {
        let tracking = Tracking::new();
        tracking.set("notes", "n1", "n1.md");
        tracking.set("tabs", "n1", "other.md");
        assert_eq!(tracking.get("notes", "n1"), Some("n1.md".to_string()));
        assert_eq!(tracking.get("tabs", "n1"), Some("other.md".to_string()));
    }

    #[test]
    fn snapshot_lists_every_tracked_row() {
        let tracking = Tracking::new();
        tracking.set("notes", "n1", "n1.md");
        tracking.set("notes", "n2", "n2.md");
        let mut rows = tracking.snapshot("notes");
        rows.sort();
        assert_eq!(
            rows,
            vec![("n1".to_string(), "n1.md".to_string()), ("n2".to_string(), "n2.md".to_string())]
        );
        assert!(tracking.snapshot("missing").is_empty());
    }

    #[test]
    fn clear_table_empties_just_that_table() {
        let tracking = Tracking::new();
        tracking.set("notes", "n1", "n1.md");
        tracking.set("tabs", "t1", "t1.md");
        tracking.clear_table("notes");
        assert!(tracking.snapshot("notes").is_empty());
        assert_eq!(tracking.snapshot("tabs").len(), 1);
    }
}
