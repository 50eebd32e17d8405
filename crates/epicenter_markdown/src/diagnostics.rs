//! The diagnostics set: the provider's replayable snapshot of files currently
//! failing to deserialize, persisted next to the provider's audit log.
//!
//! This is the operator's dashboard, not the historical record — an entry is
//! cleared the moment the offending file is fixed or deleted. The separate
//! append-only log (written by [`crate::provider`]) is what keeps history.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use epicenter_core::Result;
use epicenter_core::fs::AsyncFileSystem;

/// One currently-broken file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosticEntry {
    /// Absolute path to the offending file.
    pub absolute_path: PathBuf,
    /// Table the file lives under.
    pub table: String,
    /// The file's name within its table directory.
    pub filename: String,
    /// Human-readable description of why the file is broken.
    pub error: String,
}

/// Current-state index of files that fail to deserialize, keyed by absolute
/// path so a fix or deletion can be cleared in O(1).
#[derive(Default)]
pub struct Diagnostics {
    entries: Mutex<BTreeMap<PathBuf, DiagnosticEntry>>,
}

impl Diagnostics {
    /// An empty diagnostics set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record or replace the diagnostic for `entry.absolute_path`.
    pub fn record(&self, entry: DiagnosticEntry) {
        self.entries.lock().unwrap().insert(entry.absolute_path.clone(), entry);
    }

    /// Clear the diagnostic for `path`, if any. Called on successful
    /// deserialization or when the file is deleted.
    pub fn clear(&self, path: &Path) {
        self.entries.lock().unwrap().remove(path);
    }

    /// Every currently-broken file, in path order.
    pub fn snapshot(&self) -> Vec<DiagnosticEntry> {
        self.entries.lock().unwrap().values().cloned().collect()
    }

    /// Replace the whole set (used by bulk pull/push, which rebuild
    /// diagnostics from scratch as a side effect).
    pub fn replace_all(&self, entries: Vec<DiagnosticEntry>) {
        let mut map = self.entries.lock().unwrap();
        map.clear();
        for entry in entries {
            map.insert(entry.absolute_path.clone(), entry);
        }
    }

    /// Persist the current snapshot as pretty JSON at `path`.
    pub async fn persist(&self, fs: &dyn AsyncFileSystem, path: &Path) -> Result<()> {
        let snapshot = self.snapshot();
        let json = serde_json::to_string_pretty(&snapshot)?;
        if let Some(parent) = path.parent() {
            fs.create_dir_all(parent).await?;
        }
        Ok(fs.write_file(path, &json).await?)
    }

    /// Load a previously persisted snapshot, if `path` exists.
    pub async fn load(fs: &dyn AsyncFileSystem, path: &Path) -> Result<Self> {
        if !fs.exists(path).await {
            return Ok(Self::new());
        }
        let json = fs.read_to_string(path).await?;
        let entries: Vec<DiagnosticEntry> = serde_json::from_str(&json)?;
        let diagnostics = Self::new();
        diagnostics.replace_all(entries);
        Ok(diagnostics)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use epicenter_core::fs::{InMemoryFileSystem, SyncToAsyncFs};

    fn entry(path: &str) -> DiagnosticEntry {
        DiagnosticEntry {
            absolute_path: PathBuf::from(path),
            table: "notes".to_string(),
            filename: "ghost.md".to_string(),
            error: "missing id".to_string(),
        }
    }

    #[test]
    fn record_then_clear() {
        let diagnostics = Diagnostics::new();
        diagnostics.record(entry("/ws/notes/ghost.md"));
        assert_eq!(diagnostics.snapshot().len(), 1);

        diagnostics.clear(Path::new("/ws/notes/ghost.md"));
        assert!(diagnostics.snapshot().is_empty());
    }

    #[test]
    fn replace_all_drops_stale_entries() {
        let diagnostics = Diagnostics::new();
        diagnostics.record(entry("/ws/notes/a.md"));
        diagnostics.replace_all(vec![entry("/ws/notes/b.md")]);

        let snapshot = diagnostics.snapshot();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].absolute_path, PathBuf::from("/ws/notes/b.md"));
    }

    #[test]
    fn persist_then_load_round_trips() {
        futures_lite::future::block_on(async {
            let fs = SyncToAsyncFs::new(InMemoryFileSystem::new());
            let diagnostics = Diagnostics::new();
            diagnostics.record(entry("/ws/.epicenter/ws1/a.md"));

            let path = Path::new("/ws/.epicenter/ws1/markdown.diagnostics.json");
            diagnostics.persist(&fs, path).await.unwrap();

            let loaded = Diagnostics::load(&fs, path).await.unwrap();
            assert_eq!(loaded.snapshot(), diagnostics.snapshot());
        });
    }

    #[test]
    fn load_missing_file_is_empty() {
        futures_lite::future::block_on(async {
            let fs = SyncToAsyncFs::new(InMemoryFileSystem::new());
            let loaded = Diagnostics::load(&fs, Path::new("/nope.json")).await.unwrap();
            assert!(loaded.snapshot().is_empty());
        });
    }
}
