//! In-memory [`FileSystem`] implementation.
//!
//! Used on WASM targets (where there is no real filesystem) and in tests that
//! want a faithful `FileSystem` without touching disk. Tracks directories
//! explicitly so `is_dir`/`list_files`/`create_dir_all` behave the way
//! callers of a real filesystem expect.

use std::collections::BTreeMap;
use std::io::{Error, ErrorKind, Result};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use super::FileSystem;

#[derive(Debug, Default)]
struct State {
    files: BTreeMap<PathBuf, Vec<u8>>,
    dirs: std::collections::BTreeSet<PathBuf>,
}

/// A thread-safe, in-memory filesystem.
///
/// Cloning shares the same underlying storage (it's an `Arc` handle), so a
/// clone can be handed to a watcher/provider while the original is kept
/// around for assertions.
#[derive(Clone, Default)]
pub struct InMemoryFileSystem {
    state: Arc<Mutex<State>>,
}

impl InMemoryFileSystem {
    /// Create a new, empty in-memory filesystem.
    pub fn new() -> Self {
        Self::default()
    }

    fn mark_ancestors_as_dirs(dirs: &mut std::collections::BTreeSet<PathBuf>, path: &Path) {
        let mut current = path;
        while let Some(parent) = current.parent() {
            if parent.as_os_str().is_empty() {
                break;
            }
            dirs.insert(parent.to_path_buf());
            current = parent;
        }
    }
}

impl FileSystem for InMemoryFileSystem {
    fn read_to_string(&self, path: &Path) -> Result<String> {
        let state = self.state.lock().unwrap();
        let bytes = state
            .files
            .get(path)
            .ok_or_else(|| Error::new(ErrorKind::NotFound, format!("{path:?} not found")))?;
        String::from_utf8(bytes.clone())
            .map_err(|e| Error::new(ErrorKind::InvalidData, e.to_string()))
    }

    fn write_file(&self, path: &Path, content: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        Self::mark_ancestors_as_dirs(&mut state.dirs, path);
        state.files.insert(path.to_path_buf(), content.as_bytes().to_vec());
        Ok(())
    }

    fn create_new(&self, path: &Path, content: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.files.contains_key(path) {
            return Err(Error::new(ErrorKind::AlreadyExists, "file exists"));
        }
        Self::mark_ancestors_as_dirs(&mut state.dirs, path);
        state.files.insert(path.to_path_buf(), content.as_bytes().to_vec());
        Ok(())
    }

    fn delete_file(&self, path: &Path) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state
            .files
            .remove(path)
            .map(|_| ())
            .ok_or_else(|| Error::new(ErrorKind::NotFound, format!("{path:?} not found")))
    }

    fn list_md_files(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .files
            .keys()
            .filter(|p| p.parent() == Some(dir) && p.extension().is_some_and(|e| e == "md"))
            .cloned()
            .collect())
    }

    fn exists(&self, path: &Path) -> bool {
        let state = self.state.lock().unwrap();
        state.files.contains_key(path) || state.dirs.contains(path)
    }

    fn create_dir_all(&self, path: &Path) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let mut current = PathBuf::new();
        for component in path.components() {
            current.push(component);
            state.dirs.insert(current.clone());
        }
        Ok(())
    }

    fn is_dir(&self, path: &Path) -> bool {
        let state = self.state.lock().unwrap();
        state.dirs.contains(path)
    }

    fn move_file(&self, from: &Path, to: &Path) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if !state.files.contains_key(from) {
            return Err(Error::new(ErrorKind::NotFound, format!("{from:?} not found")));
        }
        if state.files.contains_key(to) {
            return Err(Error::new(ErrorKind::AlreadyExists, format!("{to:?} already exists")));
        }
        Self::mark_ancestors_as_dirs(&mut state.dirs, to);
        let content = state.files.remove(from).unwrap();
        state.files.insert(to.to_path_buf(), content);
        Ok(())
    }

    fn read_binary(&self, path: &Path) -> Result<Vec<u8>> {
        let state = self.state.lock().unwrap();
        state
            .files
            .get(path)
            .cloned()
            .ok_or_else(|| Error::new(ErrorKind::NotFound, format!("{path:?} not found")))
    }

    fn write_binary(&self, path: &Path, content: &[u8]) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        Self::mark_ancestors_as_dirs(&mut state.dirs, path);
        state.files.insert(path.to_path_buf(), content.to_vec());
        Ok(())
    }

    fn list_files(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        let state = self.state.lock().unwrap();
        let mut out: Vec<PathBuf> = state
            .files
            .keys()
            .filter(|p| p.parent() == Some(dir))
            .cloned()
            .collect();
        out.extend(state.dirs.iter().filter(|p| p.parent() == Some(dir)).cloned());
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_then_read() {
        let fs = InMemoryFileSystem::new();
        fs.write_file(Path::new("/ws/notes/n1.md"), "hello").unwrap();
        assert_eq!(fs.read_to_string(Path::new("/ws/notes/n1.md")).unwrap(), "hello");
        assert!(fs.is_dir(Path::new("/ws/notes")));
    }

    #[test]
    fn create_new_rejects_existing() {
        let fs = InMemoryFileSystem::new();
        fs.create_new(Path::new("/a.md"), "x").unwrap();
        assert!(fs.create_new(Path::new("/a.md"), "y").is_err());
    }

    #[test]
    fn list_md_files_filters_by_parent_and_extension() {
        let fs = InMemoryFileSystem::new();
        fs.write_file(Path::new("/ws/a.md"), "1").unwrap();
        fs.write_file(Path::new("/ws/b.txt"), "2").unwrap();
        fs.write_file(Path::new("/ws/sub/c.md"), "3").unwrap();
        let found = fs.list_md_files(Path::new("/ws")).unwrap();
        assert_eq!(found, vec![PathBuf::from("/ws/a.md")]);
    }

    #[test]
    fn move_file_checks_source_and_destination() {
        let fs = InMemoryFileSystem::new();
        fs.write_file(Path::new("/a.md"), "x").unwrap();
        fs.move_file(Path::new("/a.md"), Path::new("/b.md")).unwrap();
        assert!(!fs.exists(Path::new("/a.md")));
        assert_eq!(fs.read_to_string(Path::new("/b.md")).unwrap(), "x");
    }

    #[test]
    fn delete_missing_file_errors() {
        let fs = InMemoryFileSystem::new();
        assert!(fs.delete_file(Path::new("/missing.md")).is_err());
    }
}
