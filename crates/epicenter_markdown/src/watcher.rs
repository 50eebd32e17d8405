//! Filesystem watcher: turns raw OS change notifications for a table's
//! directory into a debounced stream of settled file events.
//!
//! Each watched directory gets one non-recursive `notify` watch. Events are
//! funneled through a debounce stage that waits for a file to stop changing
//! for [`DEFAULT_STABILITY_WINDOW`] before reporting it, so a provider never
//! reads a file mid-write. `notify` callbacks run on its own OS thread with no
//! async context, so debouncing happens on a plain background thread and the
//! settled events are handed to async code over a `tokio` channel.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::mpsc as std_mpsc;
use std::time::{Duration, Instant};

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

/// How long a path must go unmodified before a change is reported.
///
/// Matches typical editor/OS write patterns (truncate + write + rename lands
/// within a couple hundred milliseconds); long enough to coalesce an editor's
/// several-write save, short enough that a human editing in real time doesn't
/// notice the delay.
pub const DEFAULT_STABILITY_WINDOW: Duration = Duration::from_millis(500);

/// How often the debounce thread checks for settled paths.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// A settled, debounced filesystem event for one markdown file.
#[derive(Debug, Clone, PartialEq)]
pub enum WatchEvent {
    /// The file was created or modified and has stopped changing.
    Changed(PathBuf),
    /// The file was removed.
    Removed(PathBuf),
}

/// Whether `path` should be ignored by the watcher: dotfiles, editor swap
/// files, backups, and temp files never represent a row's canonical file.
pub fn is_ignored(path: &Path) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return true;
    };
    if name.starts_with('.') {
        return true;
    }
    let lower = name.to_ascii_lowercase();
    lower.ends_with(".swp")
        || lower.ends_with(".swx")
        || lower.ends_with('~')
        || lower.ends_with(".bak")
        || lower.ends_with(".tmp")
        || lower.starts_with("~$")
}

/// A running watch over one table directory.
///
/// Dropping this stops the underlying `notify` watcher and debounce thread.
pub struct DirectoryWatcher {
    _watcher: RecommendedWatcher,
    events: mpsc::UnboundedReceiver<WatchEvent>,
}

impl DirectoryWatcher {
    /// Start watching `dir` (non-recursively) for `*.md` changes, debounced
    /// against `stability_window`.
    pub fn start(dir: &Path, stability_window: Duration) -> notify::Result<Self> {
        let (raw_tx, raw_rx) = std_mpsc::channel::<notify::Result<Event>>();
        let mut watcher = notify::recommended_watcher(move |event| {
            let _ = raw_tx.send(event);
        })?;
        watcher.watch(dir, RecursiveMode::NonRecursive)?;

        let (settled_tx, settled_rx) = mpsc::unbounded_channel();
        std::thread::Builder::new()
            .name("epicenter-markdown-watch-debounce".to_string())
            .spawn(move || debounce_loop(raw_rx, settled_tx, stability_window))
            .expect("failed to spawn watch debounce thread");

        Ok(Self {
            _watcher: watcher,
            events: settled_rx,
        })
    }

    /// Receive the next settled event. Returns `None` once the watcher has
    /// been dropped and all pending events drained.
    pub async fn recv(&mut self) -> Option<WatchEvent> {
        self.events.recv().await
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pending {
    Changed,
    Removed,
}

fn debounce_loop(
    raw_rx: std_mpsc::Receiver<notify::Result<Event>>,
    settled_tx: mpsc::UnboundedSender<WatchEvent>,
    stability_window: Duration,
) {
    let mut last_seen: HashMap<PathBuf, (Instant, Pending)> = HashMap::new();

    loop {
        match raw_rx.recv_timeout(POLL_INTERVAL) {
            Ok(Ok(event)) => {
                for path in relevant_paths(&event) {
                    let pending = match event.kind {
                        EventKind::Remove(_) => Pending::Removed,
                        _ => Pending::Changed,
                    };
                    last_seen.insert(path, (Instant::now(), pending));
                }
            }
            Ok(Err(_)) => continue,
            Err(std_mpsc::RecvTimeoutError::Timeout) => {}
            Err(std_mpsc::RecvTimeoutError::Disconnected) => break,
        }

        let now = Instant::now();
        let settled: Vec<PathBuf> = last_seen
            .iter()
            .filter(|(_, (seen_at, _))| now.duration_since(*seen_at) >= stability_window)
            .map(|(path, _)| path.clone())
            .collect();

        for path in settled {
            if let Some((_, pending)) = last_seen.remove(&path) {
                let event = match pending {
                    Pending::Changed => WatchEvent::Changed(path),
                    Pending::Removed => WatchEvent::Removed(path),
                };
                if settled_tx.send(event).is_err() {
                    return;
                }
            }
        }
    }
}

fn relevant_paths(event: &Event) -> Vec<PathBuf> {
    event
        .paths
        .iter()
        .filter(|p| p.extension().is_some_and(|ext| ext == "md"))
        .filter(|p| !is_ignored(p))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dotfiles_and_swap_files_are_ignored() {
        assert!(is_ignored(Path::new("/ws/notes/.n1.md.swp")));
        assert!(is_ignored(Path::new("/ws/notes/.DS_Store")));
        assert!(is_ignored(Path::new("/ws/notes/n1.md~")));
        assert!(is_ignored(Path::new("/ws/notes/n1.md.bak")));
        assert!(is_ignored(Path::new("/ws/notes/~$n1.md")));
    }

    #[test]
    fn ordinary_markdown_file_is_not_ignored() {
        assert!(!is_ignored(Path::new("/ws/notes/n1.md")));
    }

    #[test]
    fn relevant_paths_filters_to_markdown_only() {
        let event = Event::new(EventKind::Modify(notify::event::ModifyKind::Any))
            .add_path(PathBuf::from("/ws/notes/n1.md"))
            .add_path(PathBuf::from("/ws/notes/n1.json"))
            .add_path(PathBuf::from("/ws/notes/.n1.md.swp"));
        let paths = relevant_paths(&event);
        assert_eq!(paths, vec![PathBuf::from("/ws/notes/n1.md")]);
    }

    #[tokio::test]
    async fn watcher_reports_settled_changes() {
        let dir = tempfile::tempdir().unwrap();
        let mut watcher = DirectoryWatcher::start(dir.path(), Duration::from_millis(50)).unwrap();

        let file = dir.path().join("n1.md");
        std::fs::write(&file, "hello").unwrap();

        let event = tokio::time::timeout(Duration::from_secs(5), watcher.recv())
            .await
            .expect("timed out waiting for watch event")
            .expect("watcher channel closed");
        assert_eq!(event, WatchEvent::Changed(file));
    }
}
