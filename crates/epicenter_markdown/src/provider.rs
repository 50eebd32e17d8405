//! The markdown provider: bidirectional eventual consistency between a
//! workspace's CRDT tables and a directory tree of markdown files.
//!
//! [`MarkdownProviderFactory`] implements [`ProviderFactory`]; its
//! `initialize` runs the four-phase startup (build tracking, delete orphans,
//! start observers/watcher, defer background validation) and returns a
//! [`MarkdownExports`] handle for bulk reconciliation and diagnostics.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use indexmap::IndexMap;

use epicenter_core::config::Paths;
use epicenter_core::error::{EpicenterError, Result};
use epicenter_core::fs::AsyncFileSystem;
use epicenter_core::provider::{ProviderContext, ProviderFactory, ProviderHandle};
use epicenter_core::schema::Row;
use epicenter_core::table::Table;

use crate::diagnostics::{DiagnosticEntry, Diagnostics};
use crate::serializer::Serializer;
use crate::tracking::Tracking;
use crate::watcher::{DEFAULT_STABILITY_WINDOW, DirectoryWatcher, WatchEvent};

/// One table's markdown-provider configuration.
pub struct TableConfig {
    /// The encoding contract between a row and its file.
    pub serializer: Arc<dyn Serializer>,
    /// Subdirectory override; defaults to the table name.
    pub dir: Option<String>,
}

impl TableConfig {
    /// A table config using `serializer`, with the default (table-name) directory.
    pub fn new(serializer: impl Serializer + 'static) -> Self {
        Self {
            serializer: Arc::new(serializer),
            dir: None,
        }
    }

    /// Override the subdirectory this table's files live under.
    pub fn with_dir(mut self, dir: impl Into<String>) -> Self {
        self.dir = Some(dir.into());
        self
    }
}

/// Configuration for [`MarkdownProviderFactory`].
pub struct MarkdownConfig {
    /// The filesystem this provider reads and writes through.
    pub fs: Arc<dyn AsyncFileSystem>,
    /// Override for the workspace directory; defaults to the workspace id
    /// under the project directory.
    pub workspace_dir: Option<String>,
    /// How long a file must go unmodified before the watcher reports it.
    pub stability_window: Duration,
    /// Per-table serializer and directory configuration.
    pub tables: IndexMap<String, TableConfig>,
}

impl MarkdownConfig {
    /// A markdown config over `fs`, with no tables yet declared.
    pub fn new(fs: Arc<dyn AsyncFileSystem>) -> Self {
        Self {
            fs,
            workspace_dir: None,
            stability_window: DEFAULT_STABILITY_WINDOW,
            tables: IndexMap::new(),
        }
    }

    /// Declare a table's markdown encoding.
    pub fn with_table(mut self, name: impl Into<String>, config: TableConfig) -> Self {
        self.tables.insert(name.into(), config);
        self
    }

    /// Override the workspace's own directory.
    pub fn with_workspace_dir(mut self, dir: impl Into<String>) -> Self {
        self.workspace_dir = Some(dir.into());
        self
    }
}

/// RAII guard incrementing a sync-loop-avoidance counter for its lifetime.
///
/// Counters, not booleans, because file-watcher I/O and CRDT-observer I/O
/// both overlap freely; a boolean guard would be cleared by whichever
/// operation finishes first and re-admit a feedback loop.
struct CounterGuard(Arc<AtomicUsize>);

impl CounterGuard {
    fn enter(counter: &Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter.clone())
    }
}

impl Drop for CounterGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

struct TableRuntime {
    table: Table,
    serializer: Arc<dyn Serializer>,
    dir: PathBuf,
}

/// Shared state reachable from CRDT observers, the file watcher, and the
/// exports handle. Held behind an `Arc` so every task sees the same
/// tracking map, diagnostics set, and counters.
struct MarkdownState {
    fs: Arc<dyn AsyncFileSystem>,
    tables: IndexMap<String, TableRuntime>,
    tracking: Arc<Tracking>,
    diagnostics: Arc<Diagnostics>,
    log_path: PathBuf,
    diagnostics_path: PathBuf,
    log_lock: tokio::sync::Mutex<()>,
    yjs_write_count: Arc<AtomicUsize>,
    file_change_count: Arc<AtomicUsize>,
}

impl MarkdownState {
    async fn log(&self, line: impl AsRef<str>) {
        let _guard = self.log_lock.lock().await;
        let mut content = if self.fs.exists(&self.log_path).await {
            self.fs.read_to_string(&self.log_path).await.unwrap_or_default()
        } else {
            String::new()
        };
        if !content.is_empty() && !content.ends_with('\n') {
            content.push('\n');
        }
        content.push_str(line.as_ref());
        content.push('\n');
        if let Some(parent) = self.log_path.parent() {
            let _ = self.fs.create_dir_all(parent).await;
        }
        let _ = self.fs.write_file(&self.log_path, &content).await;
    }

    async fn persist_diagnostics(&self) {
        let _ = self.diagnostics.persist(self.fs.as_ref(), &self.diagnostics_path).await;
    }
}

fn filename_of(path: &Path) -> Option<&str> {
    path.file_name().and_then(|n| n.to_str())
}

/// Write `row` to its table directory, handling a filename change (e.g. a
/// title-filename serializer reacting to a title edit) by deleting the
/// stale file first.
async fn write_row_file(state: &Arc<MarkdownState>, table_name: &str, runtime: &TableRuntime, row: &Row) -> Result<()> {
    let _guard = CounterGuard::enter(&state.yjs_write_count);

    let encoded = runtime.serializer.serialize(row)?;
    let destination = runtime.dir.join(&encoded.filename);

    if let Some(previous) = state.tracking.get(table_name, row.id())
        && previous != encoded.filename
    {
        let stale = runtime.dir.join(&previous);
        if state.fs.exists(&stale).await {
            state.fs.delete_file(&stale).await?;
        }
    }

    state.tracking.set(table_name, row.id(), encoded.filename.clone());
    state.fs.create_dir_all(&runtime.dir).await?;

    let content = epicenter_core::frontmatter::serialize(&encoded.frontmatter, &encoded.body)?;
    state.fs.write_file(&destination, &content).await?;
    state.diagnostics.clear(&destination);
    Ok(())
}

/// Delete the tracked file for `id` in `table_name`, if any.
async fn delete_row_file(state: &Arc<MarkdownState>, table_name: &str, runtime: &TableRuntime, id: &str) -> Result<()> {
    let _guard = CounterGuard::enter(&state.yjs_write_count);

    if let Some(filename) = state.tracking.remove(table_name, id) {
        let path = runtime.dir.join(&filename);
        if state.fs.exists(&path).await {
            state.fs.delete_file(&path).await?;
        }
        state.diagnostics.clear(&path);
    }
    Ok(())
}

/// Handle one settled filesystem event for `table_name`, mirroring it into
/// the CRDT under a `fileChangeCount` guard.
async fn handle_watch_event(state: Arc<MarkdownState>, table_name: String, event: WatchEvent) {
    let _guard = CounterGuard::enter(&state.file_change_count);
    let Some(runtime) = state.tables.get(&table_name) else {
        return;
    };

    match event {
        WatchEvent::Changed(path) => {
            let Some(filename) = filename_of(&path).map(str::to_string) else {
                return;
            };

            let content = match state.fs.read_to_string(&path).await {
                Ok(content) => content,
                Err(err) => {
                    state.diagnostics.record(DiagnosticEntry {
                        absolute_path: path.clone(),
                        table: table_name.clone(),
                        filename,
                        error: format!("read failed: {err}"),
                    });
                    state.log(format!("[{table_name}] read failed for '{}': {err}", path.display())).await;
                    return;
                }
            };

            let parsed = match epicenter_core::frontmatter::parse_or_empty(&content) {
                Ok(parsed) => parsed,
                Err(err) => {
                    state.diagnostics.record(DiagnosticEntry {
                        absolute_path: path.clone(),
                        table: table_name.clone(),
                        filename,
                        error: format!("parse failed: {err}"),
                    });
                    state.log(format!("[{table_name}] parse failed for '{}': {err}", path.display())).await;
                    return;
                }
            };

            let Some(parts) = runtime.serializer.parse_filename(&filename) else {
                state.diagnostics.record(DiagnosticEntry {
                    absolute_path: path.clone(),
                    table: table_name.clone(),
                    filename,
                    error: "filename is not identifiable".to_string(),
                });
                return;
            };

            let value = match runtime.serializer.deserialize(&parts, &parsed) {
                Ok(value) => value,
                Err(err) => {
                    state.diagnostics.record(DiagnosticEntry {
                        absolute_path: path.clone(),
                        table: table_name.clone(),
                        filename,
                        error: format!("deserialize failed: {err}"),
                    });
                    state.log(format!("[{table_name}] deserialize failed for '{}': {err}", path.display())).await;
                    return;
                }
            };

            if let Some(tracked) = state.tracking.get(&table_name, &parts.id)
                && tracked != filename
            {
                let _ = state.fs.delete_file(&path).await;
                state.log(format!(
                    "[{table_name}] duplicate file for row '{}': kept '{tracked}', deleted '{filename}'",
                    parts.id
                ))
                .await;
                return;
            }

            match runtime.table.upsert(value) {
                Ok(row) => {
                    state.tracking.set(&table_name, row.id(), filename);
                    state.diagnostics.clear(&path);
                }
                Err(err) => {
                    state.diagnostics.record(DiagnosticEntry {
                        absolute_path: path.clone(),
                        table: table_name.clone(),
                        filename,
                        error: format!("validation failed: {err}"),
                    });
                    state.log(format!("[{table_name}] validation failed for '{}': {err}", path.display())).await;
                }
            }
        }
        WatchEvent::Removed(path) => {
            let Some(filename) = filename_of(&path) else {
                state.log(format!("[{table_name}] removed file with unreadable name: '{}'", path.display())).await;
                return;
            };

            match runtime.serializer.parse_filename(filename) {
                Some(parts) => {
                    let _ = runtime.table.delete(&parts.id);
                    state.tracking.remove(&table_name, &parts.id);
                    state.diagnostics.clear(&path);
                }
                None => {
                    state.log(format!("[{table_name}] deleted file is not identifiable: '{}'", path.display())).await;
                }
            }
        }
    }
}

/// Re-read and deserialize every file in every table directory, populating
/// the diagnostics set with any failures. Does not touch the CRDT.
async fn scan_for_errors_inner(state: &Arc<MarkdownState>) -> Result<()> {
    let mut entries = Vec::new();

    for (table_name, runtime) in &state.tables {
        let files = state.fs.list_md_files(&runtime.dir).await?;
        for path in files {
            let Some(filename) = filename_of(&path).map(str::to_string) else {
                continue;
            };
            if crate::watcher::is_ignored(&path) {
                continue;
            }

            let error = match state.fs.read_to_string(&path).await {
                Err(err) => Some(format!("read failed: {err}")),
                Ok(content) => match epicenter_core::frontmatter::parse_or_empty(&content) {
                    Err(err) => Some(format!("parse failed: {err}")),
                    Ok(parsed) => match runtime.serializer.parse_filename(&filename) {
                        None => Some("filename is not identifiable".to_string()),
                        Some(parts) => match runtime.serializer.deserialize(&parts, &parsed) {
                            Err(err) => Some(format!("deserialize failed: {err}")),
                            Ok(value) => match epicenter_core::schema::extract_id(&value) {
                                Some(_) => None,
                                None => Some("deserialized row has no id".to_string()),
                            },
                        },
                    },
                },
            };

            if let Some(error) = error {
                entries.push(DiagnosticEntry {
                    absolute_path: path,
                    table: table_name.clone(),
                    filename,
                    error,
                });
            }
        }
    }

    state.diagnostics.replace_all(entries);
    state.persist_diagnostics().await;
    Ok(())
}

/// CRDT → files, diff-based. Writes only rows that are missing, renamed, or
/// whose content differs; deletes files with no corresponding CRDT row.
async fn pull_to_markdown_inner(state: &Arc<MarkdownState>) -> Result<()> {
    let _guard = CounterGuard::enter(&state.yjs_write_count);

    for (table_name, runtime) in &state.tables {
        let on_disk = state.fs.list_md_files(&runtime.dir).await?;
        let mut by_id: IndexMap<String, PathBuf> = IndexMap::new();
        for path in &on_disk {
            if let Some(filename) = filename_of(path)
                && let Some(parts) = runtime.serializer.parse_filename(filename)
            {
                by_id.insert(parts.id, path.clone());
            }
        }

        let rows = runtime.table.get_all_valid();
        let row_ids: HashSet<String> = rows.iter().map(|r| r.id().to_string()).collect();

        for (id, path) in &by_id {
            if !row_ids.contains(id) {
                state.fs.delete_file(path).await?;
                state.tracking.remove(table_name, id);
            }
        }

        for row in &rows {
            let encoded = runtime.serializer.serialize(row)?;
            let destination = runtime.dir.join(&encoded.filename);
            let existing_path = by_id.get(row.id());

            let unchanged = match existing_path {
                Some(path) if path == &destination => {
                    let existing = state.fs.read_to_string(path).await.ok();
                    let new_content = epicenter_core::frontmatter::serialize(&encoded.frontmatter, &encoded.body)?;
                    existing.as_deref() == Some(new_content.as_str())
                }
                _ => false,
            };

            if unchanged {
                state.tracking.set(table_name, row.id(), encoded.filename.clone());
                continue;
            }

            if let Some(path) = existing_path
                && path != &destination
            {
                state.fs.delete_file(path).await?;
            }

            state.fs.create_dir_all(&runtime.dir).await?;
            let content = epicenter_core::frontmatter::serialize(&encoded.frontmatter, &encoded.body)?;
            state.fs.write_file(&destination, &content).await?;
            state.tracking.set(table_name, row.id(), encoded.filename.clone());
        }
    }

    Ok(())
}

/// Files → CRDT, diff-based. A file whose read or parse fails is skipped
/// entirely and never authorizes deleting the corresponding CRDT row.
async fn push_from_markdown_inner(state: &Arc<MarkdownState>) -> Result<()> {
    let _guard = CounterGuard::enter(&state.file_change_count);
    let mut entries = Vec::new();

    for (table_name, runtime) in &state.tables {
        let files = state.fs.list_md_files(&runtime.dir).await?;
        let mut seen_ids: HashSet<String> = HashSet::new();

        for path in files {
            let Some(filename) = filename_of(&path).map(str::to_string) else {
                continue;
            };
            if crate::watcher::is_ignored(&path) {
                continue;
            }

            let Some(parts) = runtime.serializer.parse_filename(&filename) else {
                entries.push(DiagnosticEntry {
                    absolute_path: path,
                    table: table_name.clone(),
                    filename,
                    error: "filename is not identifiable".to_string(),
                });
                continue;
            };

            let content = match state.fs.read_to_string(&path).await {
                Ok(content) => content,
                Err(err) => {
                    entries.push(DiagnosticEntry {
                        absolute_path: path,
                        table: table_name.clone(),
                        filename,
                        error: format!("read failed: {err}"),
                    });
                    continue;
                }
            };

            let parsed = match epicenter_core::frontmatter::parse_or_empty(&content) {
                Ok(parsed) => parsed,
                Err(err) => {
                    entries.push(DiagnosticEntry {
                        absolute_path: path,
                        table: table_name.clone(),
                        filename,
                        error: format!("parse failed: {err}"),
                    });
                    continue;
                }
            };

            let value = match runtime.serializer.deserialize(&parts, &parsed) {
                Ok(value) => value,
                Err(err) => {
                    entries.push(DiagnosticEntry {
                        absolute_path: path,
                        table: table_name.clone(),
                        filename,
                        error: format!("deserialize failed: {err}"),
                    });
                    continue;
                }
            };

            seen_ids.insert(parts.id.clone());
            if let Err(err) = runtime.table.upsert(value) {
                entries.push(DiagnosticEntry {
                    absolute_path: path,
                    table: table_name.clone(),
                    filename,
                    error: format!("validation failed: {err}"),
                });
                continue;
            }
            state.tracking.set(table_name, &parts.id, filename);
        }

        for row in runtime.table.get_all_valid() {
            if !seen_ids.contains(row.id()) {
                runtime.table.delete(row.id())?;
                state.tracking.remove(table_name, row.id());
            }
        }
    }

    state.diagnostics.replace_all(entries);
    state.persist_diagnostics().await;
    Ok(())
}

/// Exports handed to workspace callers: bulk reconciliation and the
/// diagnostics snapshot.
pub struct MarkdownExports {
    state: Arc<MarkdownState>,
}

impl MarkdownExports {
    /// Every currently-broken file.
    pub fn diagnostics(&self) -> Vec<DiagnosticEntry> {
        self.state.diagnostics.snapshot()
    }

    /// Overwrite files to match the CRDT (diff-based; unchanged files are left alone).
    pub async fn pull_to_markdown(&self) -> Result<()> {
        pull_to_markdown_inner(&self.state).await
    }

    /// Overwrite the CRDT to match files on disk (diff-based).
    pub async fn push_from_markdown(&self) -> Result<()> {
        push_from_markdown_inner(&self.state).await
    }

    /// Re-validate every file on disk without touching the CRDT, refreshing diagnostics.
    pub async fn scan_for_errors(&self) -> Result<()> {
        scan_for_errors_inner(&self.state).await
    }
}

/// Implements the markdown provider's four-phase startup against a workspace.
pub struct MarkdownProviderFactory {
    config: MarkdownConfig,
}

impl MarkdownProviderFactory {
    /// Wrap a configuration as a provider factory.
    pub fn new(config: MarkdownConfig) -> Self {
        Self { config }
    }
}

#[async_trait::async_trait]
impl ProviderFactory for MarkdownProviderFactory {
    async fn initialize(&self, context: ProviderContext) -> Result<ProviderHandle> {
        let paths = context.paths.clone().ok_or_else(|| EpicenterError::Provider {
            provider_id: context.provider_id.clone(),
            message: "the markdown provider requires a filesystem-backed workspace".to_string(),
        })?;

        let workspace_dir = paths.workspace_dir(&context.id, self.config.workspace_dir.as_deref());
        let fs = self.config.fs.clone();

        let mut tables = IndexMap::new();
        for (name, table_config) in &self.config.tables {
            let table = context.tables.get(name).cloned().ok_or_else(|| EpicenterError::Provider {
                provider_id: context.provider_id.clone(),
                message: format!("table '{name}' is configured for markdown but not declared on the workspace"),
            })?;
            let dir = Paths::table_dir(&workspace_dir, name, table_config.dir.as_deref());
            fs.create_dir_all(&dir).await?;
            tables.insert(
                name.clone(),
                TableRuntime {
                    table,
                    serializer: table_config.serializer.clone(),
                    dir,
                },
            );
        }

        let state = Arc::new(MarkdownState {
            fs: fs.clone(),
            tables,
            tracking: Arc::new(Tracking::new()),
            diagnostics: Arc::new(Diagnostics::new()),
            log_path: paths.log_path(&context.provider_id),
            diagnostics_path: paths.diagnostics_path(&context.provider_id),
            log_lock: tokio::sync::Mutex::new(()),
            yjs_write_count: Arc::new(AtomicUsize::new(0)),
            file_change_count: Arc::new(AtomicUsize::new(0)),
        });

        // Phase 1: build tracking from the CRDT.
        for (table_name, runtime) in &state.tables {
            for row in runtime.table.get_all_valid() {
                let encoded = runtime.serializer.serialize(&row)?;
                state.tracking.set(table_name, row.id(), encoded.filename);
            }
        }

        // Phase 2: delete orphan files.
        for (table_name, runtime) in &state.tables {
            let files = state.fs.list_md_files(&runtime.dir).await?;
            for path in files {
                if crate::watcher::is_ignored(&path) {
                    continue;
                }
                let Some(filename) = filename_of(&path) else {
                    continue;
                };
                let is_orphan = match runtime.serializer.parse_filename(filename) {
                    None => true,
                    Some(parts) => !runtime.table.has(&parts.id),
                };
                if is_orphan {
                    state.fs.delete_file(&path).await?;
                    state.log(format!("[{table_name}] deleted orphan file '{}'", path.display())).await;
                }
            }
        }

        // Phase 3: start observers and the file watcher. The provider is ready.
        let mut subscriptions = Vec::new();
        for (table_name, runtime) in &state.tables {
            let state = state.clone();
            let table_name = table_name.clone();
            let subscription = runtime.table.observe(move |events| {
                if state.file_change_count.load(Ordering::SeqCst) > 0 {
                    return;
                }
                for event in events {
                    let Some(outcome) = &event.new else {
                        let state = state.clone();
                        let table_name = table_name.clone();
                        let id = event.id.clone();
                        tokio::spawn(async move {
                            if let Some(runtime) = state.tables.get(&table_name) {
                                let _ = delete_row_file(&state, &table_name, runtime, &id).await;
                            }
                        });
                        continue;
                    };
                    match outcome {
                        epicenter_core::table::RowOutcome::Valid(row) => {
                            let state = state.clone();
                            let table_name = table_name.clone();
                            let row = row.clone();
                            tokio::spawn(async move {
                                if let Some(runtime) = state.tables.get(&table_name) {
                                    if let Err(err) = write_row_file(&state, &table_name, runtime, &row).await {
                                        state.log(format!("[{table_name}] write failed for row '{}': {err}", row.id())).await;
                                    }
                                }
                            });
                        }
                        epicenter_core::table::RowOutcome::Invalid(issues) => {
                            let state = state.clone();
                            let table_name = table_name.clone();
                            let issues = issues.clone();
                            tokio::spawn(async move {
                                state.log(format!("[{table_name}] observed invalid row: {issues}")).await;
                            });
                        }
                    }
                }
            });
            subscriptions.push(subscription);
        }

        let mut watch_handles = Vec::new();
        for (table_name, runtime) in &state.tables {
            let mut watcher = DirectoryWatcher::start(&runtime.dir, self.config.stability_window)
                .map_err(|err| EpicenterError::Provider {
                    provider_id: context.provider_id.clone(),
                    message: format!("failed to watch '{}': {err}", runtime.dir.display()),
                })?;
            let state = state.clone();
            let table_name = table_name.clone();
            let handle = tokio::spawn(async move {
                while let Some(event) = watcher.recv().await {
                    if state.yjs_write_count.load(Ordering::SeqCst) > 0 {
                        continue;
                    }
                    handle_watch_event(state.clone(), table_name.clone(), event).await;
                }
            });
            watch_handles.push(handle);
        }

        // Phase 4: background validation, deferred so startup latency doesn't depend on it.
        let validation_state = state.clone();
        tokio::spawn(async move {
            let _ = scan_for_errors_inner(&validation_state).await;
        });

        let exports = MarkdownExports { state: state.clone() };

        // Cleanup is one-shot: `destroy` must be safe to call more than once,
        // so the subscriptions and watch tasks live behind a `Mutex<Option<_>>`
        // that the first call drains and every later call finds empty.
        let cleanup: Arc<std::sync::Mutex<Option<(Vec<yrs::Subscription>, Vec<tokio::task::JoinHandle<()>>)>>> =
            Arc::new(std::sync::Mutex::new(Some((subscriptions, watch_handles))));

        let handle = ProviderHandle::new(exports).with_destroy(move || {
            let cleanup = cleanup.clone();
            Box::pin(async move {
                if let Some((subscriptions, watch_handles)) = cleanup.lock().unwrap().take() {
                    for task in watch_handles {
                        task.abort();
                    }
                    drop(subscriptions);
                }
            })
        });

        Ok(handle)
    }
}
