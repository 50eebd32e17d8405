//! Bidirectional markdown-file provider for Epicenter workspaces.
//!
//! Keeps a directory of markdown files and a workspace's CRDT tables
//! continuously consistent under concurrent mutation from both sides
//! (spec.md §4.3). Built from:
//!
//! - [`serializer`] — the encoding contract between a row and a file:
//!   [`serializer::DefaultSerializer`], [`serializer::BodyFieldSerializer`],
//!   [`serializer::TitleFilenameSerializer`].
//! - [`watcher`] — a debounced, non-recursive directory watcher producing
//!   settled [`watcher::WatchEvent`]s.
//! - [`tracking`] — the per-table `rowId -> filename` map.
//! - [`diagnostics`] — the replayable snapshot of files that fail to
//!   deserialize.
//! - [`provider`] — [`provider::MarkdownProviderFactory`], wiring the above
//!   into a [`epicenter_core::provider::ProviderFactory`]: four-phase
//!   startup, sync-loop-avoidance counters, and the bulk
//!   `pull_to_markdown`/`push_from_markdown` operations exposed through
//!   [`provider::MarkdownExports`].
#![warn(missing_docs)]

/// The encoding contract between a row and a markdown file.
pub mod serializer;

/// Non-recursive, debounced directory watching.
pub mod watcher;

/// Per-table `rowId -> filename` tracking.
pub mod tracking;

/// The diagnostics set: current snapshot of files that fail to deserialize.
pub mod diagnostics;

/// The markdown provider: startup sequence, observers, bulk pull/push.
pub mod provider;

pub use diagnostics::{DiagnosticEntry, Diagnostics};
pub use provider::{MarkdownConfig, MarkdownExports, MarkdownProviderFactory, TableConfig};
pub use serializer::{BodyFieldSerializer, DefaultSerializer, EncodedFile, FilenameParts, Serializer, TitleFilenameSerializer};
pub use tracking::Tracking;
pub use watcher::{DirectoryWatcher, WatchEvent};
