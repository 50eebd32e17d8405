//! Core table/workspace runtime for Epicenter.
//!
//! Epicenter is a local-first reactive data layer: a typed table engine that
//! sits atop a CRDT document, materializes that document into external views,
//! and exposes a strongly-typed action surface. This crate holds the three
//! layers that make up the core runtime:
//!
//! - [`crdt`] — the CRDT substrate: one [`crdt::Document`] per workspace,
//!   one ordered Y.Map per declared table, transactions tagged with an
//!   [`crdt::Origin`].
//! - [`table`] — the typed CRUD/observation API over one table's container.
//! - [`workspace`] and [`provider`] — dependency resolution, provider wiring
//!   in topological order, and the exports factory that builds a client.
//! - [`action`] — the `{data}`/`{error}`-tagged query/mutation contract an
//!   exports factory uses to shape the client's own action surface.
//!
//! Persistence, sync, and the markdown-file provider are *providers*
//! attached to a workspace through [`provider::ProviderFactory`]; the one
//! exception is [`crdt::storage`]'s in-memory backend, which lives here
//! because [`crdt::Document`] needs *some* [`crdt::storage::CrdtStorage`]
//! implementation to construct against in this crate's own tests.
#![warn(missing_docs)]

/// The typed query/mutation action surface an exports factory builds.
pub mod action;

/// CRDT substrate: documents, per-table containers, transaction origins.
pub mod crdt;

/// Configuration and filesystem-layout path derivation.
pub mod config;

/// Error types shared across the core and its providers.
pub mod error;

/// Filesystem abstraction (sync and async) used by providers.
pub mod fs;

/// YAML frontmatter parsing/serialization utilities shared by providers.
pub mod frontmatter;

/// Table schema, column kinds, and the validator built from a schema.
pub mod schema;

/// The typed CRUD/observation API over one table.
pub mod table;

/// Provider factory contract: the seam providers attach to a workspace through.
pub mod provider;

/// Workspace configuration, dependency resolution, and client construction.
pub mod workspace;

pub use action::{Action, ActionKind, ActionOutcome};
pub use error::{EpicenterError, Result};
pub use schema::{ColumnKind, Row, TableSchema, WorkspaceSchema};
pub use table::{Table, Tables};
pub use workspace::{Workspace, WorkspaceClient, WorkspaceConfig};
