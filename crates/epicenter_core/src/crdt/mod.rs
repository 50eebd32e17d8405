//! CRDT substrate: one [`Document`] per workspace, one ordered Y.Map per
//! declared table, transactions tagged with an [`Origin`].
//!
//! Persistence is pluggable through [`CrdtStorage`]; [`MemoryStorage`] is the
//! in-memory reference backend used by tests and by workspaces that don't
//! attach a persistence provider.

mod doc;
mod memory_storage;
mod storage;
mod types;

pub use doc::{Document, RowChange};
pub use memory_storage::MemoryStorage;
pub use storage::{CrdtStorage, StorageResult};
pub use types::{CrdtUpdate, Origin};
