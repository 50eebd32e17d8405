//! The seam providers attach to a workspace through.
//!
//! A provider is anything that reads the [`Tables`] facade and/or the raw
//! [`Document`], optionally subscribes to its changes, and optionally returns
//! an export reachable from the workspace's exports factory (spec.md §4.2,
//! §9 "Polymorphism over capabilities"). Persistence, sync, and the markdown
//! provider are all providers; none of them live in this crate.
//!
//! A provider factory is any `async fn(ProviderContext) -> Result<ProviderHandle>`
//! — the blanket impl below lets a plain async closure stand in for
//! [`ProviderFactory`] without an explicit `impl` block, matching spec.md §6's
//! `(context) => exports | Promise<exports>` shape.

use std::any::Any;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::config::Paths;
use crate::crdt::Document;
use crate::error::Result;
use crate::schema::WorkspaceSchema;
use crate::table::Tables;

/// A boxed, `Send` future, used wherever a provider hands back async work
/// that must be driven after its own initialization returns (e.g. `destroy`,
/// browser-style `whenSynced`).
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Everything a provider factory receives when it's invoked (spec.md §6).
pub struct ProviderContext {
    /// The workspace id this provider is attached to.
    pub id: String,
    /// The key this provider was registered under in the workspace config.
    pub provider_id: String,
    /// The workspace's CRDT document.
    pub document: Arc<Document>,
    /// The workspace's full schema, one [`crate::schema::TableSchema`] per table.
    pub schema: Arc<WorkspaceSchema>,
    /// The typed table facade over `document`.
    pub tables: Tables,
    /// Filesystem-layout paths, present under a filesystem-backed workspace
    /// runtime and absent under a browser-style one (spec.md §4.2).
    pub paths: Option<Paths>,
}

/// What a provider factory hands back once it has finished initializing.
///
/// `exports` is type-erased because different providers export different
/// shapes; callers recover the concrete type with [`ProviderHandle::exports_as`].
/// `destroy` must be idempotent — the workspace runtime may call it exactly
/// once during teardown, but nothing prevents a provider from being defensive
/// about being called twice.
pub struct ProviderHandle {
    exports: Box<dyn Any + Send + Sync>,
    destroy: Option<Arc<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>>,
    when_synced: Option<Arc<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>>,
}

impl ProviderHandle {
    /// Build a handle around a provider's exports, with no `destroy` or
    /// `whenSynced` hook.
    pub fn new(exports: impl Any + Send + Sync + 'static) -> Self {
        Self {
            exports: Box::new(exports),
            destroy: None,
            when_synced: None,
        }
    }

    /// Attach a `destroy` hook, called during workspace teardown.
    pub fn with_destroy(
        mut self,
        destroy: impl Fn() -> BoxFuture<'static, ()> + Send + Sync + 'static,
    ) -> Self {
        self.destroy = Some(Arc::new(destroy));
        self
    }

    /// Attach a `whenSynced` hook: a promise that resolves once this
    /// provider's initial asynchronous hydration has completed (spec.md §4.2,
    /// "Browser vs. Node split").
    pub fn with_when_synced(
        mut self,
        when_synced: impl Fn() -> BoxFuture<'static, ()> + Send + Sync + 'static,
    ) -> Self {
        self.when_synced = Some(Arc::new(when_synced));
        self
    }

    /// Downcast this provider's exports to a concrete type.
    pub fn exports_as<T: Any>(&self) -> Option<&T> {
        self.exports.downcast_ref::<T>()
    }

    /// Run this provider's `destroy` hook, if any.
    pub(crate) async fn destroy(&self) {
        if let Some(destroy) = &self.destroy {
            destroy().await;
        }
    }

    /// Resolve this provider's `whenSynced` hook, if any.
    pub(crate) async fn when_synced(&self) {
        if let Some(when_synced) = &self.when_synced {
            when_synced().await;
        }
    }
}

/// A provider attaches to a workspace by implementing this trait (or, more
/// commonly, by being a plain async closure — see the blanket impl below).
#[async_trait::async_trait]
pub trait ProviderFactory: Send + Sync {
    /// Initialize this provider against a freshly created workspace, and
    /// return its exports. A `Err` here is fatal: it is wrapped in
    /// [`crate::error::EpicenterError::Provider`] and fails workspace
    /// construction (spec.md §7 — provider factory failures are one of the
    /// few provider-side errors that ARE fatal, since a provider that never
    /// came up can't be trusted to run in the background either).
    async fn initialize(&self, context: ProviderContext) -> Result<ProviderHandle>;
}

#[async_trait::async_trait]
impl<F, Fut> ProviderFactory for F
where
    F: Fn(ProviderContext) -> Fut + Send + Sync,
    Fut: Future<Output = Result<ProviderHandle>> + Send,
{
    async fn initialize(&self, context: ProviderContext) -> Result<ProviderHandle> {
        self(context).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crdt::MemoryStorage;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn context() -> ProviderContext {
        let storage = Arc::new(MemoryStorage::new());
        let document = Arc::new(Document::new("ws1", Vec::<String>::new(), storage));
        ProviderContext {
            id: "ws1".to_string(),
            provider_id: "test".to_string(),
            document,
            schema: Arc::new(WorkspaceSchema::new()),
            tables: Tables::new(indexmap::IndexMap::new()),
            paths: None,
        }
    }

    #[test]
    fn exports_round_trip_through_downcast() {
        let handle = ProviderHandle::new(42_u32);
        assert_eq!(handle.exports_as::<u32>(), Some(&42));
        assert_eq!(handle.exports_as::<String>(), None);
    }

    #[test]
    fn closure_factory_satisfies_the_trait() {
        let factory = |ctx: ProviderContext| async move { Ok(ProviderHandle::new(ctx.provider_id)) };

        let handle = futures_lite::future::block_on(ProviderFactory::initialize(&factory, context())).unwrap();
        assert_eq!(handle.exports_as::<String>(), Some(&"test".to_string()));
    }

    #[test]
    fn destroy_hook_runs_and_is_idempotent() {
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = calls.clone();
        let handle = ProviderHandle::new(()).with_destroy(move || {
            let calls = calls_clone.clone();
            Box::pin(async move {
                calls.fetch_add(1, Ordering::SeqCst);
            })
        });

        futures_lite::future::block_on(async {
            handle.destroy().await;
            handle.destroy().await;
        });

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
