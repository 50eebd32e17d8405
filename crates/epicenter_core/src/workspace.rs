//! Workspace configuration, dependency resolution, and client construction
//! (spec.md §4.2).
//!
//! [`Workspace::init`] takes every workspace config a client declares,
//! resolves their dependency graph with Kahn's algorithm, and brings up one
//! [`Document`], one [`Tables`] facade, and every declared provider per
//! workspace, in topological order, so that a workspace's exports factory
//! always sees its dependencies' exports already built (spec.md §8,
//! "Dependency topology").

use std::any::Any;
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use indexmap::IndexMap;

use crate::config::Paths;
use crate::crdt::{Document, MemoryStorage};
use crate::error::{EpicenterError, Result};
use crate::provider::{ProviderContext, ProviderFactory, ProviderHandle};
use crate::schema::{Validators, WorkspaceSchema};
use crate::table::{Table, Tables};

/// One workspace's static configuration: schema, declared dependencies,
/// provider factories, and the exports factory (spec.md §3, §6).
pub struct WorkspaceConfig {
    /// Non-empty, unique-within-the-root-array workspace id. Also the
    /// document GUID and, by default, the workspace's directory name.
    pub id: String,
    /// Ids of workspaces this one depends on. Per spec.md §4.2's flat/hoisted
    /// model, every transitive dependency must *also* appear as its own
    /// top-level entry in the array passed to [`Workspace::init`].
    pub dependencies: Vec<String>,
    /// Table name -> table schema.
    pub schema: WorkspaceSchema,
    /// Provider key -> factory, invoked in this declaration order.
    pub providers: IndexMap<String, Arc<dyn ProviderFactory>>,
    /// Builds this workspace's action surface once its tables, validators,
    /// providers, and already-initialized dependency clients are ready.
    pub exports: Arc<dyn ExportsFactory>,
}

/// What an [`ExportsFactory`] receives when it's invoked.
pub struct ExportsContext {
    /// This workspace's typed table facade.
    pub tables: Tables,
    /// This workspace's schema.
    pub schema: Arc<WorkspaceSchema>,
    /// Per-table validators compiled from `schema`.
    pub validators: Validators,
    /// This workspace's own providers, keyed by the provider key they were
    /// registered under.
    pub providers: ProviderExports,
    /// Clients of every workspace this one declares as a dependency, keyed
    /// by workspace id. Already fully initialized — exports, providers, and
    /// all.
    pub workspaces: WorkspaceClients,
}

/// Builds a workspace's exports — the record of actions and utilities
/// returned to callers — from its fully-initialized context.
///
/// Like [`ProviderFactory`], this is usually a plain closure; the blanket
/// impl below means `Arc::new(|ctx| Ok(Box::new(MyExports::new(ctx))))`
/// satisfies the trait without an explicit `impl` block.
pub trait ExportsFactory: Send + Sync {
    /// Build this workspace's exports.
    fn build(&self, context: ExportsContext) -> Result<Box<dyn Any + Send + Sync>>;
}

impl<F> ExportsFactory for F
where
    F: Fn(ExportsContext) -> Result<Box<dyn Any + Send + Sync>> + Send + Sync,
{
    fn build(&self, context: ExportsContext) -> Result<Box<dyn Any + Send + Sync>> {
        self(context)
    }
}

/// A workspace's providers, keyed by provider key, exposed to the exports
/// factory and to dependents through [`WorkspaceClient::providers`].
#[derive(Clone)]
pub struct ProviderExports(Arc<IndexMap<String, Arc<ProviderHandle>>>);

impl ProviderExports {
    fn new(handles: IndexMap<String, Arc<ProviderHandle>>) -> Self {
        Self(Arc::new(handles))
    }

    /// The handle registered under `provider_key`, if any.
    pub fn get(&self, provider_key: &str) -> Option<&ProviderHandle> {
        self.0.get(provider_key).map(Arc::as_ref)
    }

    /// Downcast the exports of the provider registered under `provider_key`.
    pub fn exports_as<T: Any>(&self, provider_key: &str) -> Option<&T> {
        self.get(provider_key)?.exports_as::<T>()
    }
}

/// A fully-initialized workspace: its document, tables, validators,
/// providers, and the exports its factory built — plus teardown.
pub struct WorkspaceClient {
    id: String,
    document: Arc<Document>,
    tables: Tables,
    validators: Validators,
    providers: ProviderExports,
    exports: Box<dyn Any + Send + Sync>,
}

impl WorkspaceClient {
    /// This workspace's id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// This workspace's CRDT document.
    pub fn document(&self) -> &Arc<Document> {
        &self.document
    }

    /// This workspace's typed table facade.
    pub fn tables(&self) -> &Tables {
        &self.tables
    }

    /// Per-table validators compiled from this workspace's schema.
    pub fn validators(&self) -> &Validators {
        &self.validators
    }

    /// This workspace's providers, keyed by provider key.
    pub fn providers(&self) -> &ProviderExports {
        &self.providers
    }

    /// Downcast this workspace's exports to the concrete type its exports
    /// factory produced.
    pub fn exports_as<T: Any>(&self) -> Option<&T> {
        self.exports.downcast_ref::<T>()
    }

    /// Resolve once every provider that exposes a `whenSynced` hook has
    /// resolved theirs (spec.md §4.2). Every provider factory is already
    /// awaited to completion during [`Workspace::init`], so this only
    /// matters for providers whose hydration continues in the background
    /// past their own `initialize` returning.
    pub async fn when_synced(&self) {
        for handle in self.providers.0.values() {
            handle.when_synced().await;
        }
    }

    /// Tear down every provider in parallel and then the document itself
    /// (spec.md §4.2). Idempotent: calling this more than once just re-runs
    /// each provider's own idempotent `destroy`.
    pub async fn destroy(&self) {
        let mut combined: std::pin::Pin<Box<dyn std::future::Future<Output = ()> + Send + '_>> = Box::pin(async {});
        for handle in self.providers.0.values() {
            let next = handle.destroy();
            combined = Box::pin(async move {
                futures_lite::future::zip(combined, next).await;
            });
        }
        combined.await;
        log::debug!("destroying document '{}'", self.id);
    }
}

/// Every initialized workspace client, keyed by workspace id.
#[derive(Clone)]
pub struct WorkspaceClients(Arc<IndexMap<String, Arc<WorkspaceClient>>>);

impl WorkspaceClients {
    /// The client for `workspace_id`, if it was initialized.
    pub fn get(&self, workspace_id: &str) -> Option<&Arc<WorkspaceClient>> {
        self.0.get(workspace_id)
    }

    /// Every workspace id, in the order they were initialized (topological
    /// order: dependencies before dependents).
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }
}

/// Resolves a set of workspace configs into running clients (spec.md §4.2).
pub struct Workspace;

impl Workspace {
    /// Resolve dependencies, then initialize every workspace in topological
    /// order. `project_dir` is `Some` for a filesystem-backed runtime and
    /// `None` for a browser-style one; it's threaded through to every
    /// provider factory as `context.paths` (spec.md §4.2, "Browser vs. Node split").
    pub async fn init(
        configs: Vec<WorkspaceConfig>,
        project_dir: Option<std::path::PathBuf>,
    ) -> Result<WorkspaceClients> {
        let order = Self::resolve_order(&configs)?;

        let mut by_id: IndexMap<String, WorkspaceConfig> =
            configs.into_iter().map(|c| (c.id.clone(), c)).collect();

        let mut clients: IndexMap<String, Arc<WorkspaceClient>> = IndexMap::new();

        for id in order {
            let config = by_id.shift_remove(&id).expect("resolve_order only yields known ids");
            let client = Self::init_one(config, &clients, project_dir.as_deref()).await?;
            clients.insert(id, Arc::new(client));
        }

        Ok(WorkspaceClients(Arc::new(clients)))
    }

    async fn init_one(
        config: WorkspaceConfig,
        already_built: &IndexMap<String, Arc<WorkspaceClient>>,
        project_dir: Option<&std::path::Path>,
    ) -> Result<WorkspaceClient> {
        let schema = Arc::new(config.schema);
        let storage = Arc::new(MemoryStorage::new());
        let document = Arc::new(Document::new(config.id.clone(), schema.keys().cloned(), storage));

        let tables: IndexMap<String, Table> = schema
            .iter()
            .map(|(name, table_schema)| {
                let table = Table::new(name.clone(), document.clone(), Arc::new(table_schema.clone()));
                (name.clone(), table)
            })
            .collect();
        let tables = Tables::new(tables);
        let validators = Validators::new(&schema);

        let mut provider_handles: IndexMap<String, Arc<ProviderHandle>> = IndexMap::new();
        for (provider_id, factory) in &config.providers {
            let paths = project_dir.map(|project| Paths::new(project, &config.id, provider_id));
            let context = ProviderContext {
                id: config.id.clone(),
                provider_id: provider_id.clone(),
                document: document.clone(),
                schema: schema.clone(),
                tables: tables.clone(),
                paths,
            };
            let handle = factory.initialize(context).await.map_err(|source| {
                EpicenterError::Provider {
                    provider_id: provider_id.clone(),
                    message: source.to_string(),
                }
            })?;
            provider_handles.insert(provider_id.clone(), Arc::new(handle));
        }
        let providers = ProviderExports::new(provider_handles);

        let dependency_clients: IndexMap<String, Arc<WorkspaceClient>> = config
            .dependencies
            .iter()
            .filter_map(|dep_id| already_built.get(dep_id).map(|c| (dep_id.clone(), c.clone())))
            .collect();
        let workspaces = WorkspaceClients(Arc::new(dependency_clients));

        let exports = config.exports.build(ExportsContext {
            tables: tables.clone(),
            schema: schema.clone(),
            validators: validators.clone(),
            providers: providers.clone(),
            workspaces,
        })?;

        Ok(WorkspaceClient {
            id: config.id,
            document,
            tables,
            validators,
            providers,
            exports,
        })
    }

    /// Validate the dependency graph and return workspace ids in topological
    /// order (dependencies before dependents), via Kahn's algorithm.
    fn resolve_order(configs: &[WorkspaceConfig]) -> Result<Vec<String>> {
        let mut seen = HashSet::new();
        for config in configs {
            if !seen.insert(config.id.as_str()) {
                return Err(EpicenterError::Dependency("Duplicate workspace IDs detected".to_string()));
            }
        }

        let ids: HashSet<&str> = configs.iter().map(|c| c.id.as_str()).collect();
        for config in configs {
            for dep in &config.dependencies {
                if !ids.contains(dep.as_str()) {
                    return Err(EpicenterError::Dependency(format!(
                        "Missing dependency: workspace \"{}\" depends on \"{}\", but \"{}\" was not declared",
                        config.id, dep, dep
                    )));
                }
            }
        }

        // Kahn's algorithm. `remaining[id]` = number of not-yet-resolved
        // dependencies; a workspace becomes ready once it hits zero.
        let mut remaining: IndexMap<&str, usize> = configs
            .iter()
            .map(|c| (c.id.as_str(), c.dependencies.len()))
            .collect();
        let mut dependents: IndexMap<&str, Vec<&str>> = IndexMap::new();
        for config in configs {
            for dep in &config.dependencies {
                dependents.entry(dep.as_str()).or_default().push(config.id.as_str());
            }
        }

        let mut queue: VecDeque<&str> = configs
            .iter()
            .filter(|c| c.dependencies.is_empty())
            .map(|c| c.id.as_str())
            .collect();

        let mut order = Vec::with_capacity(configs.len());
        while let Some(id) = queue.pop_front() {
            order.push(id.to_string());
            if let Some(deps) = dependents.get(id) {
                for &dependent in deps {
                    let count = remaining.get_mut(dependent).expect("dependent is a declared workspace");
                    *count -= 1;
                    if *count == 0 {
                        queue.push_back(dependent);
                    }
                }
            }
        }

        if order.len() != configs.len() {
            let stuck: Vec<&str> = remaining
                .iter()
                .filter(|(id, count)| **count > 0 && !order.contains(&id.to_string()))
                .map(|(id, _)| *id)
                .collect();
            return Err(EpicenterError::Dependency(format!(
                "Circular dependency detected: {}",
                stuck.join(", ")
            )));
        }

        Ok(order)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Column, ColumnKind, TableSchema};
    use serde_json::json;

    fn notes_schema() -> WorkspaceSchema {
        let mut table = TableSchema::new();
        table.insert("id".to_string(), Column::new(ColumnKind::Id));
        table.insert("content".to_string(), Column::new(ColumnKind::Text));
        let mut schema = WorkspaceSchema::new();
        schema.insert("notes".to_string(), table);
        schema
    }

    fn passthrough_exports() -> Arc<dyn ExportsFactory> {
        Arc::new(|ctx: ExportsContext| -> Result<Box<dyn Any + Send + Sync>> { Ok(Box::new(ctx.tables)) })
    }

    fn config(id: &str, dependencies: Vec<&str>) -> WorkspaceConfig {
        WorkspaceConfig {
            id: id.to_string(),
            dependencies: dependencies.into_iter().map(String::from).collect(),
            schema: notes_schema(),
            providers: IndexMap::new(),
            exports: passthrough_exports(),
        }
    }

    #[test]
    fn single_workspace_initializes_and_exposes_tables() {
        let clients = futures_lite::future::block_on(Workspace::init(vec![config("ws1", vec![])], None)).unwrap();
        let client = clients.get("ws1").unwrap();
        let tables = client.exports_as::<Tables>().unwrap();
        tables.get("notes").unwrap().upsert(json!({"id": "n1", "content": "hi"})).unwrap();
        assert_eq!(client.tables().get("notes").unwrap().count(), 1);
    }

    #[test]
    fn dependent_sees_dependency_client_already_built() {
        let exports = Arc::new(|ctx: ExportsContext| -> Result<Box<dyn Any + Send + Sync>> {
            let saw_dependency = ctx.workspaces.get("base").is_some();
            Ok(Box::new(saw_dependency))
        });
        let dependent = WorkspaceConfig {
            id: "dependent".to_string(),
            dependencies: vec!["base".to_string()],
            schema: notes_schema(),
            providers: IndexMap::new(),
            exports,
        };

        let clients =
            futures_lite::future::block_on(Workspace::init(vec![dependent, config("base", vec![])], None)).unwrap();

        let dependent_client = clients.get("dependent").unwrap();
        assert_eq!(dependent_client.exports_as::<bool>(), Some(&true));
    }

    #[test]
    fn missing_dependency_is_rejected() {
        let err = Workspace::resolve_order(&[config("b", vec!["a"])]).unwrap_err();
        assert!(matches!(err, EpicenterError::Dependency(msg) if msg.contains("Missing dependency")));
    }

    #[test]
    fn duplicate_workspace_ids_are_rejected() {
        let err = Workspace::resolve_order(&[config("a", vec![]), config("a", vec![])]).unwrap_err();
        assert!(matches!(err, EpicenterError::Dependency(msg) if msg.contains("Duplicate workspace IDs")));
    }

    #[test]
    fn circular_dependency_is_rejected() {
        let err = Workspace::resolve_order(&[config("a", vec!["b"]), config("b", vec!["a"])]).unwrap_err();
        assert!(matches!(err, EpicenterError::Dependency(msg) if msg.contains("Circular dependency")));
    }

    #[test]
    fn topological_order_puts_dependencies_first() {
        let order =
            Workspace::resolve_order(&[config("b", vec!["a"]), config("a", vec![]), config("c", vec!["b"])])
                .unwrap();
        assert_eq!(order, vec!["a", "b", "c"]);
    }
}
