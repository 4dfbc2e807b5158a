//! Typegen assembly: turning a finalized schema and its config into an
//! immutable [`TypegenInfo`] snapshot.
//!
//! Snapshots are memoized per [`SchemaId`]. Concurrent requests for the same
//! schema share one in-flight assembly; requests for different schemas run
//! independently. Printing always works from a cached snapshot.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use dashmap::DashMap;
use indexmap::IndexMap;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use crate::aliases::ImportAlias;
use crate::config::TypegenConfig;
use crate::error::TypegenError;
use crate::introspect::{ExportCache, FsIntrospector, SourceModuleIntrospector};
use crate::printer::TypegenPrinter;
use crate::resolver::{BackingTypeBinding, BackingTypeResolver, ContextBinding};
use crate::schema::{Schema, SchemaId};
use crate::store::SchemaMetadataStore;

/// The fully resolved bindings of one schema.
#[derive(Debug, Clone)]
pub struct TypegenInfo {
    pub schema_id: SchemaId,
    /// One binding per schema type, in registration order.
    pub bindings: IndexMap<String, BackingTypeBinding>,
    /// Modules referenced by some binding or the context type. Configured
    /// sources first, minted aliases after.
    pub imports: Vec<ImportAlias>,
    pub context: Option<ContextBinding>,
    pub config: Arc<TypegenConfig>,
}

impl TypegenInfo {
    pub fn binding(&self, type_name: &str) -> Option<&BackingTypeBinding> {
        self.bindings.get(type_name)
    }

    /// Bindings nothing could resolve, for callers that want to be strict.
    pub fn unresolved(&self) -> impl Iterator<Item = &BackingTypeBinding> {
        self.bindings.values().filter(|b| !b.is_resolved())
    }
}

/// Where a schema's typegen currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypegenState {
    /// Nothing assembled yet.
    Finalized,
    /// An assembly is in flight.
    Resolving,
    /// A snapshot is cached.
    Resolved,
}

type Snapshot = Result<Arc<TypegenInfo>, TypegenError>;
type SnapshotCell = Arc<OnceCell<Snapshot>>;

/// Assembles and caches [`TypegenInfo`] snapshots.
///
/// Constructed around one schema, but any finalized schema can be passed to
/// [`get_typegen_info`](Self::get_typegen_info). A schema without a config of
/// its own is assembled with the captured schema's config.
#[derive(Debug)]
pub struct TypegenMetadata {
    schema: Arc<Schema>,
    store: Arc<SchemaMetadataStore>,
    introspector: Arc<dyn SourceModuleIntrospector>,
    snapshots: DashMap<SchemaId, SnapshotCell>,
}

impl TypegenMetadata {
    pub fn new(
        schema: Arc<Schema>,
        store: Arc<SchemaMetadataStore>,
        introspector: Arc<dyn SourceModuleIntrospector>,
    ) -> Self {
        Self {
            schema,
            store,
            introspector,
            snapshots: DashMap::new(),
        }
    }

    /// Introspect source modules from the file system.
    pub fn with_fs(schema: Arc<Schema>, store: Arc<SchemaMetadataStore>) -> Self {
        Self::new(schema, store, Arc::new(FsIntrospector::new()))
    }

    /// The schema captured at construction.
    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    /// The config used to assemble `schema`.
    pub fn config_for(&self, schema: &Schema) -> Arc<TypegenConfig> {
        self.store
            .get(schema.id())
            .or_else(|| self.store.get(self.schema.id()))
            .unwrap_or_default()
    }

    /// The snapshot for `schema`, or for the captured schema when `None`.
    ///
    /// # Errors
    ///
    /// Propagates configuration errors. Every caller waiting on a failed
    /// assembly gets the same error; the failure is then dropped so the next
    /// call starts over.
    pub async fn get_typegen_info(
        &self,
        schema: Option<&Arc<Schema>>,
    ) -> Result<Arc<TypegenInfo>, TypegenError> {
        let schema = schema.unwrap_or(&self.schema);
        let id = schema.id();
        let cell = Arc::clone(self.snapshots.entry(id).or_default().value());

        if let Some(Ok(info)) = cell.get() {
            debug!(schema = %id, "Using cached typegen info");
            return Ok(Arc::clone(info));
        }

        let result = cell.get_or_init(|| self.assemble(schema)).await.clone();
        if let Err(e) = &result
            && self
                .snapshots
                .remove_if(&id, |_, current| Arc::ptr_eq(current, &cell))
                .is_some()
        {
            warn!(schema = %id, error = %e, "Typegen assembly failed");
        }
        result
    }

    /// Assemble and print the typegen file for `schema`.
    ///
    /// # Errors
    ///
    /// Propagates configuration errors from assembly.
    pub async fn print_typegen(&self, schema: Option<&Arc<Schema>>) -> Result<String, TypegenError> {
        let target = schema.unwrap_or(&self.schema);
        let info = self.get_typegen_info(Some(target)).await?;
        Ok(TypegenPrinter::new(target, &info).print())
    }

    pub fn state(&self, schema: &Schema) -> TypegenState {
        match self.snapshots.get(&schema.id()).as_deref().map(|cell| cell.get()) {
            Some(Some(Ok(_))) => TypegenState::Resolved,
            Some(None) => TypegenState::Resolving,
            Some(Some(Err(_))) | None => TypegenState::Finalized,
        }
    }

    /// Drop the cached snapshot of `schema`. Returns whether one existed.
    pub fn invalidate(&self, schema: &Schema) -> bool {
        let removed = self.snapshots.remove(&schema.id()).is_some();
        if removed {
            debug!(schema = %schema.id(), "Invalidated typegen info");
        }
        removed
    }

    async fn assemble(&self, schema: &Schema) -> Result<Arc<TypegenInfo>, TypegenError> {
        let started = Instant::now();
        let config = self.config_for(schema);
        config.validate()?;

        let cache = Arc::new(ExportCache::new(
            Arc::clone(&self.introspector),
            config.introspection_timeout(),
        ));
        let mut resolver = BackingTypeResolver::new(&config, Arc::clone(&cache))?;
        resolver.prepare_sources(&config).await?;

        let mut bindings = IndexMap::with_capacity(schema.len());
        for ty in schema.types() {
            let binding = resolver
                .resolve(ty, schema.declaration(&ty.name), &config)
                .await?;
            bindings.insert(ty.name.clone(), binding);
        }
        let context = resolver.resolve_context(&config).await?;

        let used: HashSet<&str> = bindings
            .values()
            .filter_map(|b| b.source_alias.as_deref())
            .chain(context.as_ref().map(|c| c.alias.as_str()))
            .collect();
        let imports: Vec<ImportAlias> = resolver
            .aliases()
            .iter()
            .filter(|a| used.contains(a.alias.as_str()))
            .cloned()
            .collect();

        let info = TypegenInfo {
            schema_id: schema.id(),
            bindings,
            imports,
            context,
            config,
        };
        info!(
            schema = %schema.id(),
            types = info.bindings.len(),
            unresolved = info.unresolved().count(),
            modules = cache.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Assembled typegen info"
        );
        Ok(Arc::new(info))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::introspect::MemoryIntrospector;
    use crate::resolver::BindingOrigin;
    use crate::schema::{RootTyping, SchemaBuilder};

    fn enum_schema(name: &str, values: &[&str]) -> Arc<Schema> {
        let mut builder = SchemaBuilder::new();
        builder
            .add_enum(name, values)
            .add_object("Query", &[("value", name)]);
        builder.finish().unwrap()
    }

    fn metadata(
        schema: &Arc<Schema>,
        config: TypegenConfig,
        introspector: Arc<MemoryIntrospector>,
    ) -> TypegenMetadata {
        let store = Arc::new(SchemaMetadataStore::new());
        store.attach(schema, config).unwrap();
        TypegenMetadata::new(Arc::clone(schema), store, introspector)
    }

    #[tokio::test]
    async fn test_snapshot_is_memoized() {
        let schema = enum_schema("A", &["ONE", "TWO"]);
        let introspector = Arc::new(MemoryIntrospector::new().with_exports("_types.ts", &["A"]));
        let metadata = metadata(
            &schema,
            TypegenConfig::new().with_source("t", "_types.ts"),
            introspector.clone(),
        );

        assert_eq!(metadata.state(&schema), TypegenState::Finalized);
        let first = metadata.get_typegen_info(None).await.unwrap();
        let second = metadata.get_typegen_info(Some(&schema)).await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(introspector.calls(), 1);
        assert_eq!(metadata.state(&schema), TypegenState::Resolved);
        assert_eq!(first.binding("A").unwrap().reference(), "t.A");
    }

    #[tokio::test]
    async fn test_other_schema_gets_fresh_snapshot() {
        let captured = enum_schema("A", &["ONE"]);
        let other = enum_schema("B", &["NINE", "TEN"]);
        let introspector =
            Arc::new(MemoryIntrospector::new().with_exports("_types.ts", &["A", "B"]));
        let metadata = metadata(
            &captured,
            TypegenConfig::new().with_source("t", "_types.ts"),
            introspector,
        );

        let first = metadata.get_typegen_info(None).await.unwrap();
        let info = metadata.get_typegen_info(Some(&other)).await.unwrap();
        assert_eq!(info.schema_id, other.id());
        assert_eq!(info.binding("B").unwrap().reference(), "t.B");
        assert!(first.binding("B").is_none());
        assert_eq!(metadata.state(&captured), TypegenState::Resolved);
    }

    #[tokio::test]
    async fn test_concurrent_requests_share_one_assembly() {
        let schema = enum_schema("A", &["ONE"]);
        let introspector = Arc::new(
            MemoryIntrospector::new()
                .with_exports("_types.ts", &["A"])
                .with_delay(Duration::from_millis(20)),
        );
        let metadata = Arc::new(metadata(
            &schema,
            TypegenConfig::new().with_source("t", "_types.ts"),
            introspector.clone(),
        ));

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let metadata = Arc::clone(&metadata);
                tokio::spawn(async move { metadata.get_typegen_info(None).await })
            })
            .collect();
        let results = futures::future::join_all(tasks).await;
        let infos: Vec<_> = results.into_iter().map(|r| r.unwrap().unwrap()).collect();

        assert!(infos.iter().all(|i| Arc::ptr_eq(i, &infos[0])));
        assert_eq!(introspector.calls(), 1);
    }

    #[tokio::test]
    async fn test_failed_assembly_is_not_cached() {
        let mut builder = SchemaBuilder::new();
        builder
            .add_enum("A", &["ONE"])
            .set_root_typing("A", RootTyping::new("missing.ts", "A"));
        let schema = builder.finish().unwrap();
        let metadata = metadata(
            &schema,
            TypegenConfig::new(),
            Arc::new(MemoryIntrospector::new()),
        );

        let err = metadata.get_typegen_info(None).await.unwrap_err();
        assert!(err.is_declaration_error());
        assert_eq!(metadata.state(&schema), TypegenState::Finalized);
    }

    #[tokio::test]
    async fn test_concurrent_failures_share_one_assembly() {
        let mut builder = SchemaBuilder::new();
        builder
            .add_enum("A", &["ONE"])
            .set_root_typing("A", RootTyping::new("missing.ts", "A"));
        let schema = builder.finish().unwrap();
        let introspector =
            Arc::new(MemoryIntrospector::new().with_delay(Duration::from_millis(20)));
        let metadata = Arc::new(metadata(&schema, TypegenConfig::new(), introspector.clone()));

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let metadata = Arc::clone(&metadata);
                tokio::spawn(async move { metadata.get_typegen_info(None).await })
            })
            .collect();
        for result in futures::future::join_all(tasks).await {
            assert!(matches!(
                result.unwrap(),
                Err(TypegenError::UnreadableModule { .. })
            ));
        }
        assert_eq!(introspector.calls(), 1);
        assert_eq!(metadata.state(&schema), TypegenState::Finalized);

        assert!(metadata.get_typegen_info(None).await.is_err());
        assert_eq!(introspector.calls(), 2);
    }

    #[tokio::test]
    async fn test_invalidate_recomputes() {
        let schema = enum_schema("A", &["ONE"]);
        let introspector = Arc::new(MemoryIntrospector::new().with_exports("_types.ts", &["A"]));
        let metadata = metadata(
            &schema,
            TypegenConfig::new().with_source("t", "_types.ts"),
            introspector.clone(),
        );

        let first = metadata.get_typegen_info(None).await.unwrap();
        assert!(metadata.invalidate(&schema));
        assert!(!metadata.invalidate(&schema));
        let second = metadata.get_typegen_info(None).await.unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(introspector.calls(), 2);
    }

    #[tokio::test]
    async fn test_only_used_aliases_are_imported() {
        let schema = enum_schema("A", &["ONE"]);
        let introspector = Arc::new(
            MemoryIntrospector::new()
                .with_exports("unused.ts", &["Other"])
                .with_exports("_types.ts", &["A"]),
        );
        let metadata = metadata(
            &schema,
            TypegenConfig::new()
                .with_source("u", "unused.ts")
                .with_source("t", "_types.ts"),
            introspector,
        );

        let info = metadata.get_typegen_info(None).await.unwrap();
        let aliases: Vec<_> = info.imports.iter().map(|i| i.alias.as_str()).collect();
        assert_eq!(aliases, vec!["t"]);
        assert_eq!(info.binding("Query").unwrap().origin, BindingOrigin::Unresolved);
        assert_eq!(info.unresolved().count(), 1);
    }

    #[tokio::test]
    async fn test_alias_collision_fails_assembly() {
        let schema = enum_schema("A", &["ONE"]);
        let metadata = metadata(
            &schema,
            TypegenConfig::new()
                .with_source("t", "a.ts")
                .with_source("t", "b.ts"),
            Arc::new(MemoryIntrospector::new()),
        );
        assert!(matches!(
            metadata.get_typegen_info(None).await,
            Err(TypegenError::AliasCollision { .. })
        ));
    }
}
