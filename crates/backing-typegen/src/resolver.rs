//! Per-type backing type resolution.
//!
//! Precedence, highest first:
//!
//! 1. a root typing `{ path, name }` declared on the type
//! 2. an explicit backing type name, resolved against the declaring module
//! 3. a raw expression from the [`BackingTypeMap`]
//! 4. an AutoConfig match from the configured sources
//! 5. unresolved, rendered as [`UNKNOWN_PLACEHOLDER`]
//!
//! Malformed explicit declarations fail immediately. Everything from step 3 on
//! never fails.

use std::path::Path;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::aliases::ImportAliases;
use crate::autoconfig::AutoConfigResolver;
use crate::config::{ContextType, TypegenConfig};
use crate::error::{DeclarationKind, TypegenError};
use crate::introspect::{ExportCache, ModuleExports};
use crate::registry::BackingTypeMap;
use crate::schema::{ExplicitDeclaration, SchemaTypeDescriptor};

/// Type emitted for bindings nothing could resolve.
pub const UNKNOWN_PLACEHOLDER: &str = "any";

/// Where a binding came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BindingOrigin {
    RootTyping,
    ExplicitName,
    Mapped,
    AutoConfig,
    Unresolved,
}

/// The backing type chosen for one schema type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackingTypeBinding {
    pub schema_type_name: String,
    pub origin: BindingOrigin,
    /// Import alias of the module providing the type. `None` for mapped and
    /// unresolved bindings.
    pub source_alias: Option<String>,
    /// Exported name, or the raw expression of a mapped binding.
    pub exported_name: Option<String>,
}

impl BackingTypeBinding {
    fn imported(
        schema_type_name: &str,
        origin: BindingOrigin,
        alias: String,
        exported_name: &str,
    ) -> Self {
        Self {
            schema_type_name: schema_type_name.to_string(),
            origin,
            source_alias: Some(alias),
            exported_name: Some(exported_name.to_string()),
        }
    }

    fn mapped(schema_type_name: &str, expr: &str) -> Self {
        Self {
            schema_type_name: schema_type_name.to_string(),
            origin: BindingOrigin::Mapped,
            source_alias: None,
            exported_name: Some(expr.to_string()),
        }
    }

    /// A binding rendered as the unknown placeholder.
    pub fn unresolved(schema_type_name: &str) -> Self {
        Self {
            schema_type_name: schema_type_name.to_string(),
            origin: BindingOrigin::Unresolved,
            source_alias: None,
            exported_name: None,
        }
    }

    /// The type reference printed for this binding: `alias.Name`, a raw
    /// expression, or the placeholder.
    pub fn reference(&self) -> String {
        match (&self.source_alias, &self.exported_name) {
            (Some(alias), Some(name)) => format!("{alias}.{name}"),
            (None, Some(expr)) => expr.clone(),
            _ => UNKNOWN_PLACEHOLDER.to_string(),
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.origin != BindingOrigin::Unresolved
    }
}

/// The backing type of the resolver context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextBinding {
    pub alias: String,
    pub exported_name: String,
}

impl ContextBinding {
    pub fn reference(&self) -> String {
        format!("{}.{}", self.alias, self.exported_name)
    }
}

/// Resolves bindings for the types of one schema, assigning import aliases
/// as it goes.
#[derive(Debug)]
pub struct BackingTypeResolver {
    cache: Arc<ExportCache>,
    autoconfig: AutoConfigResolver,
    aliases: ImportAliases,
    mapped: BackingTypeMap,
}

impl BackingTypeResolver {
    /// # Errors
    ///
    /// Fails when the configured sources have invalid or colliding aliases.
    pub fn new(config: &TypegenConfig, cache: Arc<ExportCache>) -> Result<Self, TypegenError> {
        Ok(Self {
            autoconfig: AutoConfigResolver::new(Arc::clone(&cache)),
            aliases: ImportAliases::from_sources(&config.sources)?,
            mapped: BackingTypeMap::from_config(config),
            cache,
        })
    }

    pub fn autoconfig(&self) -> &AutoConfigResolver {
        &self.autoconfig
    }

    pub fn aliases(&self) -> &ImportAliases {
        &self.aliases
    }

    pub fn into_aliases(self) -> ImportAliases {
        self.aliases
    }

    /// Introspect the configured sources concurrently and tie each alias to
    /// the file its module resolved to. Unreadable sources are left for
    /// AutoConfig to skip.
    ///
    /// # Errors
    ///
    /// Fails when two sources resolve to the same file.
    pub async fn prepare_sources(&mut self, config: &TypegenConfig) -> Result<(), TypegenError> {
        self.autoconfig.prefetch(&config.sources).await;
        for source in &config.sources {
            if let Ok(exports) = self.cache.exports(&source.module_path).await {
                self.aliases.bind_resolved(&source.alias, &exports.module)?;
            }
        }
        Ok(())
    }

    /// Resolve the binding for `ty`.
    ///
    /// # Errors
    ///
    /// Fails when an explicit declaration has an empty name, no module path,
    /// or a module that cannot be read.
    pub async fn resolve(
        &mut self,
        ty: &SchemaTypeDescriptor,
        explicit: Option<&ExplicitDeclaration>,
        config: &TypegenConfig,
    ) -> Result<BackingTypeBinding, TypegenError> {
        let type_name = ty.name.as_str();

        if let Some(root_typing) = explicit.and_then(|e| e.root_typing.as_ref()) {
            let kind = DeclarationKind::RootTyping;
            check_declaration(kind, type_name, &root_typing.name, Some(root_typing.path.as_path()))?;
            let alias = self
                .import_declared(kind, type_name, &root_typing.path, &root_typing.name)
                .await?;
            debug!(type_name, alias = %alias, "Resolved from root typing");
            return Ok(BackingTypeBinding::imported(
                type_name,
                BindingOrigin::RootTyping,
                alias,
                &root_typing.name,
            ));
        }

        if let Some(backing_type) = explicit.and_then(|e| e.backing_type.as_ref()) {
            let kind = DeclarationKind::BackingType;
            let module = backing_type.module.as_deref();
            check_declaration(kind, type_name, &backing_type.name, module)?;
            let module = module.ok_or_else(|| TypegenError::MissingPath {
                kind,
                type_name: type_name.to_string(),
            })?;
            let alias = self
                .import_declared(kind, type_name, module, &backing_type.name)
                .await?;
            debug!(type_name, alias = %alias, "Resolved from explicit backing type");
            return Ok(BackingTypeBinding::imported(
                type_name,
                BindingOrigin::ExplicitName,
                alias,
                &backing_type.name,
            ));
        }

        if let Some(expr) = self.mapped.get(type_name) {
            debug!(type_name, expr, "Resolved from backing type map");
            return Ok(BackingTypeBinding::mapped(type_name, expr));
        }

        if config.skip_types.iter().any(|s| s == type_name) {
            debug!(type_name, "Skipped by configuration");
        } else if let Some(found) = self.autoconfig.find_match(type_name, &config.sources).await {
            return Ok(BackingTypeBinding::imported(
                type_name,
                BindingOrigin::AutoConfig,
                found.alias,
                &found.exported_name,
            ));
        }

        debug!(type_name, "Unresolved");
        Ok(BackingTypeBinding::unresolved(type_name))
    }

    /// Resolve the configured context type, if any.
    ///
    /// # Errors
    ///
    /// Fails when the context type is malformed, names an undeclared alias, or
    /// points at an unreadable module.
    pub async fn resolve_context(
        &mut self,
        config: &TypegenConfig,
    ) -> Result<Option<ContextBinding>, TypegenError> {
        let Some(context_type) = &config.context_type else {
            return Ok(None);
        };
        match context_type {
            ContextType::Aliased(value) => {
                let (alias, name) = ContextType::split_aliased(value)?;
                let Some(source) = config.sources.iter().find(|s| s.alias == alias) else {
                    return Err(TypegenError::UnknownContextAlias(alias.to_string()));
                };
                match self.cache.exports(&source.module_path).await {
                    Ok(exports) if !exports.contains(name) => {
                        warn!(alias, export = name, "Context type is not exported by its source");
                    }
                    Ok(_) => {}
                    Err(e) => warn!(alias, error = %e, "Context type source is unreadable"),
                }
                Ok(Some(ContextBinding {
                    alias: alias.to_string(),
                    exported_name: name.to_string(),
                }))
            }
            ContextType::Module { path, name } => {
                if path.as_os_str().is_empty() || name.is_empty() {
                    return Err(TypegenError::MalformedContextType(format!(
                        "{}:{name}",
                        path.display()
                    )));
                }
                let exports = self
                    .cache
                    .exports(path)
                    .await
                    .map_err(TypegenError::UnreadableContextModule)?;
                warn_if_missing(&exports, "context", name);
                Ok(Some(ContextBinding {
                    alias: self.aliases.alias_for_module(path, &exports.module),
                    exported_name: name.clone(),
                }))
            }
        }
    }

    /// Read a declared module strictly and return its import alias.
    async fn import_declared(
        &mut self,
        kind: DeclarationKind,
        type_name: &str,
        module: &Path,
        name: &str,
    ) -> Result<String, TypegenError> {
        let exports = self
            .cache
            .exports(module)
            .await
            .map_err(|source| TypegenError::UnreadableModule {
                kind,
                type_name: type_name.to_string(),
                source,
            })?;
        warn_if_missing(&exports, type_name, name);
        Ok(self.aliases.alias_for_module(module, &exports.module))
    }
}

fn check_declaration(
    kind: DeclarationKind,
    type_name: &str,
    name: &str,
    module: Option<&Path>,
) -> Result<(), TypegenError> {
    if name.trim().is_empty() {
        return Err(TypegenError::MissingName {
            kind,
            type_name: type_name.to_string(),
        });
    }
    if module.is_none_or(|m| m.as_os_str().is_empty()) {
        return Err(TypegenError::MissingPath {
            kind,
            type_name: type_name.to_string(),
        });
    }
    Ok(())
}

fn warn_if_missing(exports: &ModuleExports, type_name: &str, export: &str) {
    if !exports.contains(export) {
        warn!(
            type_name,
            export,
            module = %exports.module.display(),
            "Declared backing type is not exported by its module"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::introspect::{FsIntrospector, MemoryIntrospector};
    use crate::schema::{BackingTypeName, RootTyping, TypeKind};

    fn descriptor(name: &str, kind: TypeKind) -> SchemaTypeDescriptor {
        SchemaTypeDescriptor {
            name: name.to_string(),
            kind,
            members: Vec::new(),
        }
    }

    fn new_resolver(config: &TypegenConfig, introspector: MemoryIntrospector) -> BackingTypeResolver {
        let cache = Arc::new(ExportCache::new(Arc::new(introspector), None));
        BackingTypeResolver::new(config, cache).unwrap()
    }

    fn introspector() -> MemoryIntrospector {
        MemoryIntrospector::new()
            .with_exports("_types.ts", &["A", "TestEnum", "User"])
            .with_exports("other/enums.ts", &["TestEnum"])
    }

    #[tokio::test]
    async fn test_root_typing_beats_autoconfig() {
        let config = TypegenConfig::new().with_source("t", "_types.ts");
        let mut resolver = new_resolver(&config, introspector());
        let explicit = ExplicitDeclaration {
            root_typing: Some(RootTyping::new("other/enums.ts", "TestEnum")),
            backing_type: Some(BackingTypeName::new("A").in_module("_types.ts")),
        };

        let binding = resolver
            .resolve(&descriptor("TestEnum", TypeKind::Enum), Some(&explicit), &config)
            .await
            .unwrap();
        assert_eq!(binding.origin, BindingOrigin::RootTyping);
        assert_eq!(binding.reference(), "enums.TestEnum");
    }

    #[tokio::test]
    async fn test_explicit_name_beats_autoconfig() {
        let config = TypegenConfig::new().with_source("t", "_types.ts");
        let mut resolver = new_resolver(&config, introspector());
        let explicit = ExplicitDeclaration {
            root_typing: None,
            backing_type: Some(BackingTypeName::new("TestEnum").in_module("other/enums.ts")),
        };

        let binding = resolver
            .resolve(&descriptor("A", TypeKind::Object), Some(&explicit), &config)
            .await
            .unwrap();
        assert_eq!(binding.origin, BindingOrigin::ExplicitName);
        assert_eq!(binding.reference(), "enums.TestEnum");
    }

    #[tokio::test]
    async fn test_root_typing_reuses_source_alias() {
        let config = TypegenConfig::new().with_source("t", "_types.ts");
        let mut resolver = new_resolver(&config, introspector());
        let explicit = ExplicitDeclaration {
            root_typing: Some(RootTyping::new("./_types", "User")),
            backing_type: None,
        };

        let binding = resolver
            .resolve(&descriptor("Person", TypeKind::Object), Some(&explicit), &config)
            .await
            .unwrap();
        assert_eq!(binding.reference(), "t.User");
        assert_eq!(resolver.aliases().len(), 1);
    }

    #[tokio::test]
    async fn test_declared_module_reuses_alias_of_resolved_source() {
        let dir = tempfile::tempdir().unwrap();
        let models = dir.path().join("models");
        std::fs::create_dir(&models).unwrap();
        std::fs::write(models.join("index.ts"), "export interface User {}\n").unwrap();

        let config = TypegenConfig::new().with_source("t", &models);
        let cache = Arc::new(ExportCache::new(Arc::new(FsIntrospector::new()), None));
        let mut resolver = BackingTypeResolver::new(&config, cache).unwrap();
        resolver.prepare_sources(&config).await.unwrap();

        let explicit = ExplicitDeclaration {
            root_typing: Some(RootTyping::new(models.join("index.ts"), "User")),
            backing_type: None,
        };
        let binding = resolver
            .resolve(&descriptor("Person", TypeKind::Object), Some(&explicit), &config)
            .await
            .unwrap();
        assert_eq!(binding.reference(), "t.User");
        assert_eq!(resolver.aliases().len(), 1);
    }

    #[tokio::test]
    async fn test_sources_resolving_to_one_file_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let models = dir.path().join("models");
        std::fs::create_dir(&models).unwrap();
        std::fs::write(models.join("index.ts"), "export interface User {}\n").unwrap();

        let config = TypegenConfig::new()
            .with_source("a", &models)
            .with_source("b", models.join("index.ts"));
        let cache = Arc::new(ExportCache::new(Arc::new(FsIntrospector::new()), None));
        let mut resolver = BackingTypeResolver::new(&config, cache).unwrap();
        assert!(matches!(
            resolver.prepare_sources(&config).await,
            Err(TypegenError::DuplicateSource { .. })
        ));
    }

    #[tokio::test]
    async fn test_mapped_beats_autoconfig() {
        let config = TypegenConfig::new()
            .with_source("t", "_types.ts")
            .with_backing_type("User", "{ id: string }");
        let mut resolver = new_resolver(&config, introspector());

        let user = resolver
            .resolve(&descriptor("User", TypeKind::Object), None, &config)
            .await
            .unwrap();
        assert_eq!(user.origin, BindingOrigin::Mapped);
        assert_eq!(user.reference(), "{ id: string }");

        let int = resolver
            .resolve(&descriptor("Int", TypeKind::Scalar), None, &config)
            .await
            .unwrap();
        assert_eq!(int.reference(), "number");
    }

    #[tokio::test]
    async fn test_autoconfig_and_unresolved() {
        let mut config = TypegenConfig::new().with_source("t", "_types.ts");
        config.skip_types.push("User".into());
        let mut resolver = new_resolver(&config, introspector());

        let a = resolver
            .resolve(&descriptor("A", TypeKind::Enum), None, &config)
            .await
            .unwrap();
        assert_eq!(a.origin, BindingOrigin::AutoConfig);
        assert_eq!(a.reference(), "t.A");

        let user = resolver
            .resolve(&descriptor("User", TypeKind::Object), None, &config)
            .await
            .unwrap();
        assert!(!user.is_resolved());
        assert_eq!(user.reference(), "any");

        let missing = resolver
            .resolve(&descriptor("Missing", TypeKind::Object), None, &config)
            .await
            .unwrap();
        assert_eq!(missing.origin, BindingOrigin::Unresolved);
    }

    #[tokio::test]
    async fn test_malformed_declarations_are_fatal() {
        let config = TypegenConfig::new();
        let mut resolver = new_resolver(&config, introspector());
        let ty = descriptor("A", TypeKind::Enum);

        let no_name = ExplicitDeclaration {
            root_typing: Some(RootTyping::new("_types.ts", "")),
            backing_type: None,
        };
        let err = resolver.resolve(&ty, Some(&no_name), &config).await.unwrap_err();
        assert!(matches!(err, TypegenError::MissingName { kind: DeclarationKind::RootTyping, .. }));

        let no_path = ExplicitDeclaration {
            root_typing: Some(RootTyping::new("", "A")),
            backing_type: None,
        };
        let err = resolver.resolve(&ty, Some(&no_path), &config).await.unwrap_err();
        assert!(matches!(err, TypegenError::MissingPath { .. }));

        let no_module = ExplicitDeclaration {
            root_typing: None,
            backing_type: Some(BackingTypeName::new("A")),
        };
        let err = resolver.resolve(&ty, Some(&no_module), &config).await.unwrap_err();
        assert!(matches!(err, TypegenError::MissingPath { kind: DeclarationKind::BackingType, .. }));

        let unreadable = ExplicitDeclaration {
            root_typing: Some(RootTyping::new("missing.ts", "A")),
            backing_type: None,
        };
        let err = resolver.resolve(&ty, Some(&unreadable), &config).await.unwrap_err();
        assert!(matches!(err, TypegenError::UnreadableModule { .. }));
    }

    #[tokio::test]
    async fn test_resolve_context() {
        let config = TypegenConfig::new()
            .with_source("t", "_types.ts")
            .with_context_type("t.TestContext");
        let mut resolver = new_resolver(&config, introspector());
        let context = resolver.resolve_context(&config).await.unwrap().unwrap();
        assert_eq!(context.reference(), "t.TestContext");

        let config = TypegenConfig::new().with_context_type("ctx.Context");
        let mut resolver = new_resolver(&config, introspector());
        assert!(matches!(
            resolver.resolve_context(&config).await,
            Err(TypegenError::UnknownContextAlias(_))
        ));
    }

    #[tokio::test]
    async fn test_resolve_module_context() {
        let mut config = TypegenConfig::new();
        config.context_type = Some(ContextType::Module {
            path: "other/enums.ts".into(),
            name: "TestEnum".into(),
        });
        let mut resolver = new_resolver(&config, introspector());
        let context = resolver.resolve_context(&config).await.unwrap().unwrap();
        assert_eq!(context.reference(), "enums.TestEnum");

        config.context_type = Some(ContextType::Module {
            path: "missing.ts".into(),
            name: "Context".into(),
        });
        let mut resolver = new_resolver(&config, introspector());
        assert!(matches!(
            resolver.resolve_context(&config).await,
            Err(TypegenError::UnreadableContextModule(_))
        ));
    }
}
