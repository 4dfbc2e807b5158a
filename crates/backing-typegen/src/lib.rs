//! # backing-typegen
//!
//! Pairs the types of a code-first API schema with hand-written TypeScript
//! "backing" types and prints the mapping as a deterministic typegen file,
//! so resolver code is checked against real data shapes instead of `any`.
//!
//! ## Usage
//!
//! ### 1. Build a schema and attach a config
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use backing_typegen::{SchemaBuilder, SchemaMetadataStore, TypegenConfig};
//!
//! let mut builder = SchemaBuilder::new();
//! builder
//!     .add_enum("Status", &["ACTIVE", "DISABLED"])
//!     .add_object("User", &[("id", "ID!"), ("status", "Status")]);
//! let schema = builder.finish()?;
//!
//! let store = Arc::new(SchemaMetadataStore::new());
//! store.attach(&schema, TypegenConfig::new()
//!     .with_source("t", "src/backing.ts")
//!     .with_context_type("t.Context"))?;
//! ```
//!
//! ### 2. Resolve and print
//!
//! ```rust,ignore
//! use backing_typegen::{TypegenMetadata, TypegenPrinter};
//!
//! let metadata = TypegenMetadata::with_fs(schema.clone(), store);
//! let info = metadata.get_typegen_info(None).await?;
//! let code = TypegenPrinter::new(&schema, &info).print();
//! ```
//!
//! For every schema type the first applicable binding wins: a root typing,
//! an explicit backing type name, a mapped raw type, an export of the same
//! name in one of the configured sources, and finally `any`.

mod aliases;
mod autoconfig;
mod config;
mod error;
mod introspect;
mod metadata;
mod printer;
mod registry;
mod resolver;
mod schema;
mod store;

pub use aliases::{ImportAlias, ImportAliases, module_specifier};
pub use autoconfig::{AutoConfigMatch, AutoConfigResolver};
pub use config::{ContextType, SourceConfig, TypegenConfig};
pub use error::{DeclarationKind, IntrospectError, SchemaError, TypegenError};
pub use introspect::{
    CachedExports, ExportCache, ExportKind, FsIntrospector, MemoryIntrospector, ModuleExports,
    ScannedModule, SourceModuleIntrospector, scan_exports,
};
pub use metadata::{TypegenInfo, TypegenMetadata, TypegenState};
pub use printer::TypegenPrinter;
pub use registry::BackingTypeMap;
pub use resolver::{
    BackingTypeBinding, BackingTypeResolver, BindingOrigin, ContextBinding, UNKNOWN_PLACEHOLDER,
};
pub use schema::{
    BUILTIN_SCALARS, BackingTypeName, ExplicitDeclaration, Member, RootTyping, Schema,
    SchemaBuilder, SchemaId, SchemaTypeDescriptor, TypeKind, named_type,
};
pub use store::SchemaMetadataStore;

/// Result of typegen assembly.
pub type Result<T> = std::result::Result<T, TypegenError>;
