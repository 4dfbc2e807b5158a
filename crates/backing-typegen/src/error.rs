//! Error types for schema building, introspection and typegen assembly.

use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::schema::SchemaId;

/// Which explicit declaration a configuration error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclarationKind {
    /// A `root_typing` import declared on the type.
    RootTyping,
    /// A `backing_type` name resolved against the declaring module.
    BackingType,
}

impl std::fmt::Display for DeclarationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RootTyping => f.write_str("root typing"),
            Self::BackingType => f.write_str("backing type"),
        }
    }
}

/// Errors raised while finalizing a [`SchemaBuilder`](crate::SchemaBuilder).
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SchemaError {
    /// A type was registered without a name.
    #[error("type names must not be empty")]
    EmptyTypeName,

    /// Two types were registered under the same name.
    #[error("type '{0}' is declared more than once")]
    DuplicateType(String),

    /// A field or member refers to a type that was never declared.
    #[error("unknown type '{referenced}' referenced by '{owner}'")]
    UnknownTypeReference {
        /// The type that holds the reference.
        owner: String,
        /// The missing type name.
        referenced: String,
    },

    /// A union lists a member that is not an object type.
    #[error("union '{union}' member '{member}' is not an object type")]
    InvalidUnionMember {
        /// Union type name.
        union: String,
        /// Offending member name.
        member: String,
    },

    /// An object implements something that is not an interface.
    #[error("'{object}' implements '{interface}', which is not an interface")]
    InvalidInterface {
        /// Object type name.
        object: String,
        /// Offending interface name.
        interface: String,
    },

    /// An explicit declaration targets a type the builder never saw.
    #[error("{kind} declared for unknown type '{type_name}'")]
    UnknownDeclarationTarget {
        /// The declaration kind.
        kind: DeclarationKind,
        /// The missing type name.
        type_name: String,
    },
}

/// Soft failures while reading the exports of a source module.
///
/// AutoConfig swallows these; explicit declarations escalate them into
/// [`TypegenError::UnreadableModule`].
#[derive(Debug, Error)]
pub enum IntrospectError {
    /// No file matched the module path or any of its resolution candidates.
    #[error("module '{}' not found", path.display())]
    NotFound {
        /// The module path as requested.
        path: PathBuf,
    },

    /// The path resolved to a file that is not a TypeScript or JavaScript module.
    #[error("'{}' is not a TypeScript module", path.display())]
    Unsupported {
        /// The resolved file.
        path: PathBuf,
    },

    /// Reading the module failed.
    #[error("failed to read '{}': {source}", path.display())]
    Io {
        /// The file being read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// The module text could not be scanned.
    #[error("failed to parse '{}': {message}", path.display())]
    Parse {
        /// The file being parsed.
        path: PathBuf,
        /// What went wrong.
        message: String,
    },

    /// Introspection did not finish in time.
    #[error("introspecting '{}' timed out after {after:?}", path.display())]
    Timeout {
        /// The module path.
        path: PathBuf,
        /// The configured limit.
        after: Duration,
    },
}

/// Fatal configuration errors surfaced while resolving or assembling typegen info.
///
/// Cloneable, so one failed assembly can be reported to every caller waiting on it.
#[derive(Debug, Clone, Error)]
pub enum TypegenError {
    /// An explicit declaration has an empty `name`.
    #[error("{kind} for '{type_name}' is missing a name")]
    MissingName {
        /// The declaration kind.
        kind: DeclarationKind,
        /// The schema type carrying the declaration.
        type_name: String,
    },

    /// An explicit declaration has no module path to import from.
    #[error("{kind} for '{type_name}' is missing a module path")]
    MissingPath {
        /// The declaration kind.
        kind: DeclarationKind,
        /// The schema type carrying the declaration.
        type_name: String,
    },

    /// The module named by an explicit declaration could not be read.
    #[error("{kind} for '{type_name}' points at an unreadable module: {source}")]
    UnreadableModule {
        /// The declaration kind.
        kind: DeclarationKind,
        /// The schema type carrying the declaration.
        type_name: String,
        /// Why the module could not be read.
        #[source]
        source: Arc<IntrospectError>,
    },

    /// A configured alias is not a valid identifier.
    #[error("source alias '{0}' is not a valid identifier")]
    InvalidAlias(String),

    /// A configured source has an empty module path.
    #[error("source '{0}' has an empty module path")]
    EmptyModulePath(String),

    /// Two different modules are configured under one alias.
    #[error("alias '{alias}' is used for both '{}' and '{}'", first.display(), second.display())]
    AliasCollision {
        /// The shared alias.
        alias: String,
        /// Module registered first.
        first: PathBuf,
        /// Module registered second.
        second: PathBuf,
    },

    /// One module is configured under two different aliases.
    #[error("module '{}' is configured as both '{first_alias}' and '{second_alias}'", module.display())]
    DuplicateSource {
        /// The module path.
        module: PathBuf,
        /// Alias registered first.
        first_alias: String,
        /// Alias registered second.
        second_alias: String,
    },

    /// `context_type` is not of the form `alias.ExportedName`.
    #[error("context type '{0}' must be of the form 'alias.ExportedName'")]
    MalformedContextType(String),

    /// `context_type` refers to an alias that no source declares.
    #[error("context type refers to undeclared alias '{0}'")]
    UnknownContextAlias(String),

    /// The module named by a `{ path, name }` context type could not be read.
    #[error("context type module is unreadable: {0}")]
    UnreadableContextModule(#[source] Arc<IntrospectError>),

    /// A typegen config was attached twice to the same schema.
    #[error("a typegen config is already attached to {0}")]
    AlreadyAttached(SchemaId),
}

impl TypegenError {
    /// Returns `true` for errors caused by explicit per-type declarations.
    pub fn is_declaration_error(&self) -> bool {
        matches!(
            self,
            Self::MissingName { .. } | Self::MissingPath { .. } | Self::UnreadableModule { .. }
        )
    }
}
