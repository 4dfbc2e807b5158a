//! Typegen configuration.
//!
//! A [`TypegenConfig`] is attached once per finalized schema and never
//! mutated afterwards. It deserializes with serde, so it can be embedded in a
//! larger project configuration:
//!
//! ```toml
//! context_type = "t.Context"
//! typegen_file = "src/generated/typegen.ts"
//! skip_types = ["Query"]
//!
//! [[sources]]
//! alias = "t"
//! module_path = "src/backing.ts"
//!
//! [backing_type_map]
//! DateTime = "Date"
//! ```

use std::path::PathBuf;
use std::time::Duration;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::aliases::{ImportAliases, is_identifier};
use crate::error::TypegenError;

/// One AutoConfig source: a module searched for exports named like schema types.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Identifier used for the module in generated imports.
    pub alias: String,
    /// Path to the TypeScript module.
    pub module_path: PathBuf,
}

impl SourceConfig {
    pub fn new(alias: impl Into<String>, module_path: impl Into<PathBuf>) -> Self {
        Self {
            alias: alias.into(),
            module_path: module_path.into(),
        }
    }
}

/// The backing type of the shared request context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ContextType {
    /// `"alias.ExportedName"`, where `alias` is a configured source.
    Aliased(String),
    /// An export of an arbitrary module, imported like a root typing.
    Module { path: PathBuf, name: String },
}

impl ContextType {
    /// Split an aliased context type into `(alias, exported_name)`.
    pub fn split_aliased(value: &str) -> Result<(&str, &str), TypegenError> {
        match value.split_once('.') {
            Some((alias, name)) if is_identifier(alias) && is_identifier(name) => Ok((alias, name)),
            _ => Err(TypegenError::MalformedContextType(value.to_string())),
        }
    }
}

/// Typegen settings supplied alongside a schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypegenConfig {
    /// Ordered AutoConfig sources. Earlier sources win.
    #[serde(default)]
    pub sources: Vec<SourceConfig>,

    /// Backing type of the resolver context.
    #[serde(default)]
    pub context_type: Option<ContextType>,

    /// Destination of the generated declarations. Import specifiers are
    /// computed relative to its directory.
    #[serde(default)]
    pub typegen_file: Option<PathBuf>,

    /// Destination of the printed schema. Only carried through.
    #[serde(default)]
    pub schema_file: Option<PathBuf>,

    /// When false, output is still assembled and printed but never persisted.
    /// Default: true
    #[serde(default = "default_outputs_enabled")]
    pub outputs_enabled: bool,

    /// Raw backing type expressions per schema type name, layered over the
    /// built-in scalar defaults.
    #[serde(default)]
    pub backing_type_map: IndexMap<String, String>,

    /// Schema types never matched against AutoConfig sources.
    #[serde(default)]
    pub skip_types: Vec<String>,

    /// Custom header replacing the default generated-file banner.
    #[serde(default)]
    pub header: Option<String>,

    /// Per-module introspection limit in milliseconds. 0 disables it.
    /// Default: 5000
    #[serde(default = "default_introspection_timeout_ms")]
    pub introspection_timeout_ms: u64,
}

fn default_outputs_enabled() -> bool {
    true
}

fn default_introspection_timeout_ms() -> u64 {
    5000
}

impl Default for TypegenConfig {
    fn default() -> Self {
        Self {
            sources: Vec::new(),
            context_type: None,
            typegen_file: None,
            schema_file: None,
            outputs_enabled: default_outputs_enabled(),
            backing_type_map: IndexMap::new(),
            skip_types: Vec::new(),
            header: None,
            introspection_timeout_ms: default_introspection_timeout_ms(),
        }
    }
}

impl TypegenConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an AutoConfig source.
    pub fn with_source(mut self, alias: impl Into<String>, module_path: impl Into<PathBuf>) -> Self {
        self.sources.push(SourceConfig::new(alias, module_path));
        self
    }

    /// Use `"alias.ExportedName"` as the context type.
    pub fn with_context_type(mut self, context_type: impl Into<String>) -> Self {
        self.context_type = Some(ContextType::Aliased(context_type.into()));
        self
    }

    pub fn with_typegen_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.typegen_file = Some(path.into());
        self
    }

    pub fn with_outputs_enabled(mut self, enabled: bool) -> Self {
        self.outputs_enabled = enabled;
        self
    }

    /// Map a schema type straight to a raw backing type expression.
    pub fn with_backing_type(mut self, type_name: impl Into<String>, expr: impl Into<String>) -> Self {
        self.backing_type_map.insert(type_name.into(), expr.into());
        self
    }

    /// The introspection timeout, or `None` when disabled.
    pub fn introspection_timeout(&self) -> Option<Duration> {
        (self.introspection_timeout_ms > 0)
            .then(|| Duration::from_millis(self.introspection_timeout_ms))
    }

    /// The typegen file, ignoring an empty path.
    pub fn typegen_file(&self) -> Option<&std::path::Path> {
        self.typegen_file
            .as_deref()
            .filter(|p| !p.as_os_str().is_empty())
    }

    /// Check everything that can be checked without touching the file system.
    ///
    /// # Errors
    ///
    /// Returns the first configuration error: a bad alias, an empty module
    /// path, an alias collision, or a context type naming an undeclared alias.
    pub fn validate(&self) -> Result<(), TypegenError> {
        let aliases = ImportAliases::from_sources(&self.sources)?;
        if let Some(ContextType::Aliased(value)) = &self.context_type {
            let (alias, _) = ContextType::split_aliased(value)?;
            if aliases.module_for(alias).is_none() {
                return Err(TypegenError::UnknownContextAlias(alias.to_string()));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = TypegenConfig::default();
        assert!(config.sources.is_empty());
        assert!(config.outputs_enabled);
        assert_eq!(config.introspection_timeout(), Some(Duration::from_secs(5)));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_deserialize_from_toml() {
        let toml = r#"
            context_type = "t.TestContext"
            outputs_enabled = false
            skip_types = ["Query"]

            [[sources]]
            alias = "t"
            module_path = "tests/_types.ts"

            [backing_type_map]
            DateTime = "Date"
        "#;

        let config: TypegenConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.sources, vec![SourceConfig::new("t", "tests/_types.ts")]);
        assert_eq!(
            config.context_type,
            Some(ContextType::Aliased("t.TestContext".into()))
        );
        assert!(!config.outputs_enabled);
        assert_eq!(config.backing_type_map.get("DateTime").unwrap(), "Date");
        assert_eq!(config.introspection_timeout_ms, 5000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_deserialize_module_context_type() {
        let toml = r#"
            [context_type]
            path = "src/context.ts"
            name = "Context"
        "#;
        let config: TypegenConfig = toml::from_str(toml).unwrap();
        assert_eq!(
            config.context_type,
            Some(ContextType::Module {
                path: PathBuf::from("src/context.ts"),
                name: "Context".into(),
            })
        );
    }

    #[test]
    fn test_context_alias_must_be_declared() {
        let config = TypegenConfig::new()
            .with_source("t", "types.ts")
            .with_context_type("ctx.Context");
        assert!(matches!(
            config.validate(),
            Err(TypegenError::UnknownContextAlias(alias)) if alias == "ctx"
        ));
    }

    #[test]
    fn test_malformed_context_type() {
        let config = TypegenConfig::new()
            .with_source("t", "types.ts")
            .with_context_type("Context");
        assert!(matches!(
            config.validate(),
            Err(TypegenError::MalformedContextType(_))
        ));
    }

    #[test]
    fn test_alias_collision_is_rejected() {
        let config = TypegenConfig::new()
            .with_source("t", "a.ts")
            .with_source("t", "b.ts");
        assert!(matches!(
            config.validate(),
            Err(TypegenError::AliasCollision { .. })
        ));
    }

    #[test]
    fn test_zero_timeout_disables_it() {
        let mut config = TypegenConfig::default();
        config.introspection_timeout_ms = 0;
        assert_eq!(config.introspection_timeout(), None);
    }

    #[test]
    fn test_empty_typegen_file_is_ignored() {
        let config = TypegenConfig::new().with_typegen_file("");
        assert!(config.typegen_file().is_none());
    }
}
